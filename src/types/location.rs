// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use crate::*;

/// StorageLocation is the endpoint a single attempt is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// The primary, read-write endpoint.
    Primary,
    /// The geo-replicated, read-only secondary endpoint.
    Secondary,
}

impl StorageLocation {
    /// Return the other location.
    pub fn flip(self) -> Self {
        match self {
            StorageLocation::Primary => StorageLocation::Secondary,
            StorageLocation::Secondary => StorageLocation::Primary,
        }
    }
}

impl Display for StorageLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageLocation::Primary => write!(f, "primary"),
            StorageLocation::Secondary => write!(f, "secondary"),
        }
    }
}

/// LocationMode is the caller's policy for picking endpoints across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationMode {
    /// Only use the primary endpoint.
    #[default]
    PrimaryOnly,
    /// Start with the primary endpoint and alternate on every retry.
    PrimaryThenSecondary,
    /// Only use the secondary endpoint.
    SecondaryOnly,
    /// Start with the secondary endpoint and alternate on every retry.
    SecondaryThenPrimary,
}

impl LocationMode {
    /// The location of the first attempt.
    pub fn initial_location(self) -> StorageLocation {
        match self {
            LocationMode::PrimaryOnly | LocationMode::PrimaryThenSecondary => {
                StorageLocation::Primary
            }
            LocationMode::SecondaryOnly | LocationMode::SecondaryThenPrimary => {
                StorageLocation::Secondary
            }
        }
    }

    /// Whether this mode alternates locations between attempts.
    pub fn is_alternating(self) -> bool {
        matches!(
            self,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary
        )
    }

    /// Whether this mode ever targets the secondary endpoint.
    pub fn uses_secondary(self) -> bool {
        !matches!(self, LocationMode::PrimaryOnly)
    }
}

/// RequestLocationMode is what a single operation is able to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLocationMode {
    /// Writes and other operations that must hit the primary.
    PrimaryOnly,
    /// Operations that only make sense against the secondary.
    SecondaryOnly,
    /// Reads that accept eventually consistent data from the secondary.
    PrimaryOrSecondary,
}

/// StorageUri is the pair of endpoints of a storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    primary: String,
    secondary: Option<String>,
}

impl StorageUri {
    /// Create a storage uri with only the primary endpoint.
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into().trim_end_matches('/').to_string(),
            secondary: None,
        }
    }

    /// Set the secondary endpoint.
    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into().trim_end_matches('/').to_string());
        self
    }

    /// The primary endpoint.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// The secondary endpoint if configured.
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// Resolve the endpoint of given location.
    pub fn endpoint(&self, location: StorageLocation) -> Result<&str> {
        match location {
            StorageLocation::Primary => Ok(&self.primary),
            StorageLocation::Secondary => self.secondary.as_deref().ok_or_else(|| {
                Error::new(
                    ErrorKind::ConfigInvalid,
                    "secondary endpoint is required by location mode but not configured",
                )
            }),
        }
    }

    /// Check the caller's location mode against what the operation supports
    /// and return the location of the first attempt.
    ///
    /// Returns the possibly narrowed mode as well: an alternating mode on a
    /// primary-only operation degrades to [`LocationMode::PrimaryOnly`].
    pub fn resolve(
        &self,
        mode: LocationMode,
        request_mode: RequestLocationMode,
    ) -> Result<(LocationMode, StorageLocation)> {
        let mode = match (request_mode, mode) {
            (RequestLocationMode::PrimaryOnly, LocationMode::SecondaryOnly) => {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "operation can only be sent to the primary location",
                )
                .with_context("location_mode", format!("{mode:?}")))
            }
            (RequestLocationMode::SecondaryOnly, LocationMode::PrimaryOnly) => {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "operation can only be sent to the secondary location",
                )
                .with_context("location_mode", format!("{mode:?}")))
            }
            (RequestLocationMode::PrimaryOnly, _) => LocationMode::PrimaryOnly,
            (RequestLocationMode::SecondaryOnly, _) => LocationMode::SecondaryOnly,
            (RequestLocationMode::PrimaryOrSecondary, mode) => mode,
        };

        if mode.uses_secondary() && self.secondary.is_none() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "secondary endpoint is required by location mode but not configured",
            )
            .with_context("location_mode", format!("{mode:?}")));
        }

        Ok((mode, mode.initial_location()))
    }
}
