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

use chrono::DateTime;
use chrono::Utc;
use http::header::IF_MATCH;
use http::header::IF_MODIFIED_SINCE;
use http::header::IF_NONE_MATCH;
use http::header::IF_UNMODIFIED_SINCE;
use http::HeaderMap;
use http::HeaderName;

use crate::raw::constants::*;
use crate::raw::*;
use crate::*;

/// AccessCondition is a set of preconditions sent as conditional headers.
///
/// A request whose condition fails is answered with `412 Precondition
/// Failed` and never retried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessCondition {
    /// `If-Match`
    pub if_match: Option<String>,
    /// `If-None-Match`
    pub if_none_match: Option<String>,
    /// `If-Modified-Since`
    pub if_modified_since: Option<DateTime<Utc>>,
    /// `If-Unmodified-Since`
    pub if_unmodified_since: Option<DateTime<Utc>>,
    /// `x-ms-lease-id`
    pub lease_id: Option<String>,
    /// `x-ms-if-sequence-number-le`
    pub if_sequence_number_le: Option<u64>,
    /// `x-ms-if-sequence-number-lt`
    pub if_sequence_number_lt: Option<u64>,
    /// `x-ms-if-sequence-number-eq`
    pub if_sequence_number_eq: Option<u64>,
}

impl AccessCondition {
    /// Only succeed if the blob's etag matches.
    pub fn if_match(etag: impl Into<String>) -> Self {
        Self {
            if_match: Some(etag.into()),
            ..Default::default()
        }
    }

    /// Only succeed if the blob does not exist yet.
    pub fn if_not_exists() -> Self {
        Self {
            if_none_match: Some("*".to_string()),
            ..Default::default()
        }
    }

    /// Only succeed if the blob is leased by given lease id.
    pub fn lease(lease_id: impl Into<String>) -> Self {
        Self {
            lease_id: Some(lease_id.into()),
            ..Default::default()
        }
    }

    /// Check if this condition carries any sequence number precondition.
    pub fn has_sequence_number_condition(&self) -> bool {
        self.if_sequence_number_le.is_some()
            || self.if_sequence_number_lt.is_some()
            || self.if_sequence_number_eq.is_some()
    }

    /// Apply the conditions to request headers.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let mut insert = |name: HeaderName, value: &str| -> Result<()> {
            headers.insert(name, build_header_value(value)?);
            Ok(())
        };

        if let Some(v) = &self.if_match {
            insert(IF_MATCH, v)?;
        }
        if let Some(v) = &self.if_none_match {
            insert(IF_NONE_MATCH, v)?;
        }
        if let Some(v) = self.if_modified_since {
            insert(IF_MODIFIED_SINCE, &format_datetime_into_http_date(v))?;
        }
        if let Some(v) = self.if_unmodified_since {
            insert(IF_UNMODIFIED_SINCE, &format_datetime_into_http_date(v))?;
        }
        if let Some(v) = &self.lease_id {
            insert(HeaderName::from_static(X_MS_LEASE_ID), v)?;
        }
        if let Some(v) = self.if_sequence_number_le {
            insert(
                HeaderName::from_static(X_MS_IF_SEQUENCE_NUMBER_LE),
                &v.to_string(),
            )?;
        }
        if let Some(v) = self.if_sequence_number_lt {
            insert(
                HeaderName::from_static(X_MS_IF_SEQUENCE_NUMBER_LT),
                &v.to_string(),
            )?;
        }
        if let Some(v) = self.if_sequence_number_eq {
            insert(
                HeaderName::from_static(X_MS_IF_SEQUENCE_NUMBER_EQ),
                &v.to_string(),
            )?;
        }

        Ok(())
    }
}
