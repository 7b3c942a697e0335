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

use std::fmt::Debug;
use std::fmt::Formatter;

use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use reqsign::AzureStorageConfig;
use reqsign::AzureStorageCredential;
use reqsign::AzureStorageLoader;
use reqsign::AzureStorageSigner;

use crate::raw::*;
use crate::*;

/// Sign computes the authorization of a request right before it is sent.
///
/// Signing happens once per attempt, after every engine header has been
/// added.
#[async_trait]
pub trait Sign: Debug + Send + Sync + 'static {
    /// Sign the request in place.
    ///
    /// `content_length` is the length of the body being sent, `None` when
    /// it is unknown.
    async fn sign(&self, req: &mut Request<Bytes>, content_length: Option<u64>) -> Result<()>;
}

/// AnonymousSigner leaves requests untouched, used for public containers
/// and pre-signed urls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSigner;

#[async_trait]
impl Sign for AnonymousSigner {
    async fn sign(&self, _: &mut Request<Bytes>, _: Option<u64>) -> Result<()> {
        Ok(())
    }
}

/// SharedKeySigner signs requests with an account key or a SAS token.
pub struct SharedKeySigner {
    loader: AzureStorageLoader,
    signer: AzureStorageSigner,
}

impl Debug for SharedKeySigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner").finish_non_exhaustive()
    }
}

impl SharedKeySigner {
    /// Create a signer from account name and key or a sas token.
    pub fn new(
        account_name: Option<String>,
        account_key: Option<String>,
        sas_token: Option<String>,
    ) -> Self {
        let config = AzureStorageConfig {
            account_name,
            account_key,
            sas_token,
            ..Default::default()
        };

        Self {
            loader: AzureStorageLoader::new(config),
            signer: AzureStorageSigner::new(),
        }
    }

    async fn load_credential(&self) -> Result<AzureStorageCredential> {
        let cred = self
            .loader
            .load()
            .await
            .map_err(new_request_credential_error)?;

        cred.ok_or_else(|| Error::new(ErrorKind::ConfigInvalid, "no valid credential found"))
    }
}

#[async_trait]
impl Sign for SharedKeySigner {
    async fn sign(&self, req: &mut Request<Bytes>, _: Option<u64>) -> Result<()> {
        // The shared key string to sign reads Content-Length from the request
        // headers, which the engine has set already.
        let cred = self.load_credential().await?;
        self.signer.sign(req, &cred).map_err(new_request_sign_error)
    }
}
