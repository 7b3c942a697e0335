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

use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use log::debug;

use super::core::BlobCore;
use super::core::BlobPath;
use super::BlockBlob;
use super::PageBlob;
use crate::raw::*;
use crate::services::BlobConfig;
use crate::*;

/// Known endpoint suffix Azure Storage Blob services resource URI syntax.
/// Azure public cloud: https://accountname.blob.core.windows.net
/// Azure US Government: https://accountname.blob.core.usgovcloudapi.net
/// Azure China: https://accountname.blob.core.chinacloudapi.cn
const KNOWN_BLOB_ENDPOINT_SUFFIX: &[&str] = &[
    "blob.core.windows.net",
    "blob.core.usgovcloudapi.net",
    "blob.core.chinacloudapi.cn",
];

/// Builder of [`BlobServiceClient`].
///
/// # Example
///
/// ```no_run
/// use azstorage::services::BlobBuilder;
/// use azstorage::BlobRequestOptions;
/// use azstorage::LocationMode;
///
/// # fn main() -> azstorage::Result<()> {
/// let client = BlobBuilder::default()
///     .endpoint("https://myaccount.blob.core.windows.net")
///     .secondary_endpoint("https://myaccount-secondary.blob.core.windows.net")
///     .account_key("bXlrZXk=")
///     .default_options(
///         BlobRequestOptions::default().with_location_mode(LocationMode::PrimaryThenSecondary),
///     )
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Clone)]
pub struct BlobBuilder {
    config: BlobConfig,

    http_client: Option<HttpClient>,
    default_options: BlobRequestOptions,
}

impl Debug for BlobBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut ds = f.debug_struct("BlobBuilder");

        ds.field("config", &self.config);
        ds.field("default_options", &self.default_options);

        ds.finish()
    }
}

impl From<BlobConfig> for BlobBuilder {
    fn from(config: BlobConfig) -> Self {
        BlobBuilder {
            config,
            ..Default::default()
        }
    }
}

impl BlobBuilder {
    /// Set endpoint of this client.
    ///
    /// Endpoint must be full uri, e.g.
    ///
    /// - Azure: `https://accountname.blob.core.windows.net`
    /// - Azurite: `http://127.0.0.1:10000/devstoreaccount1`
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        if !endpoint.is_empty() {
            // Trim trailing `/` so that we can accept `http://127.0.0.1:9000/`
            self.config.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        }

        self
    }

    /// Set the secondary endpoint of a read-access geo-redundant account.
    pub fn secondary_endpoint(mut self, endpoint: &str) -> Self {
        if !endpoint.is_empty() {
            self.config.secondary_endpoint = Some(endpoint.trim_end_matches('/').to_string());
        }

        self
    }

    /// Set account_name of this client.
    ///
    /// Inferred from the endpoint when it's a well known one.
    pub fn account_name(mut self, account_name: &str) -> Self {
        if !account_name.is_empty() {
            self.config.account_name = Some(account_name.to_string());
        }

        self
    }

    /// Set account_key of this client.
    pub fn account_key(mut self, account_key: &str) -> Self {
        if !account_key.is_empty() {
            self.config.account_key = Some(account_key.to_string());
        }

        self
    }

    /// Set sas_token of this client.
    ///
    /// A sas token is preferred over the account key.
    pub fn sas_token(mut self, sas_token: &str) -> Self {
        if !sas_token.is_empty() {
            self.config.sas_token = Some(sas_token.to_string());
        }

        self
    }

    /// Specify the http client that used by this client.
    ///
    /// # Notes
    ///
    /// This API is part of the raw API, `HttpClient` could be changed
    /// during minor updates.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the options every call starts from.
    ///
    /// Options passed to a call override these field by field.
    pub fn default_options(mut self, options: BlobRequestOptions) -> Self {
        self.default_options = options;
        self
    }

    /// from_connection_string will make a builder from connection string
    ///
    /// connection string looks like:
    ///
    /// ```txt
    /// DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;
    /// AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;
    /// BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;
    /// ```
    ///
    /// Or
    ///
    /// ```txt
    /// DefaultEndpointsProtocol=https;
    /// AccountName=storagesample;
    /// AccountKey=<account-key>;
    /// EndpointSuffix=core.chinacloudapi.cn;
    /// ```
    pub fn from_connection_string(conn: &str) -> Result<Self> {
        let conn = conn.trim().replace('\n', "");

        let mut conn_map: HashMap<_, _> = HashMap::default();
        for v in conn.split(';') {
            let entry: Vec<_> = v.splitn(2, '=').collect();
            if entry.len() != 2 {
                // Ignore invalid entries.
                continue;
            }
            conn_map.insert(entry[0], entry[1]);
        }

        let mut builder = BlobBuilder::default();

        if let Some(sas_token) = conn_map.get("SharedAccessSignature") {
            builder = builder.sas_token(sas_token);
        } else {
            let account_name = conn_map.get("AccountName").ok_or_else(|| {
                Error::new(
                    ErrorKind::ConfigInvalid,
                    "connection string must have AccountName",
                )
                .with_operation("Builder::from_connection_string")
            })?;
            builder = builder.account_name(account_name);
            let account_key = conn_map.get("AccountKey").ok_or_else(|| {
                Error::new(
                    ErrorKind::ConfigInvalid,
                    "connection string must have AccountKey",
                )
                .with_operation("Builder::from_connection_string")
            })?;
            builder = builder.account_key(account_key);
        }

        if let Some(v) = conn_map.get("BlobEndpoint") {
            builder = builder.endpoint(v);
        } else if let Some(v) = conn_map.get("EndpointSuffix") {
            let protocol = conn_map.get("DefaultEndpointsProtocol").unwrap_or(&"https");
            let account_name = builder
                .config
                .account_name
                .as_ref()
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::ConfigInvalid,
                        "connection string must have AccountName",
                    )
                    .with_operation("Builder::from_connection_string")
                })?
                .clone();
            builder = builder.endpoint(&format!("{protocol}://{account_name}.blob.{v}"));
            builder = builder
                .secondary_endpoint(&format!("{protocol}://{account_name}-secondary.blob.{v}"));
        }

        if let Some(v) = conn_map.get("BlobSecondaryEndpoint") {
            builder = builder.secondary_endpoint(v);
        }

        Ok(builder)
    }

    /// Build the client.
    pub fn build(self) -> Result<BlobServiceClient> {
        debug!(target: "azstorage::services::blob", "client build started: {:?}", &self);

        let endpoint = match &self.config.endpoint {
            Some(endpoint) => Ok(endpoint.clone()),
            None => Err(Error::new(ErrorKind::ConfigInvalid, "endpoint is empty")
                .with_operation("Builder::build")),
        }?;
        debug!(target: "azstorage::services::blob", "client use endpoint {}", &endpoint);

        let mut storage_uri = StorageUri::new(endpoint.as_str());
        if let Some(v) = &self.config.secondary_endpoint {
            storage_uri = storage_uri.with_secondary(v.as_str());
        }

        let account_name = self
            .config
            .account_name
            .clone()
            .or_else(|| infer_storage_name_from_endpoint(&endpoint));

        let signer: Arc<dyn Sign> = match (&self.config.sas_token, &self.config.account_key) {
            (Some(sas_token), _) => Arc::new(SharedKeySigner::new(
                account_name,
                None,
                Some(sas_token.clone()),
            )),
            (None, Some(account_key)) => {
                if account_name.is_none() {
                    return Err(Error::new(
                        ErrorKind::ConfigInvalid,
                        "account_name is required to sign with account_key",
                    )
                    .with_operation("Builder::build")
                    .with_context("endpoint", &endpoint));
                }
                Arc::new(SharedKeySigner::new(
                    account_name,
                    Some(account_key.clone()),
                    None,
                ))
            }
            (None, None) => Arc::new(AnonymousSigner),
        };

        self.default_options
            .validate()
            .map_err(|err| err.with_operation("Builder::build"))?;

        Ok(BlobServiceClient {
            core: Arc::new(BlobCore {
                storage_uri,
                client: self.http_client.unwrap_or_default(),
                signer,
                default_options: self.default_options,
            }),
        })
    }
}

fn infer_storage_name_from_endpoint(endpoint: &str) -> Option<String> {
    let endpoint: &str = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .unwrap_or(endpoint);

    let mut parts = endpoint.splitn(2, '.');
    let storage_name = parts.next();
    let endpoint_suffix = parts
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_lowercase();

    if KNOWN_BLOB_ENDPOINT_SUFFIX
        .iter()
        .any(|s| *s == endpoint_suffix.as_str())
    {
        storage_name.map(|s| s.to_string())
    } else {
        None
    }
}

/// BlobServiceClient hands out blob handles sharing one http client,
/// signer and set of default options.
#[derive(Debug, Clone)]
pub struct BlobServiceClient {
    core: Arc<BlobCore>,
}

impl BlobServiceClient {
    /// Endpoints of the account.
    pub fn storage_uri(&self) -> &StorageUri {
        &self.core.storage_uri
    }

    /// Options every call starts from.
    pub fn default_options(&self) -> &BlobRequestOptions {
        &self.core.default_options
    }

    /// Get a handle on a block blob, nothing is sent.
    pub fn block_blob(&self, container: &str, name: &str) -> BlockBlob {
        BlockBlob::new(self.core.clone(), BlobPath::new(container, name))
    }

    /// Get a handle on a page blob, nothing is sent.
    pub fn page_blob(&self, container: &str, name: &str) -> PageBlob {
        PageBlob::new(self.core.clone(), BlobPath::new(container, name))
    }
}
