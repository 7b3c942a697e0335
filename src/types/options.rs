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
use std::sync::Arc;
use std::time::Duration;

use crate::*;

/// 1 KiB
pub const KIB: usize = 1024;
/// 1 MiB
pub const MIB: usize = 1024 * KIB;

/// Size of a page, every page range is aligned to it.
pub const PAGE_SIZE: usize = 512;
/// Max size of a single `Put Page` update.
pub const MAX_PAGE_UPDATE_SIZE: usize = 4 * MIB;
/// Max number of blocks a block blob can commit.
pub const MAX_BLOCK_COUNT: u64 = 50_000;
/// Max size of a single block accepted by the service.
pub const MAX_SERVICE_BLOCK_SIZE: u64 = 4000 * MIB as u64;

/// Smallest block size accepted by the writers.
pub const MIN_BLOCK_SIZE: usize = 16 * KIB;
/// Largest block size accepted by the writers.
pub const MAX_BLOCK_SIZE: usize = 100 * MIB;
/// Default block size.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * MIB;

/// Smallest page write size.
pub const MIN_PAGE_WRITE_SIZE: usize = PAGE_SIZE;
/// Largest page write size.
pub const MAX_PAGE_WRITE_SIZE: usize = MAX_PAGE_UPDATE_SIZE;
/// Default page write size.
pub const DEFAULT_PAGE_WRITE_SIZE: usize = 4 * MIB;

/// Smallest single put threshold.
pub const MIN_SINGLE_PUT_THRESHOLD: usize = MIB;
/// Largest single put threshold.
pub const MAX_SINGLE_PUT_THRESHOLD: usize = 256 * MIB;
/// Default single put threshold.
pub const DEFAULT_SINGLE_PUT_THRESHOLD: usize = 32 * MIB;

/// Default per-try timeout.
pub const DEFAULT_TRY_TIMEOUT: Duration = Duration::from_secs(60);

/// RequestOptions controls how the engine runs a single operation.
///
/// Unset fields fall back to the client defaults, then to the built-in ones.
#[derive(Clone, Default)]
pub struct RequestOptions {
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    location_mode: Option<LocationMode>,
    timeout: Option<Duration>,
    maximum_execution_time: Option<Duration>,
}

impl Debug for RequestOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("retry_policy", &self.retry_policy)
            .field("location_mode", &self.location_mode)
            .field("timeout", &self.timeout)
            .field("maximum_execution_time", &self.maximum_execution_time)
            .finish()
    }
}

impl RequestOptions {
    /// Set the retry policy.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Set the location mode.
    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = Some(mode);
        self
    }

    /// Set the timeout of every single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the time budget across all attempts.
    pub fn with_maximum_execution_time(mut self, v: Duration) -> Self {
        self.maximum_execution_time = Some(v);
        self
    }

    /// The retry policy, [`ExponentialRetry`] by default.
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        self.retry_policy
            .clone()
            .unwrap_or_else(|| Arc::new(ExponentialRetry::default()))
    }

    /// The location mode, [`LocationMode::PrimaryOnly`] by default.
    pub fn location_mode(&self) -> LocationMode {
        self.location_mode.unwrap_or_default()
    }

    /// The per-try timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TRY_TIMEOUT)
    }

    /// The overall time budget, unlimited by default.
    pub fn maximum_execution_time(&self) -> Option<Duration> {
        self.maximum_execution_time
    }

    /// Fill unset fields from `defaults`.
    pub fn merge(&self, defaults: &RequestOptions) -> RequestOptions {
        RequestOptions {
            retry_policy: self
                .retry_policy
                .clone()
                .or_else(|| defaults.retry_policy.clone()),
            location_mode: self.location_mode.or(defaults.location_mode),
            timeout: self.timeout.or(defaults.timeout),
            maximum_execution_time: self
                .maximum_execution_time
                .or(defaults.maximum_execution_time),
        }
    }
}

/// BlobRequestOptions extends [`RequestOptions`] with upload tuning.
#[derive(Clone, Default)]
pub struct BlobRequestOptions {
    request: RequestOptions,
    single_blob_put_threshold: Option<usize>,
    block_size: Option<usize>,
    page_write_size: Option<usize>,
    concurrent_request_count: Option<usize>,
    use_transactional_md5: Option<bool>,
    store_blob_content_md5: Option<bool>,
    disable_content_md5_validation: Option<bool>,
    encryption_policy: Option<Arc<dyn EncryptionPolicy>>,
}

impl Debug for BlobRequestOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRequestOptions")
            .field("request", &self.request)
            .field("single_blob_put_threshold", &self.single_blob_put_threshold)
            .field("block_size", &self.block_size)
            .field("page_write_size", &self.page_write_size)
            .field("concurrent_request_count", &self.concurrent_request_count)
            .field("use_transactional_md5", &self.use_transactional_md5)
            .field("store_blob_content_md5", &self.store_blob_content_md5)
            .field(
                "disable_content_md5_validation",
                &self.disable_content_md5_validation,
            )
            .field("encryption_policy", &self.encryption_policy.is_some())
            .finish()
    }
}

impl From<RequestOptions> for BlobRequestOptions {
    fn from(request: RequestOptions) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }
}

impl BlobRequestOptions {
    /// Set the retry policy.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy) -> Self {
        self.request = self.request.with_retry_policy(policy);
        self
    }

    /// Set the location mode.
    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.request = self.request.with_location_mode(mode);
        self
    }

    /// Set the timeout of every single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.with_timeout(timeout);
        self
    }

    /// Set the time budget across all attempts.
    pub fn with_maximum_execution_time(mut self, v: Duration) -> Self {
        self.request = self.request.with_maximum_execution_time(v);
        self
    }

    /// Largest content uploaded with a single `Put Blob`.
    pub fn with_single_blob_put_threshold(mut self, v: usize) -> Self {
        self.single_blob_put_threshold = Some(v);
        self
    }

    /// Size of every block and of the block writer buffer.
    pub fn with_block_size(mut self, v: usize) -> Self {
        self.block_size = Some(v);
        self
    }

    /// Size of the page writer buffer.
    pub fn with_page_write_size(mut self, v: usize) -> Self {
        self.page_write_size = Some(v);
        self
    }

    /// Max number of block or page uploads in flight.
    pub fn with_concurrent_request_count(mut self, v: usize) -> Self {
        self.concurrent_request_count = Some(v);
        self
    }

    /// Send `Content-MD5` with every block and page.
    pub fn with_use_transactional_md5(mut self, v: bool) -> Self {
        self.use_transactional_md5 = Some(v);
        self
    }

    /// Store the MD5 of the whole content as a blob property.
    pub fn with_store_blob_content_md5(mut self, v: bool) -> Self {
        self.store_blob_content_md5 = Some(v);
        self
    }

    /// Skip checking downloaded content against its stored MD5.
    pub fn with_disable_content_md5_validation(mut self, v: bool) -> Self {
        self.disable_content_md5_validation = Some(v);
        self
    }

    /// Encrypt content on the client before it is uploaded.
    pub fn with_encryption_policy(mut self, policy: impl EncryptionPolicy) -> Self {
        self.encryption_policy = Some(Arc::new(policy));
        self
    }

    /// The options used by the engine.
    pub fn request_options(&self) -> &RequestOptions {
        &self.request
    }

    /// Largest content uploaded with a single `Put Blob`.
    pub fn single_blob_put_threshold(&self) -> usize {
        self.single_blob_put_threshold
            .unwrap_or(DEFAULT_SINGLE_PUT_THRESHOLD)
    }

    /// Block size and whether it was set explicitly.
    pub fn block_size(&self) -> (usize, bool) {
        match self.block_size {
            Some(v) => (v, true),
            None => (DEFAULT_BLOCK_SIZE, false),
        }
    }

    /// Size of the page writer buffer.
    pub fn page_write_size(&self) -> usize {
        self.page_write_size.unwrap_or(DEFAULT_PAGE_WRITE_SIZE)
    }

    /// Max number of uploads in flight.
    pub fn concurrent_request_count(&self) -> usize {
        self.concurrent_request_count.unwrap_or(1)
    }

    /// Whether every block and page carries `Content-MD5`.
    pub fn use_transactional_md5(&self) -> bool {
        self.use_transactional_md5.unwrap_or(false)
    }

    /// Whether the whole content MD5 is stored, on by default for block blobs.
    pub fn store_blob_content_md5(&self, blob_type: BlobType) -> bool {
        self.store_blob_content_md5
            .unwrap_or(blob_type == BlobType::BlockBlob)
    }

    /// Whether downloads skip MD5 validation.
    pub fn disable_content_md5_validation(&self) -> bool {
        self.disable_content_md5_validation.unwrap_or(false)
    }

    /// The encryption policy if any.
    pub fn encryption_policy(&self) -> Option<&Arc<dyn EncryptionPolicy>> {
        self.encryption_policy.as_ref()
    }

    /// Fill unset fields from `defaults`.
    pub fn merge(&self, defaults: &BlobRequestOptions) -> BlobRequestOptions {
        BlobRequestOptions {
            request: self.request.merge(&defaults.request),
            single_blob_put_threshold: self
                .single_blob_put_threshold
                .or(defaults.single_blob_put_threshold),
            block_size: self.block_size.or(defaults.block_size),
            page_write_size: self.page_write_size.or(defaults.page_write_size),
            concurrent_request_count: self
                .concurrent_request_count
                .or(defaults.concurrent_request_count),
            use_transactional_md5: self.use_transactional_md5.or(defaults.use_transactional_md5),
            store_blob_content_md5: self
                .store_blob_content_md5
                .or(defaults.store_blob_content_md5),
            disable_content_md5_validation: self
                .disable_content_md5_validation
                .or(defaults.disable_content_md5_validation),
            encryption_policy: self
                .encryption_policy
                .clone()
                .or_else(|| defaults.encryption_policy.clone()),
        }
    }

    /// Check every explicitly set value against the service limits.
    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.single_blob_put_threshold {
            check_range(
                "single_blob_put_threshold",
                v,
                MIN_SINGLE_PUT_THRESHOLD,
                MAX_SINGLE_PUT_THRESHOLD,
            )?;
        }
        if let Some(v) = self.block_size {
            check_range("block_size", v, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        }
        if let Some(v) = self.page_write_size {
            check_range(
                "page_write_size",
                v,
                MIN_PAGE_WRITE_SIZE,
                MAX_PAGE_WRITE_SIZE,
            )?;
            if v % PAGE_SIZE != 0 {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "page_write_size must be a multiple of 512",
                )
                .with_context("page_write_size", v));
            }
        }
        if self.concurrent_request_count == Some(0) {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "concurrent_request_count must be at least 1",
            ));
        }

        Ok(())
    }
}

fn check_range(name: &'static str, v: usize, min: usize, max: usize) -> Result<()> {
    if (min..=max).contains(&v) {
        return Ok(());
    }

    Err(
        Error::new(ErrorKind::ConfigInvalid, "option is out of the allowed range")
            .with_context("option", name)
            .with_context("value", v)
            .with_context("min", min)
            .with_context("max", max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = BlobRequestOptions::default();

        assert_eq!(opts.single_blob_put_threshold(), 32 * MIB);
        assert_eq!(opts.block_size(), (4 * MIB, false));
        assert_eq!(opts.page_write_size(), 4 * MIB);
        assert_eq!(opts.concurrent_request_count(), 1);
        assert!(opts.store_blob_content_md5(BlobType::BlockBlob));
        assert!(!opts.store_blob_content_md5(BlobType::PageBlob));
        assert_eq!(opts.request_options().timeout(), Duration::from_secs(60));
        assert_eq!(
            opts.request_options().location_mode(),
            LocationMode::PrimaryOnly
        );
        opts.validate().unwrap();
    }

    #[test]
    fn test_merge() {
        let defaults = BlobRequestOptions::default()
            .with_block_size(MIB)
            .with_timeout(Duration::from_secs(5));
        let opts = BlobRequestOptions::default()
            .with_block_size(2 * MIB)
            .merge(&defaults);

        assert_eq!(opts.block_size(), (2 * MIB, true));
        assert_eq!(opts.request_options().timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate() {
        let cases = vec![
            BlobRequestOptions::default().with_block_size(16 * KIB - 1),
            BlobRequestOptions::default().with_block_size(100 * MIB + 1),
            BlobRequestOptions::default().with_page_write_size(256),
            BlobRequestOptions::default().with_page_write_size(1000),
            BlobRequestOptions::default().with_page_write_size(8 * MIB),
            BlobRequestOptions::default().with_single_blob_put_threshold(MIB - 1),
            BlobRequestOptions::default().with_single_blob_put_threshold(257 * MIB),
            BlobRequestOptions::default().with_concurrent_request_count(0),
        ];

        for opts in cases {
            let err = opts.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "{opts:?}");
        }

        BlobRequestOptions::default()
            .with_block_size(16 * KIB)
            .with_page_write_size(512)
            .with_single_blob_put_threshold(256 * MIB)
            .validate()
            .unwrap();
    }
}
