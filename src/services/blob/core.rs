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
use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use bytes::Buf;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::header::RANGE;
use http::request;
use http::HeaderMap;
use http::HeaderName;
use http::Request;
use http::Response;
use http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::error::parse_error;
use crate::raw::constants::*;
use crate::raw::*;
use crate::*;

/// BlobPath addresses one blob of the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPath {
    container: String,
    name: String,
}

impl BlobPath {
    /// Create a new path.
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
        }
    }

    /// Container of the blob.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Name of the blob inside its container.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Url of the blob under given endpoint.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            endpoint,
            self.container,
            percent_encode_path(&self.name)
        )
    }
}

/// BlockSearchMode tells the service which list to look a block id up in
/// while committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSearchMode {
    /// Only the committed block list.
    Committed,
    /// Only the uncommitted blocks.
    Uncommitted,
    /// The most recently uploaded version, uncommitted first.
    Latest,
}

/// BlockEntry is one item of a block list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Base64 encoded block id.
    pub id: String,
    /// Size of the block, only known for listed blocks.
    pub size: Option<u64>,
    /// Where the block is looked up on commit, or where it was listed from.
    pub search_mode: BlockSearchMode,
}

impl BlockEntry {
    /// Create an entry resolved against the latest uploaded block.
    pub fn latest(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size: None,
            search_mode: BlockSearchMode::Latest,
        }
    }

    /// Create an entry that keeps an already committed block.
    pub fn committed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size: None,
            search_mode: BlockSearchMode::Committed,
        }
    }

    /// Create an entry that commits an uploaded block.
    pub fn uncommitted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size: None,
            search_mode: BlockSearchMode::Uncommitted,
        }
    }
}

/// BlockListingFilter selects the lists returned by `Get Block List`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockListingFilter {
    /// Committed blocks only.
    #[default]
    Committed,
    /// Uncommitted blocks only.
    Uncommitted,
    /// Both lists, committed first.
    All,
}

impl BlockListingFilter {
    fn as_str(&self) -> &'static str {
        match self {
            BlockListingFilter::Committed => "committed",
            BlockListingFilter::Uncommitted => "uncommitted",
            BlockListingFilter::All => "all",
        }
    }
}

/// PageRange is an inclusive, 512-byte aligned range of a page blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u64,
    end: u64,
}

impl PageRange {
    /// Create a range from inclusive bounds.
    ///
    /// `start` must be a multiple of 512 and the range must span whole
    /// pages.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        let page = PAGE_SIZE as u64;
        // An end of u64::MAX has no exclusive bound, the length can't be represented.
        let aligned = match end.checked_add(1) {
            Some(next) => end >= start && start % page == 0 && (next - start) % page == 0,
            None => false,
        };
        if !aligned {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "page range must be aligned to 512 bytes",
            )
            .with_context("start", start)
            .with_context("end", end));
        }

        Ok(Self { start, end })
    }

    /// Create the range of `length` bytes at `offset`.
    pub fn from_offset(offset: u64, length: u64) -> Result<Self> {
        if length == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "page range is empty")
                .with_context("offset", offset));
        }

        let end = offset.checked_add(length - 1).ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, "page range exceeds the maximum offset")
                .with_context("offset", offset)
                .with_context("length", length)
        })?;
        Self::new(offset, end)
    }

    /// First byte of the range.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte of the range.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    /// Always false, an empty range can't be built.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// PageOperation is the kind of page write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOperation {
    /// Write the request body into the range.
    Update,
    /// Zero the range, the request carries no body.
    Clear,
}

impl PageOperation {
    fn as_str(&self) -> &'static str {
        match self {
            PageOperation::Update => "update",
            PageOperation::Clear => "clear",
        }
    }
}

/// BlobCore is shared by every blob handle of one client.
pub struct BlobCore {
    pub storage_uri: StorageUri,
    pub client: HttpClient,
    pub signer: Arc<dyn Sign>,
    pub default_options: BlobRequestOptions,
}

impl Debug for BlobCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCore")
            .field("storage_uri", &self.storage_uri)
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl StorageCore for BlobCore {
    fn storage_uri(&self) -> &StorageUri {
        &self.storage_uri
    }

    fn http_client(&self) -> &HttpClient {
        &self.client
    }

    fn signer(&self) -> &Arc<dyn Sign> {
        &self.signer
    }

    fn parse_error(&self, resp: Response<Bytes>) -> Error {
        parse_error(resp)
    }
}

impl BlobCore {
    /// Merge per call options over the client defaults and validate them.
    pub fn blob_options(&self, options: Option<&BlobRequestOptions>) -> Result<BlobRequestOptions> {
        let options = match options {
            Some(v) => v.merge(&self.default_options),
            None => self.default_options.clone(),
        };
        options.validate()?;
        Ok(options)
    }
}

fn apply_condition(req: &mut Request<Bytes>, condition: Option<&AccessCondition>) -> Result<()> {
    match condition {
        Some(c) => c.apply(req.headers_mut()),
        None => Ok(()),
    }
}

/// Block operations only accept the lease of the blob.
fn apply_lease(req: &mut Request<Bytes>, condition: Option<&AccessCondition>) -> Result<()> {
    if let Some(lease_id) = condition.and_then(|c| c.lease_id.as_deref()) {
        req.headers_mut().insert(
            HeaderName::from_static(X_MS_LEASE_ID),
            build_header_value(lease_id)?,
        );
    }
    Ok(())
}

fn insert_metadata(
    mut req: request::Builder,
    metadata: &HashMap<String, String>,
) -> request::Builder {
    for (key, value) in metadata {
        req = req.header(format!("{X_MS_META_PREFIX}{key}"), value.as_str());
    }
    req
}

/// Properties returned by a write, the response length and md5 describe
/// the request instead of the blob.
fn parse_write_properties(blob_type: BlobType, headers: &HeaderMap) -> Result<BlobProperties> {
    let mut props = BlobProperties::from_headers(blob_type, headers)?;
    props.length = None;
    props.content_md5 = None;
    Ok(props)
}

fn parse_blob_type(headers: &HeaderMap, fallback: BlobType) -> Result<BlobType> {
    match parse_header_to_str(headers, X_MS_BLOB_TYPE)? {
        Some(v) => v.parse(),
        None => Ok(fallback),
    }
}

impl BlobCore {
    #[allow(clippy::too_many_arguments)]
    pub async fn put_block_blob(
        &self,
        path: &BlobPath,
        body: Bytes,
        blob_content_md5: Option<&str>,
        metadata: &HashMap<String, String>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let length = body.len() as u64;
        let req = StorageRequest::new(
            Operation::PutBlob,
            |endpoint: &str, body: Bytes| {
                let mut req = Request::put(path.url(endpoint))
                    .header(X_MS_BLOB_TYPE, BlobType::BlockBlob.as_str());
                if let Some(md5) = blob_content_md5 {
                    req = req.header(X_MS_BLOB_CONTENT_MD5, md5);
                }
                insert_metadata(req, metadata)
                    .body(body)
                    .map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let mut props = parse_write_properties(BlobType::BlockBlob, resp.headers())?;
                props.length = Some(length);
                props.content_md5 = blob_content_md5.map(|v| v.to_string());
                Ok(props)
            },
        )
        .expect(&[StatusCode::CREATED])
        .with_body(RequestBody::Bytes(body))
        .with_content_md5(options.use_transactional_md5())
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    /// `body` shares the lifetime of every other borrow, its source is
    /// reborrowed by the caller.
    pub async fn put_block<'a>(
        &'a self,
        path: &'a BlobPath,
        block_id: &'a str,
        body: RequestBody<'a>,
        condition: Option<&'a AccessCondition>,
        options: &'a BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<()> {
        let req = StorageRequest::new(
            Operation::PutBlock,
            move |endpoint: &str, body: Bytes| {
                let url = QueryPairsWriter::new(&path.url(endpoint))
                    .push("comp", "block")
                    .push("blockid", block_id)
                    .finish();
                Request::put(url)
                    .body(body)
                    .map_err(new_request_build_error)
            },
            |_: Response<Bytes>| Ok(()),
        )
        .expect(&[StatusCode::CREATED])
        .with_body(body)
        .with_content_md5(options.use_transactional_md5())
        .with_set_headers(move |req: &mut Request<Bytes>| apply_lease(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn put_block_list(
        &self,
        path: &BlobPath,
        entries: &[BlockEntry],
        blob_content_md5: Option<&str>,
        metadata: &HashMap<String, String>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let content = quick_xml::se::to_string(&PutBlockListRequest::from(entries))
            .map_err(new_xml_serialize_error)?;

        let req = StorageRequest::new(
            Operation::PutBlockList,
            |endpoint: &str, body: Bytes| {
                let url = format!("{}?comp=blocklist", path.url(endpoint));
                let mut req = Request::put(url).header(CONTENT_TYPE, "application/xml");
                if let Some(md5) = blob_content_md5 {
                    req = req.header(X_MS_BLOB_CONTENT_MD5, md5);
                }
                insert_metadata(req, metadata)
                    .body(body)
                    .map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let mut props = parse_write_properties(BlobType::BlockBlob, resp.headers())?;
                props.content_md5 = blob_content_md5.map(|v| v.to_string());
                Ok(props)
            },
        )
        .expect(&[StatusCode::CREATED])
        .with_body(RequestBody::Bytes(Bytes::from(content)))
        .with_content_md5(options.use_transactional_md5())
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    pub async fn get_block_list(
        &self,
        path: &BlobPath,
        filter: BlockListingFilter,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<Vec<BlockEntry>> {
        let req = StorageRequest::new(
            Operation::GetBlockList,
            |endpoint: &str, body: Bytes| {
                let url = QueryPairsWriter::new(&path.url(endpoint))
                    .push("comp", "blocklist")
                    .push("blocklisttype", filter.as_str())
                    .finish();
                Request::get(url)
                    .body(body)
                    .map_err(new_request_build_error)
            },
            |resp: Response<Bytes>| {
                let out: BlockListOutput = quick_xml::de::from_reader(resp.into_body().reader())
                    .map_err(new_xml_deserialize_error)?;
                Ok(out.into_entries())
            },
        )
        .expect(&[StatusCode::OK])
        .with_location_mode(RequestLocationMode::PrimaryOrSecondary)
        .with_set_headers(move |req: &mut Request<Bytes>| apply_lease(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_page_blob(
        &self,
        path: &BlobPath,
        length: u64,
        sequence_number: Option<u64>,
        metadata: &HashMap<String, String>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let req = StorageRequest::new(
            Operation::CreatePageBlob,
            |endpoint: &str, body: Bytes| {
                let mut req = Request::put(path.url(endpoint))
                    .header(X_MS_BLOB_TYPE, BlobType::PageBlob.as_str())
                    .header(X_MS_BLOB_CONTENT_LENGTH, length);
                if let Some(v) = sequence_number {
                    req = req.header(X_MS_BLOB_SEQUENCE_NUMBER, v);
                }
                insert_metadata(req, metadata)
                    .body(body)
                    .map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let mut props = parse_write_properties(BlobType::PageBlob, resp.headers())?;
                props.length = Some(length);
                props.sequence_number = Some(sequence_number.unwrap_or_default());
                Ok(props)
            },
        )
        .expect(&[StatusCode::CREATED])
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn put_page<'a>(
        &'a self,
        path: &'a BlobPath,
        range: PageRange,
        op: PageOperation,
        body: RequestBody<'a>,
        condition: Option<&'a AccessCondition>,
        options: &'a BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let operation = match op {
            PageOperation::Update => Operation::PutPage,
            PageOperation::Clear => Operation::ClearPage,
        };

        let req = StorageRequest::new(
            operation,
            move |endpoint: &str, body: Bytes| {
                let url = format!("{}?comp=page", path.url(endpoint));
                Request::put(url)
                    .header(X_MS_PAGE_WRITE, op.as_str())
                    .header(X_MS_RANGE, format_range_header(range.start(), range.end()))
                    .body(body)
                    .map_err(new_request_build_error)
            },
            |resp: Response<Bytes>| parse_write_properties(BlobType::PageBlob, resp.headers()),
        )
        .expect(&[StatusCode::CREATED])
        .with_body(body)
        .with_content_md5(op == PageOperation::Update && options.use_transactional_md5())
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    /// Set Blob Properties, used to resize a page blob or to store the
    /// whole content MD5 after the last page.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_blob_properties(
        &self,
        path: &BlobPath,
        blob_type: BlobType,
        length: Option<u64>,
        blob_content_md5: Option<&str>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let operation = match length {
            Some(_) => Operation::ResizeBlob,
            None => Operation::SetBlobProperties,
        };

        let req = StorageRequest::new(
            operation,
            |endpoint: &str, body: Bytes| {
                let url = format!("{}?comp=properties", path.url(endpoint));
                let mut req = Request::put(url);
                if let Some(v) = length {
                    req = req.header(X_MS_BLOB_CONTENT_LENGTH, v);
                }
                if let Some(md5) = blob_content_md5 {
                    req = req.header(X_MS_BLOB_CONTENT_MD5, md5);
                }
                req.body(body).map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let mut props = parse_write_properties(blob_type, resp.headers())?;
                props.length = length;
                props.content_md5 = blob_content_md5.map(|v| v.to_string());
                Ok(props)
            },
        )
        .expect(&[StatusCode::OK])
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    /// Get Blob, the whole blob when `range` is `None`.
    ///
    /// The body of a whole blob is checked against its stored MD5 unless
    /// validation is disabled. A mismatch is retried like a broken
    /// transfer.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_blob(
        &self,
        path: &BlobPath,
        blob_type: BlobType,
        range: Option<(u64, u64)>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<(BlobProperties, Bytes)> {
        let validate_md5 = range.is_none() && !options.disable_content_md5_validation();

        let req = StorageRequest::new(
            Operation::GetBlob,
            |endpoint: &str, body: Bytes| {
                let mut req = Request::get(path.url(endpoint));
                if let Some((start, end)) = range {
                    req = req.header(RANGE, format_range_header(start, end));
                }
                req.body(body).map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let blob_type = parse_blob_type(resp.headers(), blob_type)?;
                let mut props = BlobProperties::from_headers(blob_type, resp.headers())?;
                if range.is_some() {
                    props.length = None;
                    props.content_md5 = None;
                }

                let bs = resp.into_body();
                if validate_md5 {
                    if let Some(expected) = props.content_md5.as_deref() {
                        let actual = format_content_md5(&bs);
                        if actual != expected {
                            return Err(Error::new(
                                ErrorKind::ContentMismatch,
                                "downloaded content doesn't match its stored md5",
                            )
                            .with_context("expected", expected)
                            .with_context("actual", actual)
                            .set_temporary());
                        }
                    }
                }

                Ok((props, bs))
            },
        )
        .expect(&[StatusCode::OK, StatusCode::PARTIAL_CONTENT])
        .with_location_mode(RequestLocationMode::PrimaryOrSecondary)
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    pub async fn get_blob_properties(
        &self,
        path: &BlobPath,
        blob_type: BlobType,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let req = StorageRequest::new(
            Operation::GetBlobProperties,
            |endpoint: &str, body: Bytes| {
                Request::head(path.url(endpoint))
                    .body(body)
                    .map_err(new_request_build_error)
            },
            move |resp: Response<Bytes>| {
                let blob_type = parse_blob_type(resp.headers(), blob_type)?;
                BlobProperties::from_headers(blob_type, resp.headers())
            },
        )
        .expect(&[StatusCode::OK])
        .with_location_mode(RequestLocationMode::PrimaryOrSecondary)
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }

    pub async fn delete_blob(
        &self,
        path: &BlobPath,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<()> {
        let req = StorageRequest::new(
            Operation::DeleteBlob,
            |endpoint: &str, body: Bytes| {
                Request::delete(path.url(endpoint))
                    .body(body)
                    .map_err(new_request_build_error)
            },
            |_: Response<Bytes>| Ok(()),
        )
        .expect(&[StatusCode::ACCEPTED])
        .with_set_headers(move |req: &mut Request<Bytes>| apply_condition(req, condition));

        execute(self, req, options.request_options(), ctx).await
    }
}

impl BlobCore {
    /// Download a whole blob, checking its type and decrypting it when an
    /// encryption policy is set.
    pub async fn download(
        &self,
        path: &BlobPath,
        blob_type: BlobType,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<(BlobProperties, Bytes)> {
        let (props, bs) = self
            .get_blob(path, blob_type, None, condition, options, ctx)
            .await?;
        check_blob_type(blob_type, props.blob_type)?;

        let bs = match options.encryption_policy() {
            Some(policy) => policy
                .decrypt(&props.metadata, bs)
                .map_err(|err| err.with_operation(Operation::GetBlob))?,
            None => bs,
        };
        Ok((props, bs))
    }

    /// Fetch properties and check the blob has the expected type.
    pub async fn fetch_properties(
        &self,
        path: &BlobPath,
        blob_type: BlobType,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let props = self
            .get_blob_properties(path, blob_type, condition, options, ctx)
            .await?;
        check_blob_type(blob_type, props.blob_type)?;
        Ok(props)
    }
}

pub fn check_blob_type(expected: BlobType, actual: BlobType) -> Result<()> {
    if expected != actual {
        return Err(Error::new(
            ErrorKind::ConditionNotMatch,
            "blob type of the service doesn't match the handle",
        )
        .with_context("expected", expected)
        .with_context("actual", actual));
    }
    Ok(())
}

/// Request of Put Block List, entries keep their order.
#[derive(Default, Debug, Serialize)]
#[serde(rename = "BlockList")]
pub struct PutBlockListRequest {
    #[serde(rename = "$value")]
    pub entries: Vec<BlockListEntry>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum BlockListEntry {
    Committed(String),
    Uncommitted(String),
    Latest(String),
}

impl From<&[BlockEntry]> for PutBlockListRequest {
    fn from(entries: &[BlockEntry]) -> Self {
        let entries = entries
            .iter()
            .map(|entry| match entry.search_mode {
                BlockSearchMode::Committed => BlockListEntry::Committed(entry.id.clone()),
                BlockSearchMode::Uncommitted => BlockListEntry::Uncommitted(entry.id.clone()),
                BlockSearchMode::Latest => BlockListEntry::Latest(entry.id.clone()),
            })
            .collect();

        Self { entries }
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BlockListOutput {
    pub committed_blocks: BlockListBlocks,
    pub uncommitted_blocks: BlockListBlocks,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BlockListBlocks {
    pub block: Vec<BlockListItem>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BlockListItem {
    pub name: String,
    pub size: u64,
}

impl BlockListOutput {
    fn into_entries(self) -> Vec<BlockEntry> {
        let committed = self.committed_blocks.block.into_iter().map(|b| BlockEntry {
            id: b.name,
            size: Some(b.size),
            search_mode: BlockSearchMode::Committed,
        });
        let uncommitted = self.uncommitted_blocks.block.into_iter().map(|b| BlockEntry {
            id: b.name,
            size: Some(b.size),
            search_mode: BlockSearchMode::Uncommitted,
        });

        committed.chain(uncommitted).collect()
    }
}
