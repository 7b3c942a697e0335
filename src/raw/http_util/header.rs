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

use base64::engine::general_purpose;
use base64::Engine;
use chrono::DateTime;
use chrono::Utc;
use http::header::CONTENT_LENGTH;
use http::header::ETAG;
use http::header::LAST_MODIFIED;
use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use md5::Digest;

use crate::raw::*;
use crate::*;

/// Service version sent with every request.
pub const X_MS_VERSION_VALUE: &str = "2019-12-12";

/// Header names of the storage REST protocol.
#[allow(missing_docs)]
pub mod constants {
    pub const X_MS_VERSION: &str = "x-ms-version";
    pub const X_MS_CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";
    pub const X_MS_REQUEST_ID: &str = "x-ms-request-id";
    pub const X_MS_ERROR_CODE: &str = "x-ms-error-code";
    pub const X_MS_DATE: &str = "x-ms-date";
    pub const X_MS_BLOB_TYPE: &str = "x-ms-blob-type";
    pub const X_MS_BLOB_CONTENT_LENGTH: &str = "x-ms-blob-content-length";
    pub const X_MS_BLOB_CONTENT_MD5: &str = "x-ms-blob-content-md5";
    pub const X_MS_BLOB_SEQUENCE_NUMBER: &str = "x-ms-blob-sequence-number";
    pub const X_MS_BLOB_COMMITTED_BLOCK_COUNT: &str = "x-ms-blob-committed-block-count";
    pub const X_MS_PAGE_WRITE: &str = "x-ms-page-write";
    pub const X_MS_RANGE: &str = "x-ms-range";
    pub const X_MS_LEASE_ID: &str = "x-ms-lease-id";
    pub const X_MS_IF_SEQUENCE_NUMBER_LE: &str = "x-ms-if-sequence-number-le";
    pub const X_MS_IF_SEQUENCE_NUMBER_LT: &str = "x-ms-if-sequence-number-lt";
    pub const X_MS_IF_SEQUENCE_NUMBER_EQ: &str = "x-ms-if-sequence-number-eq";
    pub const X_MS_META_PREFIX: &str = "x-ms-meta-";
    pub const CONTENT_MD5: &str = "content-md5";
}

use constants::*;

/// Parse content length from header map.
pub fn parse_content_length(headers: &HeaderMap) -> Result<Option<u64>> {
    parse_header_to_u64(headers, CONTENT_LENGTH)
}

/// Parse content md5 from header map.
pub fn parse_content_md5(headers: &HeaderMap) -> Result<Option<&str>> {
    parse_header_to_str(headers, CONTENT_MD5)
}

/// Parse last modified from header map.
pub fn parse_last_modified(headers: &HeaderMap) -> Result<Option<DateTime<Utc>>> {
    parse_header_to_str(headers, LAST_MODIFIED)?
        .map(parse_datetime_from_rfc2822)
        .transpose()
}

/// Parse etag from header map.
pub fn parse_etag(headers: &HeaderMap) -> Result<Option<&str>> {
    parse_header_to_str(headers, ETAG)
}

/// Parse `x-ms-request-id` from header map.
pub fn parse_request_id(headers: &HeaderMap) -> Option<&str> {
    parse_header_to_str(headers, X_MS_REQUEST_ID).ok().flatten()
}

/// Parse `x-ms-blob-sequence-number` from header map.
pub fn parse_blob_sequence_number(headers: &HeaderMap) -> Result<Option<u64>> {
    parse_header_to_u64(headers, X_MS_BLOB_SEQUENCE_NUMBER)
}

/// Parse header value into u64 according to name.
pub fn parse_header_to_u64<K>(headers: &HeaderMap, name: K) -> Result<Option<u64>>
where
    HeaderName: TryFrom<K>,
{
    parse_header_to_str(headers, name)?
        .map(|v| {
            v.parse::<u64>().map_err(|e| {
                Error::new(ErrorKind::Unexpected, "header value is not valid integer")
                    .with_context("value", v)
                    .set_source(e)
            })
        })
        .transpose()
}

/// Parse header value to string according to name.
#[inline]
pub fn parse_header_to_str<K>(headers: &HeaderMap, name: K) -> Result<Option<&str>>
where
    HeaderName: TryFrom<K>,
{
    let name = HeaderName::try_from(name).map_err(|_| {
        Error::new(
            ErrorKind::Unexpected,
            "header name must be valid http header name but not",
        )
        .with_operation("http_util::parse_header_to_str")
    })?;

    let Some(value) = headers.get(&name) else {
        return Ok(None);
    };

    Ok(Some(value.to_str().map_err(|e| {
        Error::new(
            ErrorKind::Unexpected,
            "header value must be valid utf-8 string but not",
        )
        .with_operation("http_util::parse_header_to_str")
        .with_context("header_name", name.as_str())
        .set_source(e)
    })?))
}

/// Parse prefixed headers and return a map with the prefix of each header removed.
pub fn parse_prefixed_headers(headers: &HeaderMap, prefix: &str) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            name.as_str().strip_prefix(prefix).and_then(|stripped_key| {
                value
                    .to_str()
                    .ok()
                    .map(|parsed_value| (stripped_key.to_string(), parsed_value.to_string()))
            })
        })
        .collect()
}

/// format content md5 header by given input.
pub fn format_content_md5(bs: &[u8]) -> String {
    let mut hasher = md5::Md5::new();
    hasher.update(bs);

    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Format an inclusive byte range as `bytes=start-end`.
pub fn format_range_header(start: u64, end: u64) -> String {
    format!("bytes={start}-{end}")
}

/// Build header value from given string.
pub fn build_header_value(v: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(v).map_err(|e| {
        Error::new(
            ErrorKind::ConfigInvalid,
            "header value contains invalid characters",
        )
        .with_operation("http_util::build_header_value")
        .with_context("value", v)
        .set_source(e)
    })
}
