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
use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use http::HeaderMap;

use crate::raw::constants::*;
use crate::raw::*;
use crate::*;

/// BlobType is the kind of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobType {
    /// Blob assembled from committed blocks.
    BlockBlob,
    /// Blob made of 512-byte pages, randomly writable.
    PageBlob,
}

impl BlobType {
    /// The value of `x-ms-blob-type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::BlockBlob => "BlockBlob",
            BlobType::PageBlob => "PageBlob",
        }
    }
}

impl Display for BlobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BlockBlob" => Ok(BlobType::BlockBlob),
            "PageBlob" => Ok(BlobType::PageBlob),
            v => Err(Error::new(ErrorKind::Unsupported, "blob type is not supported")
                .with_context("blob_type", v)),
        }
    }
}

/// BlobProperties is the cached view of a blob's system properties.
///
/// Responses only carry some of the fields, [`BlobProperties::merge`]
/// applies a partial snapshot on top of the cached one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// Type of the blob.
    pub blob_type: BlobType,
    /// Length in bytes.
    pub length: Option<u64>,
    /// ETag of the current version.
    pub etag: Option<String>,
    /// Last modified time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Stored whole-content MD5.
    pub content_md5: Option<String>,
    /// Page blob sequence number.
    pub sequence_number: Option<u64>,
    /// Number of committed blocks of a block blob.
    pub committed_block_count: Option<u64>,
    /// User metadata.
    pub metadata: HashMap<String, String>,
}

impl BlobProperties {
    /// Create empty properties for given blob type.
    pub fn new(blob_type: BlobType) -> Self {
        Self {
            blob_type,
            length: None,
            etag: None,
            last_modified: None,
            content_md5: None,
            sequence_number: None,
            committed_block_count: None,
            metadata: HashMap::new(),
        }
    }

    /// Parse the properties carried by response headers.
    ///
    /// `Content-Length` is only meaningful for `Get Blob Properties`, callers
    /// of other operations should clear `length` or set it themselves.
    pub fn from_headers(blob_type: BlobType, headers: &HeaderMap) -> Result<Self> {
        let mut props = Self::new(blob_type);
        props.length = parse_content_length(headers)?;
        props.etag = parse_etag(headers)?.map(|v| v.to_string());
        props.last_modified = parse_last_modified(headers)?;
        props.content_md5 = parse_content_md5(headers)?.map(|v| v.to_string());
        props.sequence_number = parse_blob_sequence_number(headers)?;
        props.committed_block_count =
            parse_header_to_u64(headers, X_MS_BLOB_COMMITTED_BLOCK_COUNT)?;
        props.metadata = parse_prefixed_headers(headers, X_MS_META_PREFIX);
        Ok(props)
    }

    /// Apply every field present in `other`.
    pub fn merge(&mut self, other: BlobProperties) {
        self.blob_type = other.blob_type;
        if other.length.is_some() {
            self.length = other.length;
        }
        if other.etag.is_some() {
            self.etag = other.etag;
        }
        if other.last_modified.is_some() {
            self.last_modified = other.last_modified;
        }
        if other.content_md5.is_some() {
            self.content_md5 = other.content_md5;
        }
        if other.sequence_number.is_some() {
            self.sequence_number = other.sequence_number;
        }
        if other.committed_block_count.is_some() {
            self.committed_block_count = other.committed_block_count;
        }
        if !other.metadata.is_empty() {
            self.metadata = other.metadata;
        }
    }
}
