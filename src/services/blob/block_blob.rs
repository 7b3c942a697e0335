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
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use log::warn;

use super::core::BlobCore;
use super::core::BlobPath;
use super::core::BlockEntry;
use super::core::BlockListingFilter;
use super::writer::BlockUploader;
use super::writer::UploadTarget;
use super::BlobWriter;
use crate::raw::oio::read_exact;
use crate::raw::oio::read_up_to;
use crate::raw::oio::BlockWriter;
use crate::raw::oio::EncryptingSource;
use crate::raw::oio::Source;
use crate::raw::oio::StreamDescriptor;
use crate::raw::oio::TakeSource;
use crate::raw::*;
use crate::*;

/// BlockBlob is a handle on a block blob.
///
/// The handle caches the properties returned by the last successful call,
/// they are only updated once an operation succeeded.
#[derive(Debug, Clone)]
pub struct BlockBlob {
    core: Arc<BlobCore>,
    path: BlobPath,
    properties: BlobProperties,
    metadata: HashMap<String, String>,
}

impl BlockBlob {
    pub(super) fn new(core: Arc<BlobCore>, path: BlobPath) -> Self {
        Self {
            core,
            path,
            properties: BlobProperties::new(BlobType::BlockBlob),
            metadata: HashMap::new(),
        }
    }

    /// Path of this blob.
    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    /// Cached properties.
    pub fn properties(&self) -> &BlobProperties {
        &self.properties
    }

    /// Metadata sent with the next upload or commit.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Mutable access to the metadata sent with the next upload or commit.
    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.metadata
    }

    /// Upload the content of `source` as the new content of this blob.
    ///
    /// Content up to the single put threshold is sent in one request.
    /// Larger content is split into blocks of equal size, uploaded with at
    /// most `concurrent_request_count` requests in flight and committed at
    /// once. If any block fails nothing is committed.
    ///
    /// `length` limits how much is read from `source`, `None` reads until
    /// EOF. With an encryption policy the ciphertext of the whole source is
    /// uploaded.
    pub async fn upload(
        &mut self,
        source: &mut dyn Source,
        length: Option<u64>,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::Upload))?;
        let block_size = resolve_block_size(length, &options)
            .map_err(|err| err.with_operation(Operation::Upload))?;

        let mut metadata = self.metadata.clone();
        let props = match options.encryption_policy() {
            Some(policy) => {
                let encryptor = policy.create_encryptor(&mut metadata)?;
                // Ciphertext length is unknown, bound the plaintext instead.
                let mut taken;
                let plain: &mut dyn Source = match length {
                    Some(v) => {
                        taken = TakeSource::new(source, v);
                        &mut taken
                    }
                    None => source,
                };
                let mut source = EncryptingSource::new(plain, encryptor);
                self.upload_source(
                    &mut source,
                    None,
                    block_size,
                    metadata,
                    condition,
                    &options,
                    ctx,
                )
                .await?
            }
            None => {
                self.upload_source(
                    source, length, block_size, metadata, condition, &options, ctx,
                )
                .await?
            }
        };

        self.properties.merge(props);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_source(
        &self,
        source: &mut dyn Source,
        length: Option<u64>,
        block_size: usize,
        metadata: HashMap<String, String>,
        condition: Option<&AccessCondition>,
        options: &BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let threshold = options.single_blob_put_threshold();
        let store_md5 = options.store_blob_content_md5(BlobType::BlockBlob);

        // Only read ahead when the length doesn't already rule out a single put.
        let head = match length {
            Some(v) if v <= threshold as u64 => read_exact(source, v).await?,
            Some(_) => Bytes::new(),
            None => read_up_to(source, threshold + 1).await?,
        };
        let single_put = match length {
            Some(v) => v <= threshold as u64,
            None => head.len() <= threshold,
        };

        if single_put {
            let descriptor = StreamDescriptor::from_bytes(&head, store_md5);
            debug!(
                target: "azstorage::services::blob",
                "container={} name={} -> upload with single put: length={}",
                self.path.container(),
                self.path.name(),
                descriptor.length
            );
            return self
                .core
                .put_block_blob(
                    &self.path,
                    head,
                    descriptor.md5.as_deref(),
                    &metadata,
                    condition,
                    options,
                    ctx,
                )
                .await;
        }

        debug!(
            target: "azstorage::services::blob",
            "container={} name={} -> upload with blocks: length={:?} block_size={} concurrent={}",
            self.path.container(),
            self.path.name(),
            length,
            block_size,
            options.concurrent_request_count()
        );

        let target = UploadTarget {
            core: self.core.clone(),
            path: self.path.clone(),
            condition: condition.cloned(),
            options: options.clone(),
            ctx: ctx.clone(),
        };
        let mut w = BlockWriter::new(
            BlockUploader::new(target, metadata),
            block_size,
            options.concurrent_request_count(),
            store_md5,
        );

        let remaining = length.map(|v| v - head.len() as u64);
        if let Err(err) = copy_blocks(&mut w, source, head, remaining, block_size).await {
            if let Err(abort_err) = w.abort().await {
                warn!(
                    target: "azstorage::services::blob",
                    "container={} name={} -> abort after failed upload: error={}",
                    self.path.container(),
                    self.path.name(),
                    abort_err,
                );
            }
            return Err(err.with_operation(Operation::Upload));
        }

        w.inner().committed().ok_or_else(|| {
            Error::new(ErrorKind::Unexpected, "block list commit returned no properties")
                .with_operation(Operation::Upload)
        })
    }

    /// Upload one block without committing it.
    ///
    /// `length` bytes are read from `source`, `None` reads until EOF which
    /// requires a rewindable source.
    pub async fn upload_block(
        &self,
        block_id: &str,
        source: &mut dyn Source,
        length: Option<u64>,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::PutBlock))?;
        if options.encryption_policy().is_some() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "encryption is not supported for single block uploads",
            )
            .with_operation(Operation::PutBlock));
        }

        let length = match length {
            Some(v) => v,
            None => {
                StreamDescriptor::analyze(source, None, false, true)
                    .await
                    .map_err(|err| err.with_operation(Operation::PutBlock))?
                    .length
            }
        };
        if length > MAX_SERVICE_BLOCK_SIZE {
            return Err(
                Error::new(ErrorKind::InvalidInput, "block exceeds the service limit")
                    .with_operation(Operation::PutBlock)
                    .with_context("length", length)
                    .with_context("limit", MAX_SERVICE_BLOCK_SIZE),
            );
        }

        self.core
            .put_block(
                &self.path,
                block_id,
                RequestBody::Source {
                    source: &mut *source,
                    length,
                },
                condition,
                &options,
                ctx,
            )
            .await
    }

    /// Commit given blocks, in order, as the new content of this blob.
    pub async fn commit_block_list(
        &mut self,
        entries: &[BlockEntry],
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::PutBlockList))?;

        let props = self
            .core
            .put_block_list(
                &self.path,
                entries,
                None,
                &self.metadata,
                condition,
                &options,
                ctx,
            )
            .await?;

        self.properties.merge(props);
        Ok(())
    }

    /// List the blocks of this blob.
    pub async fn download_block_list(
        &self,
        filter: BlockListingFilter,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<Vec<BlockEntry>> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::GetBlockList))?;

        self.core
            .get_block_list(&self.path, filter, condition, &options, ctx)
            .await
    }

    /// Open a writer that commits everything written once closed.
    pub async fn open_write(
        &self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<BlobWriter> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::OpenWrite))?;
        let (block_size, _) = options.block_size();
        let store_md5 = options.store_blob_content_md5(BlobType::BlockBlob);

        let mut metadata = self.metadata.clone();
        let encryptor = match options.encryption_policy() {
            Some(policy) => Some(policy.create_encryptor(&mut metadata)?),
            None => None,
        };

        debug!(
            target: "azstorage::services::blob",
            "container={} name={} -> open block writer: block_size={}",
            self.path.container(),
            self.path.name(),
            block_size
        );

        let concurrent = options.concurrent_request_count();
        let target = UploadTarget {
            core: self.core.clone(),
            path: self.path.clone(),
            condition: condition.cloned(),
            options,
            ctx: ctx.clone(),
        };
        let w = BlockWriter::new(
            BlockUploader::new(target, metadata),
            block_size,
            concurrent,
            store_md5,
        );

        Ok(BlobWriter::block(w, encryptor))
    }

    /// Download the whole blob.
    pub async fn download(
        &mut self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<Bytes> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::GetBlob))?;

        let (props, bs) = self
            .core
            .download(&self.path, BlobType::BlockBlob, condition, &options, ctx)
            .await?;

        self.properties.merge(props);
        Ok(bs)
    }

    /// Refresh the cached properties.
    pub async fn fetch_properties(
        &mut self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::GetBlobProperties))?;

        let props = self
            .core
            .fetch_properties(&self.path, BlobType::BlockBlob, condition, &options, ctx)
            .await?;

        self.properties = props.clone();
        Ok(props)
    }

    /// Delete the blob.
    pub async fn delete(
        &mut self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::DeleteBlob))?;

        self.core
            .delete_blob(&self.path, condition, &options, ctx)
            .await?;

        self.properties = BlobProperties::new(BlobType::BlockBlob);
        Ok(())
    }
}

/// Pick the block size for content of `length`.
///
/// The configured size is scaled up so the content fits in the block count
/// limit, unless the caller chose it explicitly.
fn resolve_block_size(length: Option<u64>, options: &BlobRequestOptions) -> Result<usize> {
    let (block_size, customized) = options.block_size();
    let Some(length) = length else {
        return Ok(block_size);
    };

    if length.div_ceil(block_size as u64) <= MAX_BLOCK_COUNT {
        return Ok(block_size);
    }

    if customized {
        return Err(Error::new(
            ErrorKind::ConfigInvalid,
            "block_size is too small to upload the content within the block count limit",
        )
        .with_context("length", length)
        .with_context("block_size", block_size)
        .with_context("max_block_count", MAX_BLOCK_COUNT));
    }

    let scaled = length.div_ceil(MAX_BLOCK_COUNT);
    if scaled > MAX_SERVICE_BLOCK_SIZE {
        return Err(
            Error::new(ErrorKind::InvalidInput, "content is too large for a block blob")
                .with_context("length", length),
        );
    }

    usize::try_from(scaled).map_err(|_| {
        Error::new(ErrorKind::InvalidInput, "block size exceeds addressable memory")
            .with_context("block_size", scaled)
    })
}

/// Feed `head` and then the rest of `source` into the writer and commit.
///
/// `remaining` is the number of bytes still expected after `head`, `None`
/// reads until EOF.
async fn copy_blocks(
    w: &mut BlockWriter<BlockUploader>,
    source: &mut dyn Source,
    head: Bytes,
    mut remaining: Option<u64>,
    block_size: usize,
) -> Result<()> {
    w.write(head).await?;

    loop {
        let limit = match remaining {
            Some(0) => break,
            Some(v) => v.min(block_size as u64) as usize,
            None => block_size,
        };

        let bs = read_up_to(source, limit).await?;
        if bs.is_empty() {
            if let Some(v) = remaining {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "source ended before the declared length",
                )
                .with_context("missing", v));
            }
            break;
        }

        if let Some(v) = remaining.as_mut() {
            *v -= bs.len() as u64;
        }
        w.write(bs).await?;
    }

    w.close().await
}
