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

use std::future::Future;
use std::sync::Arc;

use base64::engine::general_purpose;
use base64::Engine;
use bytes::Bytes;
use bytes::BytesMut;
use futures::StreamExt;
use uuid::Uuid;

use crate::raw::oio::ContentHasher;
use crate::raw::*;
use crate::*;

/// BlockWrite is used to implement a writer based on block uploads. By
/// implementing BlockWrite, a blob client doesn't need to care about
/// buffering, block ids or concurrency.
///
/// # Architecture
///
/// - Services impl `BlockWrite`
/// - `BlockWriter` drives it with bounded concurrency
/// - Expose `BlockWriter` through [`crate::services::BlobWriter`]
///
/// # Notes
///
/// Unlike a plain object store, a block blob is always committed through
/// [`BlockWrite::complete_block`], even if no block was written, so an empty
/// writer produces an empty blob.
pub trait BlockWrite: Send + Sync + Unpin + 'static {
    /// write_block uploads one block.
    ///
    /// BlockWriter may call it concurrently for different blocks.
    fn write_block(&self, block_id: String, body: Bytes)
        -> impl Future<Output = Result<()>> + Send;

    /// complete_block commits the blocks in given order.
    ///
    /// `content_md5` is the MD5 of the whole content when requested.
    fn complete_block(
        &self,
        block_ids: Vec<String>,
        content_md5: Option<String>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Generate the id of block `index` in upload session `session`.
///
/// Ids of one session all have the same encoded length as long as the index
/// stays within six digits, which the block count limit guarantees.
pub fn format_block_id(session: &Uuid, index: usize) -> String {
    general_purpose::STANDARD.encode(format!("{session}-{index:06}"))
}

/// BlockWriter buffers writes into blocks of exactly `block_size` bytes,
/// uploads them with bounded concurrency and commits them in write order.
pub struct BlockWriter<W: BlockWrite> {
    w: Arc<W>,

    session: Uuid,
    block_size: usize,
    block_ids: Vec<String>,
    buffer: BytesMut,
    hasher: Option<ContentHasher>,
    futures: ConcurrentFutures<BoxedStaticFuture<Result<()>>>,
}

impl<W: BlockWrite> BlockWriter<W> {
    /// Create a new BlockWriter.
    ///
    /// `compute_md5` tracks the MD5 of everything written and passes it to
    /// [`BlockWrite::complete_block`].
    pub fn new(inner: W, block_size: usize, concurrent: usize, compute_md5: bool) -> Self {
        Self {
            w: Arc::new(inner),

            session: Uuid::new_v4(),
            block_size: block_size.max(1),
            block_ids: Vec::new(),
            buffer: BytesMut::new(),
            hasher: compute_md5.then(ContentHasher::default),
            futures: ConcurrentFutures::new(concurrent),
        }
    }

    /// The wrapped [`BlockWrite`].
    pub fn inner(&self) -> &W {
        &self.w
    }

    /// Ids of every block handed to the uploads so far, in write order.
    pub fn block_ids(&self) -> &[String] {
        &self.block_ids
    }

    /// Buffer `bs`, every full block is uploaded before this returns or is
    /// left in flight if there is room in the queue.
    pub async fn write(&mut self, mut bs: Bytes) -> Result<()> {
        if let Some(h) = self.hasher.as_mut() {
            h.update(&bs);
        }

        while !bs.is_empty() {
            let size = (self.block_size - self.buffer.len()).min(bs.len());
            self.buffer.extend_from_slice(&bs.split_to(size));

            if self.buffer.len() == self.block_size {
                let block = self.buffer.split().freeze();
                self.push_block(block).await?;
            }
        }

        Ok(())
    }

    /// Upload the remaining bytes, wait for every block and commit.
    pub async fn close(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let block = self.buffer.split().freeze();
            self.push_block(block).await?;
        }

        while let Some(res) = self.futures.next().await {
            if let Err(err) = res {
                self.futures.clear();
                return Err(err);
            }
        }

        let content_md5 = self.hasher.take().map(ContentHasher::finish);
        self.w
            .complete_block(self.block_ids.clone(), content_md5)
            .await
    }

    /// Drop every in-flight upload and buffered byte.
    ///
    /// Uploaded but uncommitted blocks are left to the service's garbage
    /// collection.
    pub async fn abort(&mut self) -> Result<()> {
        self.futures.clear();
        self.buffer.clear();
        self.block_ids.clear();
        Ok(())
    }

    async fn push_block(&mut self, block: Bytes) -> Result<()> {
        if self.block_ids.len() as u64 >= MAX_BLOCK_COUNT {
            self.futures.clear();
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "content needs more blocks than a blob can commit",
            )
            .with_context("block_size", self.block_size)
            .with_context("max_block_count", MAX_BLOCK_COUNT));
        }

        // Make room first, the first failure cancels every other upload.
        while !self.futures.has_remaining() {
            if let Some(Err(err)) = self.futures.next().await {
                self.futures.clear();
                return Err(err);
            }
        }

        let block_id = format_block_id(&self.session, self.block_ids.len());
        self.block_ids.push(block_id.clone());

        let w = self.w.clone();
        self.futures
            .push(Box::pin(async move { w.write_block(block_id, block).await }));
        Ok(())
    }
}
