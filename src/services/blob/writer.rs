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
use std::sync::Mutex;
use std::sync::PoisonError;

use bytes::Bytes;
use log::debug;

use super::core::BlobCore;
use super::core::BlobPath;
use super::core::BlockEntry;
use super::core::PageOperation;
use super::core::PageRange;
use crate::raw::oio::BlockWrite;
use crate::raw::oio::BlockWriter;
use crate::raw::oio::PageWrite;
use crate::raw::oio::PageWriter;
use crate::raw::*;
use crate::*;

/// Everything a block or page upload needs to issue its requests.
pub(super) struct UploadTarget {
    pub core: Arc<BlobCore>,
    pub path: BlobPath,
    pub condition: Option<AccessCondition>,
    pub options: BlobRequestOptions,
    pub ctx: OperationContext,
}

/// BlockUploader uploads blocks and commits them as the blob's new
/// content.
pub(super) struct BlockUploader {
    target: UploadTarget,
    metadata: HashMap<String, String>,
    committed: Mutex<Option<BlobProperties>>,
}

impl BlockUploader {
    pub fn new(target: UploadTarget, metadata: HashMap<String, String>) -> Self {
        Self {
            target,
            metadata,
            committed: Mutex::new(None),
        }
    }

    /// Properties returned by the commit.
    pub fn committed(&self) -> Option<BlobProperties> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BlockWrite for BlockUploader {
    async fn write_block(&self, block_id: String, body: Bytes) -> Result<()> {
        let t = &self.target;
        t.core
            .put_block(
                &t.path,
                &block_id,
                RequestBody::Bytes(body),
                t.condition.as_ref(),
                &t.options,
                &t.ctx,
            )
            .await
    }

    async fn complete_block(&self, block_ids: Vec<String>, content_md5: Option<String>) -> Result<()> {
        let t = &self.target;
        let entries: Vec<BlockEntry> = block_ids.into_iter().map(BlockEntry::latest).collect();
        debug!(
            target: "azstorage::services::blob",
            "container={} name={} -> commit block list: blocks={}",
            t.path.container(),
            t.path.name(),
            entries.len()
        );

        let props = t
            .core
            .put_block_list(
                &t.path,
                &entries,
                content_md5.as_deref(),
                &self.metadata,
                t.condition.as_ref(),
                &t.options,
                &t.ctx,
            )
            .await?;

        *self.committed.lock().unwrap_or_else(PoisonError::into_inner) = Some(props);
        Ok(())
    }
}

/// PageUploader writes pages of an existing page blob.
pub(super) struct PageUploader {
    target: UploadTarget,
    properties: Mutex<Option<BlobProperties>>,
}

impl PageUploader {
    pub fn new(target: UploadTarget, properties: BlobProperties) -> Self {
        Self {
            target,
            properties: Mutex::new(Some(properties)),
        }
    }

    /// Latest properties seen by a page write.
    pub fn properties(&self) -> Option<BlobProperties> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn merge(&self, props: BlobProperties) {
        let mut guard = self.properties.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(v) => v.merge(props),
            None => *guard = Some(props),
        }
    }
}

impl PageWrite for PageUploader {
    async fn write_page(&self, offset: u64, body: Bytes) -> Result<()> {
        let t = &self.target;
        let range = PageRange::from_offset(offset, body.len() as u64)?;
        let props = t
            .core
            .put_page(
                &t.path,
                range,
                PageOperation::Update,
                RequestBody::Bytes(body),
                t.condition.as_ref(),
                &t.options,
                &t.ctx,
            )
            .await?;

        self.merge(props);
        Ok(())
    }

    async fn complete_page(&self, content_md5: Option<String>) -> Result<()> {
        let Some(md5) = content_md5 else {
            return Ok(());
        };

        let t = &self.target;
        let props = t
            .core
            .set_blob_properties(
                &t.path,
                BlobType::PageBlob,
                None,
                Some(&md5),
                t.condition.as_ref(),
                &t.options,
                &t.ctx,
            )
            .await?;

        self.merge(props);
        Ok(())
    }
}

enum Inner {
    Block(BlockWriter<BlockUploader>),
    Page(PageWriter<PageUploader>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    Failed,
}

/// BlobWriter is a buffered output stream over a blob.
///
/// Block blobs are written as blocks and committed by [`BlobWriter::close`].
/// Page blobs are written page range by page range in place, the final
/// write must leave the content aligned to 512 bytes.
///
/// Nothing is visible in a block blob before `close` succeeds. A failed
/// write poisons the writer, every following call fails.
pub struct BlobWriter {
    inner: Inner,
    encryptor: Option<Box<dyn Encryptor>>,
    state: State,
}

impl std::fmt::Debug for BlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobWriter")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BlobWriter {
    pub(super) fn block(w: BlockWriter<BlockUploader>, encryptor: Option<Box<dyn Encryptor>>) -> Self {
        Self {
            inner: Inner::Block(w),
            encryptor,
            state: State::Open,
        }
    }

    pub(super) fn page(w: PageWriter<PageUploader>) -> Self {
        Self {
            inner: Inner::Page(w),
            encryptor: None,
            state: State::Open,
        }
    }

    /// Type of the blob being written.
    pub fn blob_type(&self) -> BlobType {
        match &self.inner {
            Inner::Block(_) => BlobType::BlockBlob,
            Inner::Page(_) => BlobType::PageBlob,
        }
    }

    /// Properties of the blob after the last successful request, `None`
    /// for a block blob that isn't committed yet.
    pub fn properties(&self) -> Option<BlobProperties> {
        match &self.inner {
            Inner::Block(w) => w.inner().committed(),
            Inner::Page(w) => w.inner().properties(),
        }
    }

    /// Write `bs` into the blob.
    pub async fn write(&mut self, bs: Bytes) -> Result<()> {
        self.check_open(Operation::WriterWrite)?;

        let res = self.write_inner(bs).await;
        self.track(res, Operation::WriterWrite)
    }

    /// Flush everything and finish the blob.
    pub async fn close(&mut self) -> Result<()> {
        self.check_open(Operation::WriterClose)?;

        let res = self.close_inner().await;
        let res = self.track(res, Operation::WriterClose);
        if res.is_ok() {
            self.state = State::Closed;
        }
        res
    }

    /// Drop everything in flight, the writer can't be used afterwards.
    ///
    /// Uncommitted blocks are left to the service's garbage collection,
    /// pages already written stay written.
    pub async fn abort(&mut self) -> Result<()> {
        self.state = State::Closed;
        let res = match &mut self.inner {
            Inner::Block(w) => w.abort().await,
            Inner::Page(w) => w.abort().await,
        };
        res.map_err(|err| err.with_operation(Operation::WriterAbort))
    }

    async fn write_inner(&mut self, bs: Bytes) -> Result<()> {
        let bs = match self.encryptor.as_mut() {
            Some(e) => e.update(&bs)?,
            None => bs,
        };

        match &mut self.inner {
            Inner::Block(w) => w.write(bs).await,
            Inner::Page(w) => w.write(bs).await,
        }
    }

    async fn close_inner(&mut self) -> Result<()> {
        if let Some(mut e) = self.encryptor.take() {
            let tail = e.finalize()?;
            if let Inner::Block(w) = &mut self.inner {
                w.write(tail).await?;
            }
        }

        match &mut self.inner {
            Inner::Block(w) => w.close().await,
            Inner::Page(w) => w.close().await,
        }
    }

    fn check_open(&self, op: Operation) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(Error::new(ErrorKind::Unexpected, "writer has been closed")
                .with_operation(op)),
            State::Failed => Err(Error::new(
                ErrorKind::Unexpected,
                "writer failed before, the blob must be written again",
            )
            .with_operation(op)),
        }
    }

    fn track(&mut self, res: Result<()>, op: Operation) -> Result<()> {
        if let Err(err) = &res {
            debug!(
                target: "azstorage::services::blob",
                "blob_type={} -> writer failed: {}",
                self.blob_type(),
                err
            );
            self.state = State::Failed;
        }

        res.map_err(|err| err.with_operation(op))
    }
}
