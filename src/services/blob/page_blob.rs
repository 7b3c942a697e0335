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

use super::core::BlobCore;
use super::core::BlobPath;
use super::core::PageOperation;
use super::core::PageRange;
use super::writer::PageUploader;
use super::writer::UploadTarget;
use super::BlobWriter;
use crate::raw::oio::PageWriter;
use crate::raw::oio::Source;
use crate::raw::oio::StreamDescriptor;
use crate::raw::*;
use crate::*;

/// PageBlob is a handle on a page blob.
///
/// Page blobs have a fixed length set by [`PageBlob::create`] or
/// [`PageBlob::resize`], content is written in place by 512-byte aligned
/// page ranges.
#[derive(Debug, Clone)]
pub struct PageBlob {
    core: Arc<BlobCore>,
    path: BlobPath,
    properties: BlobProperties,
    metadata: HashMap<String, String>,
}

impl PageBlob {
    pub(super) fn new(core: Arc<BlobCore>, path: BlobPath) -> Self {
        Self {
            core,
            path,
            properties: BlobProperties::new(BlobType::PageBlob),
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

    /// Metadata sent when the blob is created.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Mutable access to the metadata sent when the blob is created.
    pub fn metadata_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.metadata
    }

    /// Create an empty page blob of `length` bytes, replacing any existing
    /// blob.
    pub async fn create(
        &mut self,
        length: u64,
        sequence_number: Option<u64>,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self.page_options(options, Operation::CreatePageBlob)?;
        check_page_aligned(length).map_err(|err| err.with_operation(Operation::CreatePageBlob))?;

        let props = self
            .core
            .create_page_blob(
                &self.path,
                length,
                sequence_number,
                &self.metadata,
                condition,
                &options,
                ctx,
            )
            .await?;

        self.properties = props;
        Ok(())
    }

    /// Write `length` bytes of `source` at `offset`.
    ///
    /// `None` reads until EOF which requires a rewindable source. The range
    /// must be aligned to 512 bytes and at most 4 MiB.
    pub async fn upload_pages(
        &mut self,
        offset: u64,
        source: &mut dyn Source,
        length: Option<u64>,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self.page_options(options, Operation::PutPage)?;

        let length = match length {
            Some(v) => v,
            None => {
                StreamDescriptor::analyze(source, Some(MAX_PAGE_UPDATE_SIZE as u64), false, true)
                    .await
                    .map_err(|err| err.with_operation(Operation::PutPage))?
                    .length
            }
        };
        if length > MAX_PAGE_UPDATE_SIZE as u64 {
            return Err(
                Error::new(ErrorKind::InvalidInput, "page update exceeds 4 MiB")
                    .with_operation(Operation::PutPage)
                    .with_context("length", length),
            );
        }
        let range = PageRange::from_offset(offset, length)
            .map_err(|err| err.with_operation(Operation::PutPage))?;

        let props = self
            .put_pages(
                range,
                PageOperation::Update,
                RequestBody::Source {
                    source: &mut *source,
                    length,
                },
                condition,
                &options,
                ctx,
            )
            .await?;

        self.properties.merge(props);
        Ok(())
    }

    /// Zero `length` bytes starting at `offset`.
    pub async fn clear_pages(
        &mut self,
        offset: u64,
        length: u64,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self.page_options(options, Operation::ClearPage)?;
        let range = PageRange::from_offset(offset, length)
            .map_err(|err| err.with_operation(Operation::ClearPage))?;

        let props = self
            .put_pages(
                range,
                PageOperation::Clear,
                RequestBody::Empty,
                condition,
                &options,
                ctx,
            )
            .await?;

        self.properties.merge(props);
        Ok(())
    }

    /// `body` shares the lifetime of every other borrow.
    async fn put_pages<'a>(
        &'a self,
        range: PageRange,
        op: PageOperation,
        body: RequestBody<'a>,
        condition: Option<&'a AccessCondition>,
        options: &'a BlobRequestOptions,
        ctx: &OperationContext,
    ) -> Result<BlobProperties> {
        debug!(
            target: "azstorage::services::blob",
            "container={} name={} -> put pages: op={:?} range={}-{}",
            self.path.container(),
            self.path.name(),
            op,
            range.start(),
            range.end()
        );

        self.core
            .put_page(&self.path, range, op, body, condition, options, ctx)
            .await
    }

    /// Change the length of the blob, truncating or zero extending it.
    pub async fn resize(
        &mut self,
        length: u64,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(Operation::ResizeBlob))?;
        check_page_aligned(length).map_err(|err| err.with_operation(Operation::ResizeBlob))?;

        let props = self
            .core
            .set_blob_properties(
                &self.path,
                BlobType::PageBlob,
                Some(length),
                None,
                condition,
                &options,
                ctx,
            )
            .await?;

        self.properties.merge(props);
        Ok(())
    }

    /// Create the blob with `length` bytes and open a writer over it.
    pub async fn open_write_new(
        &mut self,
        length: u64,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<BlobWriter> {
        let options = self.page_options(options, Operation::OpenWrite)?;
        check_page_aligned(length).map_err(|err| err.with_operation(Operation::OpenWrite))?;

        let props = self
            .core
            .create_page_blob(
                &self.path,
                length,
                None,
                &self.metadata,
                condition,
                &options,
                ctx,
            )
            .await?;
        self.properties = props.clone();

        Ok(self.page_writer(length, props, condition, options, ctx))
    }

    /// Open a writer over the existing blob, its length is kept.
    pub async fn open_write_existing(
        &mut self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<BlobWriter> {
        let options = self.page_options(options, Operation::OpenWrite)?;
        if options.store_blob_content_md5(BlobType::PageBlob) {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "store_blob_content_md5 can't be used when writing to an existing page blob",
            )
            .with_operation(Operation::OpenWrite));
        }

        let props = self
            .core
            .fetch_properties(&self.path, BlobType::PageBlob, condition, &options, ctx)
            .await?;
        self.properties = props.clone();

        let length = props.length.unwrap_or_default();
        Ok(self.page_writer(length, props, condition, options, ctx))
    }

    fn page_writer(
        &self,
        length: u64,
        props: BlobProperties,
        condition: Option<&AccessCondition>,
        options: BlobRequestOptions,
        ctx: &OperationContext,
    ) -> BlobWriter {
        // Only the lease still applies to the pages written after opening,
        // every write changes the etag and sequence number.
        let condition = condition.map(|c| AccessCondition {
            lease_id: c.lease_id.clone(),
            ..Default::default()
        });
        let write_size = options.page_write_size();
        let concurrent = options.concurrent_request_count();
        let store_md5 = options.store_blob_content_md5(BlobType::PageBlob);

        debug!(
            target: "azstorage::services::blob",
            "container={} name={} -> open page writer: length={} write_size={}",
            self.path.container(),
            self.path.name(),
            length,
            write_size
        );

        let target = UploadTarget {
            core: self.core.clone(),
            path: self.path.clone(),
            condition,
            options,
            ctx: ctx.clone(),
        };
        let w = PageWriter::new(
            PageUploader::new(target, props),
            length,
            write_size,
            concurrent,
            store_md5,
        );

        BlobWriter::page(w)
    }

    /// Download the whole blob.
    pub async fn download(
        &mut self,
        condition: Option<&AccessCondition>,
        options: Option<&BlobRequestOptions>,
        ctx: &OperationContext,
    ) -> Result<Bytes> {
        let options = self.page_options(options, Operation::GetBlob)?;

        let (props, bs) = self
            .core
            .download(&self.path, BlobType::PageBlob, condition, &options, ctx)
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
            .fetch_properties(&self.path, BlobType::PageBlob, condition, &options, ctx)
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

        self.properties = BlobProperties::new(BlobType::PageBlob);
        Ok(())
    }

    /// Resolve options for an operation touching page content, page blobs
    /// don't support client side encryption.
    fn page_options(
        &self,
        options: Option<&BlobRequestOptions>,
        op: Operation,
    ) -> Result<BlobRequestOptions> {
        let options = self
            .core
            .blob_options(options)
            .map_err(|err| err.with_operation(op))?;
        if options.encryption_policy().is_some() {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "encryption is not supported for page blobs",
            )
            .with_operation(op));
        }
        Ok(options)
    }
}

fn check_page_aligned(length: u64) -> Result<()> {
    if length % PAGE_SIZE as u64 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "page blob length must be a multiple of 512",
        )
        .with_context("length", length));
    }
    Ok(())
}
