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

use bytes::Bytes;
use bytes::BytesMut;
use futures::StreamExt;

use crate::raw::oio::ContentHasher;
use crate::raw::*;
use crate::*;

/// PageWrite is used to implement a writer over a page blob of fixed
/// length.
///
/// Page blobs require every write to be aligned to 512 bytes, PageWriter
/// keeps buffers aligned and only the final flush may be short, as long as
/// it's aligned too.
pub trait PageWrite: Send + Sync + Unpin + 'static {
    /// write_page writes `body` at `offset`.
    ///
    /// Both `offset` and the body length are multiples of 512.
    fn write_page(&self, offset: u64, body: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// complete_page finishes the write once every page succeeded.
    fn complete_page(&self, content_md5: Option<String>) -> impl Future<Output = Result<()>> + Send;
}

/// PageWriter implements sequential writes on top of [`PageWrite`].
pub struct PageWriter<W: PageWrite> {
    w: Arc<W>,

    write_size: usize,
    /// Blob offset of the first buffered byte.
    offset: u64,
    /// Length of the blob, writes can't pass it.
    length: u64,
    buffer: BytesMut,
    hasher: Option<ContentHasher>,
    futures: ConcurrentFutures<BoxedStaticFuture<Result<()>>>,
}

impl<W: PageWrite> PageWriter<W> {
    /// Create a new PageWriter writing from offset 0 of a blob of `length`.
    pub fn new(inner: W, length: u64, write_size: usize, concurrent: usize, compute_md5: bool) -> Self {
        Self {
            w: Arc::new(inner),

            write_size: write_size.max(PAGE_SIZE),
            offset: 0,
            length,
            buffer: BytesMut::new(),
            hasher: compute_md5.then(ContentHasher::default),
            futures: ConcurrentFutures::new(concurrent),
        }
    }

    /// The wrapped [`PageWrite`].
    pub fn inner(&self) -> &W {
        &self.w
    }

    /// Buffer `bs`, each full buffer becomes one page write.
    pub async fn write(&mut self, mut bs: Bytes) -> Result<()> {
        let end = self.offset + self.buffer.len() as u64 + bs.len() as u64;
        if end > self.length {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "write exceeds the length of the page blob",
            )
            .with_context("length", self.length)
            .with_context("end", end));
        }

        if let Some(h) = self.hasher.as_mut() {
            h.update(&bs);
        }

        while !bs.is_empty() {
            let size = (self.write_size - self.buffer.len()).min(bs.len());
            self.buffer.extend_from_slice(&bs.split_to(size));

            if self.buffer.len() == self.write_size {
                self.flush().await?;
            }
        }

        Ok(())
    }

    /// Flush the aligned remainder and wait for every page.
    pub async fn close(&mut self) -> Result<()> {
        if self.buffer.len() % PAGE_SIZE != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "page blob content must be aligned to 512 bytes",
            )
            .with_context("remaining", self.buffer.len()));
        }

        if !self.buffer.is_empty() {
            self.flush().await?;
        }

        while let Some(res) = self.futures.next().await {
            if let Err(err) = res {
                self.futures.clear();
                return Err(err);
            }
        }

        let content_md5 = self.hasher.take().map(ContentHasher::finish);
        self.w.complete_page(content_md5).await
    }

    /// Drop every in-flight write, pages already written stay written.
    pub async fn abort(&mut self) -> Result<()> {
        self.futures.clear();
        self.buffer.clear();
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        while !self.futures.has_remaining() {
            if let Some(Err(err)) = self.futures.next().await {
                self.futures.clear();
                return Err(err);
            }
        }

        let body = self.buffer.split().freeze();
        let offset = self.offset;
        self.offset += body.len() as u64;

        let w = self.w.clone();
        self.futures
            .push(Box::pin(async move { w.write_page(offset, body).await }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, Default)]
    struct MockPageWrite {
        pages: Arc<Mutex<Vec<(u64, usize)>>>,
        completed: Arc<Mutex<Option<Option<String>>>>,
    }

    impl PageWrite for MockPageWrite {
        async fn write_page(&self, offset: u64, body: Bytes) -> Result<()> {
            self.pages.lock().unwrap().push((offset, body.len()));
            Ok(())
        }

        async fn complete_page(&self, content_md5: Option<String>) -> Result<()> {
            *self.completed.lock().unwrap() = Some(content_md5);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_aligned_writes() {
        let mock = MockPageWrite::default();
        let mut w = PageWriter::new(mock.clone(), 8192, 2048, 2, true);

        let data = Bytes::from(vec![3u8; 5120]);
        w.write(data.slice(..1000)).await.unwrap();
        w.write(data.slice(1000..)).await.unwrap();
        w.close().await.unwrap();

        let mut pages = mock.pages.lock().unwrap().clone();
        pages.sort();
        assert_eq!(pages, vec![(0, 2048), (2048, 2048), (4096, 1024)]);
        assert_eq!(
            *mock.completed.lock().unwrap(),
            Some(Some(format_content_md5(&data)))
        );
    }

    #[tokio::test]
    async fn test_unaligned_close() {
        let mock = MockPageWrite::default();
        let mut w = PageWriter::new(mock.clone(), 8192, 2048, 1, false);

        w.write(Bytes::from(vec![0u8; 700])).await.unwrap();
        let err = w.close().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(mock.completed.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_past_length() {
        let mock = MockPageWrite::default();
        let mut w = PageWriter::new(mock.clone(), 1024, 512, 1, false);

        w.write(Bytes::from(vec![0u8; 1024])).await.unwrap();
        let err = w.write(Bytes::from(vec![0u8; 1])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        w.close().await.unwrap();
        assert_eq!(*mock.pages.lock().unwrap(), vec![(0, 512), (512, 512)]);
    }
}
