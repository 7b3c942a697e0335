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

use std::cmp::min;

use async_trait::async_trait;
use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

use crate::raw::*;
use crate::*;

/// Source is a request body that can be replayed after a failed attempt.
///
/// The engine calls [`Source::checkpoint`] before the first attempt and
/// [`Source::rewind`] before every retry, so each attempt sends exactly the
/// same bytes.
#[async_trait]
pub trait Source: Send {
    /// Read at most `limit` bytes, an empty result means EOF.
    async fn read(&mut self, limit: usize) -> Result<Bytes>;

    /// Remember the current position, bytes before it can be released.
    fn checkpoint(&mut self);

    /// Go back to the last checkpoint.
    ///
    /// Returns an error if the bytes since the checkpoint are gone.
    fn rewind(&mut self) -> Result<()>;

    /// Check if [`Source::rewind`] can currently succeed.
    fn is_rewindable(&self) -> bool;
}

/// Read exactly `size` bytes from source.
///
/// A source that ends early is a permanent error, retrying can't make the
/// missing bytes appear.
pub async fn read_exact(source: &mut dyn Source, size: u64) -> Result<Bytes> {
    let size = usize::try_from(size).map_err(|_| {
        Error::new(ErrorKind::InvalidInput, "body length exceeds addressable memory")
            .with_context("size", size)
    })?;

    let mut buf = BytesMut::with_capacity(size);
    while buf.len() < size {
        let bs = source.read(size - buf.len()).await?;
        if bs.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "source ended before the declared length",
            )
            .with_context("expected", size)
            .with_context("actual", buf.len()));
        }
        buf.extend_from_slice(&bs);
    }

    Ok(buf.freeze())
}

/// Read from source until EOF or `limit` bytes.
pub async fn read_up_to(source: &mut dyn Source, limit: usize) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while buf.len() < limit {
        let bs = source.read(limit - buf.len()).await?;
        if bs.is_empty() {
            break;
        }
        buf.extend_from_slice(&bs);
    }

    Ok(buf.freeze())
}

/// BytesSource is an in-memory source, it can always rewind.
#[derive(Debug, Clone, Default)]
pub struct BytesSource {
    data: Bytes,
    pos: usize,
    mark: usize,
}

impl BytesSource {
    /// Create a new source over given bytes.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            mark: 0,
        }
    }

    /// Total size of the data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the source holds no data at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for BytesSource {
    fn from(v: Bytes) -> Self {
        Self::new(v)
    }
}

impl From<Vec<u8>> for BytesSource {
    fn from(v: Vec<u8>) -> Self {
        Self::new(Bytes::from(v))
    }
}

impl From<String> for BytesSource {
    fn from(v: String) -> Self {
        Self::new(Bytes::from(v))
    }
}

impl From<&'static str> for BytesSource {
    fn from(v: &'static str) -> Self {
        Self::new(Bytes::from_static(v.as_bytes()))
    }
}

impl From<&'static [u8]> for BytesSource {
    fn from(v: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(v))
    }
}

#[async_trait]
impl Source for BytesSource {
    async fn read(&mut self, limit: usize) -> Result<Bytes> {
        let end = min(self.pos + limit, self.data.len());
        let bs = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(bs)
    }

    fn checkpoint(&mut self) {
        self.mark = self.pos;
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = self.mark;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}

/// RewindableReader turns any [`AsyncRead`] into a [`Source`] by retaining
/// the bytes read since the last checkpoint.
///
/// At most `max_retained` bytes are kept. Once more than that has been read
/// past a checkpoint, the source can't rewind until the next checkpoint.
pub struct RewindableReader<R> {
    inner: R,
    retained: BytesMut,
    /// Replay position inside `retained`.
    pos: usize,
    max_retained: usize,
    overflowed: bool,
}

impl<R: AsyncRead + Unpin + Send> RewindableReader<R> {
    /// Create a new reader retaining up to `max_retained` bytes.
    pub fn new(inner: R, max_retained: usize) -> Self {
        Self {
            inner,
            retained: BytesMut::new(),
            pos: 0,
            max_retained,
            overflowed: false,
        }
    }

    /// Consume self and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Source for RewindableReader<R> {
    async fn read(&mut self, limit: usize) -> Result<Bytes> {
        if self.pos < self.retained.len() {
            let end = min(self.pos + limit, self.retained.len());
            let bs = Bytes::copy_from_slice(&self.retained[self.pos..end]);
            self.pos = end;
            return Ok(bs);
        }

        let mut buf = vec![0; limit];
        let n = self.inner.read(&mut buf).await.map_err(new_std_io_error)?;
        buf.truncate(n);

        if !self.overflowed && n > 0 {
            if self.retained.len() + n > self.max_retained {
                self.overflowed = true;
                self.retained.clear();
                self.pos = 0;
            } else {
                self.retained.extend_from_slice(&buf);
                self.pos += n;
            }
        }

        Ok(Bytes::from(buf))
    }

    fn checkpoint(&mut self) {
        self.retained.advance(self.pos);
        self.pos = 0;
        self.overflowed = false;
    }

    fn rewind(&mut self) -> Result<()> {
        if self.overflowed {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "source can't rewind, retained bytes exceed the limit",
            )
            .with_context("max_retained", self.max_retained));
        }

        self.pos = 0;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        !self.overflowed
    }
}

/// TakeSource yields exactly `length` bytes of the inner source.
///
/// An inner source that ends before `length` is an `InvalidInput` error.
pub struct TakeSource<'a> {
    inner: &'a mut dyn Source,
    remaining: u64,
    mark: u64,
}

impl<'a> TakeSource<'a> {
    /// Create a new source limited to `length` bytes.
    pub fn new(inner: &'a mut dyn Source, length: u64) -> Self {
        Self {
            inner,
            remaining: length,
            mark: length,
        }
    }
}

#[async_trait]
impl Source for TakeSource<'_> {
    async fn read(&mut self, limit: usize) -> Result<Bytes> {
        if self.remaining == 0 || limit == 0 {
            return Ok(Bytes::new());
        }

        let limit = usize::try_from(self.remaining).map_or(limit, |r| min(r, limit));
        let bs = self.inner.read(limit).await?;
        if bs.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "source ended before the declared length",
            )
            .with_context("missing", self.remaining));
        }

        self.remaining -= bs.len() as u64;
        Ok(bs)
    }

    fn checkpoint(&mut self) {
        self.inner.checkpoint();
        self.mark = self.remaining;
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()?;
        self.remaining = self.mark;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        self.inner.is_rewindable()
    }
}
