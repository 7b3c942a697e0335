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

use async_trait::async_trait;
use bytes::Bytes;
use bytes::BytesMut;

use crate::raw::oio::Source;
use crate::*;

/// EncryptingSource yields the ciphertext of another source.
///
/// The encryptor can't be replayed, so this source never rewinds. Callers
/// buffer the ciphertext they may need to resend.
pub struct EncryptingSource<'a> {
    inner: &'a mut dyn Source,
    encryptor: Box<dyn Encryptor>,
    buffer: BytesMut,
    finished: bool,
}

impl<'a> EncryptingSource<'a> {
    /// Encrypt `inner` with `encryptor`.
    pub fn new(inner: &'a mut dyn Source, encryptor: Box<dyn Encryptor>) -> Self {
        Self {
            inner,
            encryptor,
            buffer: BytesMut::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl Source for EncryptingSource<'_> {
    async fn read(&mut self, limit: usize) -> Result<Bytes> {
        while self.buffer.is_empty() && !self.finished {
            let bs = self.inner.read(limit.max(1)).await?;
            if bs.is_empty() {
                self.buffer.extend_from_slice(&self.encryptor.finalize()?);
                self.finished = true;
            } else {
                self.buffer.extend_from_slice(&self.encryptor.update(&bs)?);
            }
        }

        let size = limit.min(self.buffer.len());
        Ok(self.buffer.split_to(size).freeze())
    }

    fn checkpoint(&mut self) {}

    fn rewind(&mut self) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "encrypted source can't be rewound",
        ))
    }

    fn is_rewindable(&self) -> bool {
        false
    }
}
