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

use base64::engine::general_purpose;
use base64::Engine;
use md5::Digest;
use md5::Md5;

use crate::raw::oio::Source;
use crate::*;

const ANALYZE_CHUNK_SIZE: usize = 64 * 1024;

/// StreamDescriptor is the length and optional MD5 of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Number of bytes seen.
    pub length: u64,
    /// Base64 encoded MD5 of those bytes.
    pub md5: Option<String>,
}

impl StreamDescriptor {
    /// Describe an in-memory buffer.
    pub fn from_bytes(bs: &[u8], compute_md5: bool) -> Self {
        let md5 = compute_md5.then(|| {
            let mut hasher = ContentHasher::default();
            hasher.update(bs);
            hasher.finish()
        });

        Self {
            length: bs.len() as u64,
            md5,
        }
    }

    /// Describe a source by consuming it.
    ///
    /// At most `max_length + 1` bytes are read, so a `length` greater than
    /// `max_length` means "too large" and the md5 only covers what was read.
    /// The source is rewound afterwards when `rewind` is set.
    pub async fn analyze(
        source: &mut dyn Source,
        max_length: Option<u64>,
        compute_md5: bool,
        rewind: bool,
    ) -> Result<Self> {
        if rewind && !source.is_rewindable() {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "source must be rewindable to be analyzed",
            ));
        }

        source.checkpoint();

        let limit = max_length.map_or(u64::MAX, |v| v.saturating_add(1));
        let mut hasher = compute_md5.then(ContentHasher::default);
        let mut length = 0u64;
        while length < limit {
            let size = (limit - length).min(ANALYZE_CHUNK_SIZE as u64) as usize;
            let bs = source.read(size).await?;
            if bs.is_empty() {
                break;
            }

            length += bs.len() as u64;
            if let Some(h) = hasher.as_mut() {
                h.update(&bs);
            }
        }

        if rewind {
            source.rewind()?;
        }

        Ok(Self {
            length,
            md5: hasher.map(ContentHasher::finish),
        })
    }
}

/// ContentHasher is an incremental base64 encoded MD5.
#[derive(Clone, Default)]
pub struct ContentHasher(Md5);

impl ContentHasher {
    /// Feed more bytes.
    pub fn update(&mut self, bs: &[u8]) {
        self.0.update(bs);
    }

    /// Base64 encoded digest, the form used by `Content-MD5`.
    pub fn finish(self) -> String {
        general_purpose::STANDARD.encode(self.0.finalize())
    }
}
