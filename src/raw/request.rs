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

use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::Request;
use http::Response;
use http::StatusCode;

use crate::raw::oio::Source;
use crate::raw::*;
use crate::*;

/// Builds the http request of one attempt from the resolved endpoint and
/// the body bytes.
pub type BuildRequest<'a> = Box<dyn Fn(&str, Bytes) -> Result<Request<Bytes>> + Send + Sync + 'a>;
/// Applies access conditions and metadata.
pub type SetHeaders<'a> = Box<dyn Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync + 'a>;
/// Decides from the status alone whether an attempt succeeded.
pub type PreProcess<'a> = Box<dyn Fn(StatusCode, &HeaderMap) -> Disposition + Send + Sync + 'a>;
/// Turns a successful response into the operation result.
pub type PostProcess<'a, T> = Box<dyn Fn(Response<Bytes>) -> Result<T> + Send + Sync + 'a>;
/// Extra recovery run after the body has been rewound.
pub type Recovery<'a> = Box<dyn FnMut() -> Result<()> + Send + 'a>;

/// Disposition is the verdict of [`StorageRequest`]'s pre process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Go on with post process.
    Success,
    /// Parse the error response and classify it by status.
    Failure,
    /// Parse the error response and retry it regardless of status.
    RetryableFailure,
}

/// RequestBody is the payload of a request, replayed on every attempt.
pub enum RequestBody<'a> {
    /// No payload.
    Empty,
    /// In-memory payload, cloned per attempt.
    Bytes(Bytes),
    /// Exactly `length` bytes read from `source` on every attempt.
    Source {
        /// The positioned source.
        source: &'a mut dyn Source,
        /// Number of bytes to send.
        length: u64,
    },
}

impl Debug for RequestBody<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Bytes(bs) => write!(f, "Bytes({})", bs.len()),
            RequestBody::Source { length, .. } => write!(f, "Source({length})"),
        }
    }
}

impl RequestBody<'_> {
    /// Number of bytes sent by every attempt.
    pub fn content_length(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(bs) => bs.len() as u64,
            RequestBody::Source { length, .. } => *length,
        }
    }

    pub(crate) fn checkpoint(&mut self) {
        if let RequestBody::Source { source, .. } = self {
            source.checkpoint();
        }
    }

    pub(crate) async fn read(&mut self) -> Result<Bytes> {
        match self {
            RequestBody::Empty => Ok(Bytes::new()),
            RequestBody::Bytes(bs) => Ok(bs.clone()),
            RequestBody::Source { source, length } => oio::read_exact(&mut **source, *length).await,
        }
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        match self {
            RequestBody::Source { source, .. } => source.rewind(),
            _ => Ok(()),
        }
    }
}

/// StorageRequest describes one operation for [`execute`].
///
/// It's a bag of closures, each attempt calls them in order:
/// `build_request`, `set_headers`, sign, send, `pre_process` and finally
/// `post_process`. Nothing here mutates the resource, the value returned by
/// `post_process` is applied by the caller once the operation succeeded.
pub struct StorageRequest<'a, T> {
    pub(crate) operation: Operation,
    pub(crate) location_mode: RequestLocationMode,
    pub(crate) body: RequestBody<'a>,
    pub(crate) content_md5: bool,
    pub(crate) build_request: BuildRequest<'a>,
    pub(crate) set_headers: Option<SetHeaders<'a>>,
    pub(crate) signer: Option<Arc<dyn Sign>>,
    pub(crate) pre_process: PreProcess<'a>,
    pub(crate) post_process: PostProcess<'a, T>,
    pub(crate) recovery: Option<Recovery<'a>>,
}

impl<'a, T> StorageRequest<'a, T> {
    /// Create a new request for operation.
    ///
    /// Any 2xx status is a success until [`StorageRequest::expect`] narrows
    /// it down.
    pub fn new(
        operation: Operation,
        build_request: impl Fn(&str, Bytes) -> Result<Request<Bytes>> + Send + Sync + 'a,
        post_process: impl Fn(Response<Bytes>) -> Result<T> + Send + Sync + 'a,
    ) -> Self {
        Self {
            operation,
            location_mode: RequestLocationMode::PrimaryOnly,
            body: RequestBody::Empty,
            content_md5: false,
            build_request: Box::new(build_request),
            set_headers: None,
            signer: None,
            pre_process: Box::new(|status: StatusCode, _: &HeaderMap| {
                if status.is_success() {
                    Disposition::Success
                } else {
                    Disposition::Failure
                }
            }),
            post_process: Box::new(post_process),
            recovery: None,
        }
    }

    /// The operation of this request.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Set the locations this request may be sent to.
    pub fn with_location_mode(mut self, mode: RequestLocationMode) -> Self {
        self.location_mode = mode;
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: RequestBody<'a>) -> Self {
        self.body = body;
        self
    }

    /// Send `Content-MD5` computed over the exact bytes of every attempt.
    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.content_md5 = enabled;
        self
    }

    /// Only treat given statuses as success.
    pub fn expect(mut self, statuses: &'static [StatusCode]) -> Self {
        self.pre_process = Box::new(move |status: StatusCode, _: &HeaderMap| {
            if statuses.contains(&status) {
                Disposition::Success
            } else {
                Disposition::Failure
            }
        });
        self
    }

    /// Replace the status check.
    pub fn with_pre_process(
        mut self,
        f: impl Fn(StatusCode, &HeaderMap) -> Disposition + Send + Sync + 'a,
    ) -> Self {
        self.pre_process = Box::new(f);
        self
    }

    /// Set the header hook.
    pub fn with_set_headers(
        mut self,
        f: impl Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync + 'a,
    ) -> Self {
        self.set_headers = Some(Box::new(f));
        self
    }

    /// Sign with given signer instead of the client's.
    pub fn with_signer(mut self, signer: Arc<dyn Sign>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Run `f` after the body has been rewound before every retry.
    pub fn with_recovery(mut self, f: impl FnMut() -> Result<()> + Send + 'a) -> Self {
        self.recovery = Some(Box::new(f));
        self
    }

    /// Prepare the request for the next attempt.
    pub(crate) fn recover(&mut self) -> Result<()> {
        self.body.rewind()?;
        if let Some(f) = self.recovery.as_mut() {
            f()?;
        }
        Ok(())
    }
}
