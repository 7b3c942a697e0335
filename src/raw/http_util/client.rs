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
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::LazyLock;

use bytes::Bytes;
use futures::Future;
use http::Request;
use http::Response;

use crate::raw::*;
use crate::*;

/// Shared reqwest client used when no [`HttpFetch`] is configured.
static GLOBAL_REQWEST_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// HttpFetcher is a type erased [`HttpFetch`].
pub type HttpFetcher = Arc<dyn HttpFetchDyn>;

/// HttpClient sends fully buffered requests and returns fully buffered
/// responses.
///
/// Blob payloads are bounded by block and page sizes, so every body fits in
/// memory.
#[derive(Clone)]
pub struct HttpClient {
    fetcher: HttpFetcher,
}

/// We don't want users to know details about our clients.
impl Debug for HttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            fetcher: Arc::new(GLOBAL_REQWEST_CLIENT.clone()),
        }
    }
}

impl HttpClient {
    /// Construct `Self` with given [`HttpFetch`].
    pub fn with(client: impl HttpFetch) -> Self {
        Self {
            fetcher: Arc::new(client),
        }
    }

    /// Send a request and read the whole response.
    pub async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.fetcher.fetch(req).await
    }
}

/// HttpFetch is the trait to send a request in async way.
///
/// Implement this trait to plug in another http client or a fake service.
pub trait HttpFetch: Send + Sync + Unpin + 'static {
    /// Send a request and read the whole response.
    ///
    /// Errors returned here are transport failures, a response with any
    /// status code must be returned as `Ok`.
    fn fetch(&self, req: Request<Bytes>) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// HttpFetchDyn is the dyn version of [`HttpFetch`]
/// which make it possible to use as `Arc<dyn HttpFetchDyn>`.
/// User should never implement this trait, but use `HttpFetch` instead.
pub trait HttpFetchDyn: Send + Sync + Unpin + 'static {
    /// The dyn version of [`HttpFetch::fetch`].
    fn fetch_dyn(&self, req: Request<Bytes>) -> BoxedFuture<'_, Result<Response<Bytes>>>;
}

impl<T: HttpFetch + ?Sized> HttpFetchDyn for T {
    fn fetch_dyn(&self, req: Request<Bytes>) -> BoxedFuture<'_, Result<Response<Bytes>>> {
        Box::pin(self.fetch(req))
    }
}

impl<T: HttpFetchDyn + ?Sized> HttpFetch for Arc<T> {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.deref().fetch_dyn(req).await
    }
}

impl HttpFetch for reqwest::Client {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let uri = req.uri().clone();
        let (parts, body) = req.into_parts();

        let url = reqwest::Url::from_str(&uri.to_string()).map_err(|err| {
            Error::new(ErrorKind::ConfigInvalid, "request url is invalid")
                .with_context("url", uri.to_string())
                .set_source(err)
        })?;

        let mut req_builder = self
            .request(parts.method, url)
            .headers(parts.headers)
            .version(parts.version);

        // Don't set body if body is empty.
        if !body.is_empty() {
            req_builder = req_builder.body(body);
        }

        let resp = req_builder.send().await.map_err(|err| {
            Error::new(ErrorKind::Unexpected, "send http request")
                .with_context("url", uri.to_string())
                .with_temporary(is_temporary_error(&err))
                .set_source(err)
        })?;

        let mut hr = Response::builder()
            .status(resp.status())
            .version(resp.version());
        if let Some(headers) = hr.headers_mut() {
            headers.extend(resp.headers().clone());
        }

        let bs = resp.bytes().await.map_err(|err| {
            Error::new(ErrorKind::Unexpected, "read data from http response")
                .with_context("url", uri.to_string())
                .with_temporary(is_temporary_error(&err))
                .set_source(err)
        })?;

        hr.body(bs).map_err(new_response_build_error)
    }
}

#[inline]
fn is_temporary_error(err: &reqwest::Error) -> bool {
    // error sending request
    err.is_request() ||
    // request or response body error
    err.is_body() ||
    // error decoding response body, for example, connection reset.
    err.is_decode() ||
    err.is_timeout()
}
