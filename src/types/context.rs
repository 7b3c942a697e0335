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
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::Request;
use http::StatusCode;
use tokio::time::Instant;
use uuid::Uuid;

use crate::raw::Operation;
use crate::*;

/// RequestResult records the outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    /// Operation of the attempt.
    pub operation: Operation,
    /// Attempt number, starting from 1.
    pub attempt: usize,
    /// Location the attempt was sent to.
    pub location: StorageLocation,
    /// Response status, `None` if no response was received.
    pub status: Option<StatusCode>,
    /// Time spent on this attempt.
    pub elapsed: Duration,
    /// Whether the failure was classified as retryable.
    pub retryable: bool,
    /// `x-ms-request-id` returned by the service.
    pub service_request_id: Option<String>,
    /// Rendered error if the attempt failed.
    pub error: Option<String>,
}

impl RequestResult {
    /// Check if this attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Emitted right before a request is sent.
pub struct SendingRequestEvent<'a> {
    /// Operation of the attempt.
    pub operation: Operation,
    /// Attempt number, starting from 1.
    pub attempt: usize,
    /// Location the request is sent to.
    pub location: StorageLocation,
    /// The signed request.
    pub request: &'a Request<Bytes>,
}

/// Emitted once the response head has been received.
pub struct ResponseReceivedEvent<'a> {
    /// Operation of the attempt.
    pub operation: Operation,
    /// Attempt number, starting from 1.
    pub attempt: usize,
    /// Location the response came from.
    pub location: StorageLocation,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: &'a HeaderMap,
}

/// Emitted before the engine sleeps for the next attempt.
pub struct RetryingEvent<'a> {
    /// Operation being retried.
    pub operation: Operation,
    /// Attempt number that failed.
    pub attempt: usize,
    /// Location of the next attempt.
    pub target_location: StorageLocation,
    /// Backoff before the next attempt.
    pub interval: Duration,
    /// The failure being retried.
    pub error: &'a Error,
}

type SendingRequestHook = Arc<dyn for<'a> Fn(&SendingRequestEvent<'a>) + Send + Sync>;
type ResponseReceivedHook = Arc<dyn for<'a> Fn(&ResponseReceivedEvent<'a>) + Send + Sync>;
type RetryingHook = Arc<dyn for<'a> Fn(&RetryingEvent<'a>) + Send + Sync>;

/// OperationContext tracks one logical call across all of its attempts.
///
/// Cloning is cheap, clones share the recorded results. A single context is
/// shared by every block uploaded during one `upload`.
#[derive(Clone)]
pub struct OperationContext {
    client_request_id: String,
    start: Instant,
    results: Arc<Mutex<Vec<RequestResult>>>,

    on_sending_request: Option<SendingRequestHook>,
    on_response_received: Option<ResponseReceivedHook>,
    on_retrying: Option<RetryingHook>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for OperationContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("client_request_id", &self.client_request_id)
            .field("start", &self.start)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl OperationContext {
    /// Create a new context with a random client request id.
    pub fn new() -> Self {
        Self {
            client_request_id: Uuid::new_v4().to_string(),
            start: Instant::now(),
            results: Arc::default(),

            on_sending_request: None,
            on_response_received: None,
            on_retrying: None,
        }
    }

    /// Use given client request id instead of a random one.
    pub fn with_client_request_id(mut self, id: impl Into<String>) -> Self {
        self.client_request_id = id.into();
        self
    }

    /// Register a hook called before every request is sent.
    pub fn on_sending_request(
        mut self,
        f: impl for<'a> Fn(&SendingRequestEvent<'a>) + Send + Sync + 'static,
    ) -> Self {
        self.on_sending_request = Some(Arc::new(f));
        self
    }

    /// Register a hook called after every response is received.
    pub fn on_response_received(
        mut self,
        f: impl for<'a> Fn(&ResponseReceivedEvent<'a>) + Send + Sync + 'static,
    ) -> Self {
        self.on_response_received = Some(Arc::new(f));
        self
    }

    /// Register a hook called before every backoff.
    pub fn on_retrying(
        mut self,
        f: impl for<'a> Fn(&RetryingEvent<'a>) + Send + Sync + 'static,
    ) -> Self {
        self.on_retrying = Some(Arc::new(f));
        self
    }

    /// The `x-ms-client-request-id` sent with every request.
    pub fn client_request_id(&self) -> &str {
        &self.client_request_id
    }

    /// Time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Snapshot of all recorded attempts.
    pub fn request_results(&self) -> Vec<RequestResult> {
        self.lock().clone()
    }

    /// Number of recorded attempts.
    pub fn attempts(&self) -> usize {
        self.lock().len()
    }

    /// The last recorded attempt.
    pub fn last_result(&self) -> Option<RequestResult> {
        self.lock().last().cloned()
    }

    pub(crate) fn record(&self, result: RequestResult) {
        self.lock().push(result);
    }

    pub(crate) fn notify_sending_request(&self, event: &SendingRequestEvent<'_>) {
        if let Some(f) = &self.on_sending_request {
            f(event)
        }
    }

    pub(crate) fn notify_response_received(&self, event: &ResponseReceivedEvent<'_>) {
        if let Some(f) = &self.on_response_received {
            f(event)
        }
    }

    pub(crate) fn notify_retrying(&self, event: &RetryingEvent<'_>) {
        if let Some(f) = &self.on_retrying {
            f(event)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RequestResult>> {
        // Results are append only, a poisoned lock still holds valid data.
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
