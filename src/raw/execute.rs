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

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::HeaderName;
use http::HeaderValue;
use http::Method;
use http::Response;
use http::StatusCode;
use log::debug;
use log::warn;
use tokio::time::Instant;

use crate::raw::constants::*;
use crate::raw::*;
use crate::*;

/// StorageCore is what [`execute`] needs from a service client.
pub trait StorageCore: Send + Sync {
    /// Endpoints of the account.
    fn storage_uri(&self) -> &StorageUri;

    /// Client used to send requests.
    fn http_client(&self) -> &HttpClient;

    /// Default signer of requests.
    fn signer(&self) -> &Arc<dyn Sign>;

    /// Turn a failed response into an error.
    ///
    /// The error must be temporary if the status is retryable, see
    /// [`classify_status`].
    fn parse_error(&self, resp: Response<Bytes>) -> Error;
}

/// Classify a failed status into an error kind and whether it's retryable.
///
/// Request timeout, throttling and 5xx other than `501` and `505` are
/// retried, every other status is permanent.
pub fn classify_status(status: StatusCode) -> (ErrorKind, bool) {
    match status {
        StatusCode::NOT_FOUND => (ErrorKind::NotFound, false),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => (ErrorKind::PermissionDenied, false),
        StatusCode::CONFLICT => (ErrorKind::AlreadyExists, false),
        StatusCode::PRECONDITION_FAILED | StatusCode::NOT_MODIFIED => {
            (ErrorKind::ConditionNotMatch, false)
        }
        StatusCode::RANGE_NOT_SATISFIABLE => (ErrorKind::RangeNotSatisfied, false),
        StatusCode::TOO_MANY_REQUESTS => (ErrorKind::RateLimited, true),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => (ErrorKind::Unexpected, true),
        _ => (ErrorKind::Unexpected, false),
    }
}

/// Result of one attempt, with what's needed to record it.
struct Attempt<T> {
    result: Result<T>,
    status: Option<StatusCode>,
    request_id: Option<String>,
}

/// Execute a request until it succeeds, fails permanently or the retry
/// policy gives up.
///
/// Every attempt is recorded into `ctx`. Temporary errors that survive all
/// retries are returned as persistent, with `attempts` and `elapsed` in
/// their context.
pub async fn execute<C, T>(
    core: &C,
    mut req: StorageRequest<'_, T>,
    options: &RequestOptions,
    ctx: &OperationContext,
) -> Result<T>
where
    C: StorageCore + ?Sized,
{
    let operation = req.operation;
    let (mut mode, mut location) = core
        .storage_uri()
        .resolve(options.location_mode(), req.location_mode)
        .map_err(|err| err.with_operation(operation))?;

    let policy = options.retry_policy();
    let start = Instant::now();
    let mut secondary_not_found = false;

    req.body.checkpoint();

    let mut attempt = 1;
    loop {
        debug!(
            target: "azstorage::execute",
            "operation={operation} attempt={attempt} location={location} -> started"
        );

        let attempt_start = Instant::now();
        let Attempt {
            result,
            status,
            request_id,
        } = run_attempt(core, &mut req, location, attempt, options, ctx).await;

        let elapsed = attempt_start.elapsed();
        let err = match result {
            Ok(v) => {
                debug!(
                    target: "azstorage::execute",
                    "operation={operation} attempt={attempt} location={location} -> finished: status={status:?} elapsed={elapsed:?}"
                );
                ctx.record(RequestResult {
                    operation,
                    attempt,
                    location,
                    status,
                    elapsed,
                    retryable: false,
                    service_request_id: request_id,
                    error: None,
                });
                return Ok(v);
            }
            Err(err) => err,
        };

        // The secondary may lag behind the primary, a missing object there is
        // worth a retry against the primary.
        let err = if status == Some(StatusCode::NOT_FOUND)
            && location == StorageLocation::Secondary
            && mode.is_alternating()
        {
            secondary_not_found = true;
            err.set_temporary()
        } else {
            err
        };

        debug!(
            target: "azstorage::execute",
            "operation={operation} attempt={attempt} location={location} -> failed: status={status:?} elapsed={elapsed:?} error={err}"
        );
        ctx.record(RequestResult {
            operation,
            attempt,
            location,
            status,
            elapsed,
            retryable: err.is_temporary(),
            service_request_id: request_id,
            error: Some(err.to_string()),
        });

        let err = err
            .with_operation(operation)
            .with_context("attempts", attempt)
            .with_context("elapsed", format!("{:?}", start.elapsed()));
        if !err.is_temporary() {
            return Err(err);
        }

        let retry_ctx = RetryContext {
            retry_count: attempt - 1,
            last_status: status,
            last_location: location,
            location_mode: mode,
            secondary_not_found,
        };
        let Some(info) = policy.evaluate(&retry_ctx) else {
            return Err(err.set_persistent());
        };

        if let Some(max) = options.maximum_execution_time() {
            if start.elapsed() + info.interval > max {
                return Err(Error::new(
                    ErrorKind::Timeout,
                    "operation exceeded the maximum execution time",
                )
                .with_operation(operation)
                .with_context("attempts", attempt)
                .with_context("maximum_execution_time", format!("{max:?}"))
                .set_source(err));
            }
        }

        warn!(
            target: "azstorage::execute",
            "operation={} attempt={} location={} -> retry after {}s: error={}",
            operation,
            attempt,
            info.target_location,
            info.interval.as_secs_f64(),
            err
        );
        ctx.notify_retrying(&RetryingEvent {
            operation,
            attempt,
            target_location: info.target_location,
            interval: info.interval,
            error: &err,
        });

        tokio::time::sleep(info.interval).await;

        location = info.target_location;
        mode = info.updated_mode;

        if let Err(recover_err) = req.recover() {
            return Err(recover_err
                .set_permanent()
                .with_operation(operation)
                .with_context("attempts", attempt)
                .with_context("retrying", err));
        }

        attempt += 1;
    }
}

async fn run_attempt<C, T>(
    core: &C,
    req: &mut StorageRequest<'_, T>,
    location: StorageLocation,
    attempt: usize,
    options: &RequestOptions,
    ctx: &OperationContext,
) -> Attempt<T>
where
    C: StorageCore + ?Sized,
{
    let resp = match send_attempt(core, req, location, attempt, options, ctx).await {
        Ok(resp) => resp,
        Err(err) => {
            return Attempt {
                result: Err(err),
                status: None,
                request_id: None,
            }
        }
    };

    let status = resp.status();
    let request_id = parse_request_id(resp.headers()).map(|v| v.to_string());
    ctx.notify_response_received(&ResponseReceivedEvent {
        operation: req.operation,
        attempt,
        location,
        status,
        headers: resp.headers(),
    });

    let result = match (req.pre_process)(status, resp.headers()) {
        Disposition::Success => (req.post_process)(resp),
        Disposition::Failure => Err(core.parse_error(resp)),
        Disposition::RetryableFailure => Err(core.parse_error(resp).set_temporary()),
    };

    Attempt {
        result,
        status: Some(status),
        request_id,
    }
}

async fn send_attempt<C, T>(
    core: &C,
    req: &mut StorageRequest<'_, T>,
    location: StorageLocation,
    attempt: usize,
    options: &RequestOptions,
    ctx: &OperationContext,
) -> Result<Response<Bytes>>
where
    C: StorageCore + ?Sized,
{
    let endpoint = core.storage_uri().endpoint(location)?;
    let body = req.body.read().await?;
    let content_length = body.len() as u64;
    let content_md5 = (req.content_md5 && !body.is_empty()).then(|| format_content_md5(&body));

    let mut http_req = (req.build_request)(endpoint, body)?;
    if let Some(f) = &req.set_headers {
        f(&mut http_req)?;
    }

    let headers = http_req.headers_mut();
    headers.insert(
        HeaderName::from_static(X_MS_VERSION),
        HeaderValue::from_static(X_MS_VERSION_VALUE),
    );
    headers.insert(
        HeaderName::from_static(X_MS_CLIENT_REQUEST_ID),
        build_header_value(ctx.client_request_id())?,
    );
    if let Some(md5) = content_md5 {
        headers.insert(HeaderName::from_static(CONTENT_MD5), build_header_value(&md5)?);
    }
    if content_length > 0 || (http_req.method() != Method::GET && http_req.method() != Method::HEAD) {
        http_req
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    }

    let signer = req.signer.as_ref().unwrap_or(core.signer());
    signer.sign(&mut http_req, Some(content_length)).await?;

    ctx.notify_sending_request(&SendingRequestEvent {
        operation: req.operation,
        attempt,
        location,
        request: &http_req,
    });

    let timeout = options.timeout();
    match tokio::time::timeout(timeout, core.http_client().send(http_req)).await {
        Ok(resp) => resp,
        Err(_) => Err(Error::new(ErrorKind::Timeout, "attempt timed out")
            .with_context("timeout", format!("{timeout:?}"))
            .set_temporary()),
    }
}
