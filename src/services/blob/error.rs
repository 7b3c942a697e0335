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

use bytes::Buf;
use bytes::Bytes;
use http::Response;
use quick_xml::de;
use serde::Deserialize;

use crate::raw::constants::X_MS_ERROR_CODE;
use crate::raw::*;
use crate::*;

/// BlobError is the error body returned by the blob service.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct BlobError {
    code: String,
    message: String,
    query_parameter_name: String,
    query_parameter_value: String,
    reason: String,
}

impl Debug for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut de = f.debug_struct("BlobError");
        de.field("code", &self.code);
        // replace `\n` to ` ` for better reading.
        de.field("message", &self.message.replace('\n', " "));

        if !self.query_parameter_name.is_empty() {
            de.field("query_parameter_name", &self.query_parameter_name);
        }
        if !self.query_parameter_value.is_empty() {
            de.field("query_parameter_value", &self.query_parameter_value);
        }
        if !self.reason.is_empty() {
            de.field("reason", &self.reason);
        }

        de.finish()
    }
}

/// Parse error response into Error.
pub(super) fn parse_error(resp: Response<Bytes>) -> Error {
    let (parts, bs) = resp.into_parts();
    let (kind, retryable) = classify_status(parts.status);

    let mut code = parse_header_to_str(&parts.headers, X_MS_ERROR_CODE)
        .ok()
        .flatten()
        .map(|v| v.to_string());

    let message = match de::from_reader::<_, BlobError>(bs.clone().reader()) {
        Ok(blob_err) => {
            if !blob_err.code.is_empty() {
                code = Some(blob_err.code.clone());
            }
            format!("{blob_err:?}")
        }
        Err(_) => String::from_utf8_lossy(&bs).into_owned(),
    };

    // If there is no body here, fill with error code.
    let message = match (message.is_empty(), &code) {
        (true, Some(code)) => format!(
            "{:?}",
            BlobError {
                code: code.clone(),
                ..Default::default()
            }
        ),
        _ => message,
    };

    let mut err = Error::new(kind, message).with_context("status", parts.status.as_u16());
    if let Some(code) = code {
        err = err.with_context("error_code", code);
    }
    if let Some(request_id) = parse_request_id(&parts.headers) {
        err = err.with_context("service_request_id", request_id);
    }

    err.with_temporary(retryable)
}
