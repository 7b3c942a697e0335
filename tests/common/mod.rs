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

//! An in-memory blob service speaking just enough of the REST protocol to
//! drive the public API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use azstorage::raw::format_content_md5;
use azstorage::raw::percent_decode_path;
use azstorage::raw::query_pairs;
use azstorage::raw::HttpClient;
use azstorage::raw::HttpFetch;
use azstorage::raw::Operation;
use azstorage::services::BlobBuilder;
use azstorage::services::BlobServiceClient;
use azstorage::BlobType;
use azstorage::Result;
use bytes::Bytes;
use http::HeaderMap;
use http::Method;
use http::Request;
use http::Response;
use http::StatusCode;
use rand::Rng;
use serde::Deserialize;

pub const ENDPOINT: &str = "http://fake.blob.local";

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A request seen by the fake service.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub operation: Operation,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub status: StatusCode,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone)]
pub struct FakeBlob {
    pub blob_type: BlobType,
    pub content: Vec<u8>,
    pub content_md5: Option<String>,
    pub committed: Vec<(String, Bytes)>,
    pub metadata: HashMap<String, String>,
    pub sequence_number: u64,
    pub etag: String,
}

struct Fault {
    operation: Operation,
    status: StatusCode,
    remaining: usize,
}

#[derive(Default)]
struct State {
    blobs: HashMap<String, FakeBlob>,
    uncommitted: HashMap<String, Vec<(String, Bytes)>>,
    requests: Vec<Recorded>,
    faults: VecDeque<Fault>,
    next_etag: u64,
    in_flight: usize,
    max_in_flight: usize,
}

/// FakeBlobService keeps blobs in memory and can be told to fail.
#[derive(Clone, Default)]
pub struct FakeBlobService {
    state: Arc<Mutex<State>>,
    block_delay: Arc<Mutex<Option<Duration>>>,
}

impl FakeBlobService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pointing at this service.
    pub fn builder(&self) -> BlobBuilder {
        BlobBuilder::default()
            .endpoint(ENDPOINT)
            .http_client(HttpClient::with(self.clone()))
    }

    pub fn client(&self) -> BlobServiceClient {
        self.builder().build().expect("fake client must build")
    }

    /// Answer the next `times` requests of `operation` with `status`.
    pub fn fail(&self, operation: Operation, status: StatusCode, times: usize) {
        self.state.lock().unwrap().faults.push_back(Fault {
            operation,
            status,
            remaining: times,
        });
    }

    /// Delay every block upload by a random duration up to `max`, so blocks
    /// complete out of order.
    pub fn delay_blocks(&self, max: Duration) {
        *self.block_delay.lock().unwrap() = Some(max);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn blob(&self, container: &str, name: &str) -> Option<FakeBlob> {
        self.state
            .lock()
            .unwrap()
            .blobs
            .get(&format!("{container}/{name}"))
            .cloned()
    }

    pub fn uncommitted(&self, container: &str, name: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .uncommitted
            .get(&format!("{container}/{name}"))
            .map(|v| v.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Replace the stored content without changing anything else.
    pub fn corrupt(&self, container: &str, name: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if let Some(blob) = state.blobs.get_mut(&format!("{container}/{name}")) {
            blob.content = content.to_vec();
        }
    }

    fn handle(&self, req: &Request<Bytes>) -> (Operation, Response<Bytes>) {
        let key = percent_decode_path(req.uri().path().trim_start_matches('/'));
        let query: HashMap<String, String> = query_pairs(req.uri().query().unwrap_or_default())
            .into_iter()
            .collect();
        let operation = classify(req, &query);

        let mut state = self.state.lock().unwrap();
        if let Some(fault) = state
            .faults
            .iter_mut()
            .find(|f| f.operation == operation && f.remaining > 0)
        {
            fault.remaining -= 1;
            let status = fault.status;
            return (operation, error_response(status, "ServerBusy"));
        }

        if let Some(expected) = header(req.headers(), "content-md5") {
            if format_content_md5(req.body()) != expected {
                return (
                    operation,
                    error_response(StatusCode::BAD_REQUEST, "Md5Mismatch"),
                );
            }
        }

        if let Err(resp) = check_condition(state.blobs.get(&key), req.headers()) {
            return (operation, resp);
        }

        state.next_etag += 1;
        let etag = format!("\"0x{:X}\"", state.next_etag);
        let resp = match operation {
            Operation::PutBlob => state.put_blob(&key, req, etag),
            Operation::PutBlock => state.put_block(&key, &query, req),
            Operation::PutBlockList => state.put_block_list(&key, req, etag),
            Operation::GetBlockList => state.get_block_list(&key, &query),
            Operation::CreatePageBlob => state.create_page_blob(&key, req, etag),
            Operation::PutPage | Operation::ClearPage => state.put_page(&key, req, etag),
            Operation::SetBlobProperties | Operation::ResizeBlob => {
                state.set_properties(&key, req, etag)
            }
            Operation::GetBlob => state.get_blob(&key, req, true),
            Operation::GetBlobProperties => state.get_blob(&key, req, false),
            Operation::DeleteBlob => state.delete_blob(&key),
            _ => error_response(StatusCode::BAD_REQUEST, "UnsupportedOperation"),
        };
        (operation, resp)
    }

    fn record(&self, operation: Operation, req: Request<Bytes>, status: StatusCode) {
        let (parts, body) = req.into_parts();
        let query = query_pairs(parts.uri.query().unwrap_or_default())
            .into_iter()
            .collect();
        self.state.lock().unwrap().requests.push(Recorded {
            operation,
            path: percent_decode_path(parts.uri.path().trim_start_matches('/')),
            query,
            headers: parts.headers,
            body,
            status,
        });
    }
}

/// Counts a request as in flight until dropped, so a cancelled request
/// leaves the count too.
struct InFlight(Arc<Mutex<State>>);

impl InFlight {
    fn enter(state: Arc<Mutex<State>>) -> Self {
        {
            let mut s = state.lock().unwrap();
            s.in_flight += 1;
            s.max_in_flight = s.max_in_flight.max(s.in_flight);
        }
        Self(state)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut s) = self.0.lock() {
            s.in_flight -= 1;
        }
    }
}

impl HttpFetch for FakeBlobService {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let is_block = req.uri().query().unwrap_or_default().contains("comp=block&");
        let guard = InFlight::enter(self.state.clone());

        let delay = *self.block_delay.lock().unwrap();
        if let (true, Some(max)) = (is_block, delay) {
            let millis = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let (operation, resp) = self.handle(&req);
        drop(guard);
        self.record(operation, req, resp.status());
        Ok(resp)
    }
}

fn classify(req: &Request<Bytes>, query: &HashMap<String, String>) -> Operation {
    let comp = query.get("comp").map(String::as_str);
    match (req.method().clone(), comp) {
        (Method::PUT, Some("block")) => Operation::PutBlock,
        (Method::PUT, Some("blocklist")) => Operation::PutBlockList,
        (Method::PUT, Some("page")) => match header(req.headers(), "x-ms-page-write") {
            Some("clear") => Operation::ClearPage,
            _ => Operation::PutPage,
        },
        (Method::PUT, Some("properties")) => {
            match header(req.headers(), "x-ms-blob-content-length") {
                Some(_) => Operation::ResizeBlob,
                None => Operation::SetBlobProperties,
            }
        }
        (Method::PUT, _) => match header(req.headers(), "x-ms-blob-type") {
            Some("PageBlob") => Operation::CreatePageBlob,
            _ => Operation::PutBlob,
        },
        (Method::GET, Some("blocklist")) => Operation::GetBlockList,
        (Method::GET, _) => Operation::GetBlob,
        (Method::HEAD, _) => Operation::GetBlobProperties,
        (Method::DELETE, _) => Operation::DeleteBlob,
        (method, _) => unreachable!("client never sends {method}"),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            let key = k.as_str().strip_prefix("x-ms-meta-")?;
            Some((key.to_string(), v.to_str().ok()?.to_string()))
        })
        .collect()
}

fn check_condition(
    blob: Option<&FakeBlob>,
    headers: &HeaderMap,
) -> std::result::Result<(), Response<Bytes>> {
    let failed = || error_response(StatusCode::PRECONDITION_FAILED, "ConditionNotMet");
    if let Some(etag) = header(headers, "if-match") {
        if blob.map(|b| b.etag.as_str()) != Some(etag) {
            return Err(failed());
        }
    }
    if header(headers, "if-none-match") == Some("*") && blob.is_some() {
        return Err(failed());
    }
    Ok(())
}

fn error_response(status: StatusCode, code: &str) -> Response<Bytes> {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>{code}</Code><Message>fake service says {code}</Message></Error>"
    );
    Response::builder()
        .status(status)
        .header("x-ms-error-code", code)
        .header("x-ms-request-id", "fake-request")
        .header("content-type", "application/xml")
        .body(Bytes::from(body))
        .unwrap()
}

fn parse_range(headers: &HeaderMap, name: &str) -> Option<(u64, u64)> {
    let v = header(headers, name)?.strip_prefix("bytes=")?;
    let (start, end) = v.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

const LAST_MODIFIED: &str = "Fri, 16 Oct 2026 08:00:00 GMT";

fn write_response(status: StatusCode, blob: &FakeBlob) -> Response<Bytes> {
    Response::builder()
        .status(status)
        .header("etag", blob.etag.as_str())
        .header("last-modified", LAST_MODIFIED)
        .header("x-ms-request-id", "fake-request")
        .header("x-ms-blob-sequence-number", blob.sequence_number)
        .body(Bytes::new())
        .unwrap()
}

#[derive(Deserialize)]
struct BlockListBody {
    #[serde(rename = "$value", default)]
    entries: Vec<BlockListBodyEntry>,
}

#[derive(Deserialize)]
enum BlockListBodyEntry {
    Committed(String),
    Uncommitted(String),
    Latest(String),
}

impl State {
    fn put_blob(&mut self, key: &str, req: &Request<Bytes>, etag: String) -> Response<Bytes> {
        let content = req.body().to_vec();
        let content_md5 = header(req.headers(), "x-ms-blob-content-md5")
            .map(|v| v.to_string())
            .or_else(|| Some(format_content_md5(&content)));
        let blob = FakeBlob {
            blob_type: BlobType::BlockBlob,
            content,
            content_md5,
            committed: vec![],
            metadata: metadata(req.headers()),
            sequence_number: 0,
            etag,
        };
        let resp = write_response(StatusCode::CREATED, &blob);
        self.uncommitted.remove(key);
        self.blobs.insert(key.to_string(), blob);
        resp
    }

    fn put_block(
        &mut self,
        key: &str,
        query: &HashMap<String, String>,
        req: &Request<Bytes>,
    ) -> Response<Bytes> {
        let Some(id) = query.get("blockid") else {
            return error_response(StatusCode::BAD_REQUEST, "InvalidQueryParameterValue");
        };
        let blocks = self.uncommitted.entry(key.to_string()).or_default();
        blocks.retain(|(v, _)| v != id);
        blocks.push((id.clone(), req.body().clone()));

        Response::builder()
            .status(StatusCode::CREATED)
            .header("x-ms-request-id", "fake-request")
            .body(Bytes::new())
            .unwrap()
    }

    fn put_block_list(&mut self, key: &str, req: &Request<Bytes>, etag: String) -> Response<Bytes> {
        let Ok(list) = quick_xml::de::from_str::<BlockListBody>(
            std::str::from_utf8(req.body()).unwrap_or_default(),
        ) else {
            return error_response(StatusCode::BAD_REQUEST, "InvalidXmlDocument");
        };

        let uncommitted = self.uncommitted.get(key).cloned().unwrap_or_default();
        let committed = self
            .blobs
            .get(key)
            .map(|b| b.committed.clone())
            .unwrap_or_default();
        let find = |blocks: &[(String, Bytes)], id: &str| {
            blocks.iter().find(|(v, _)| v == id).map(|(_, bs)| bs.clone())
        };

        let mut blocks = Vec::with_capacity(list.entries.len());
        for entry in list.entries {
            let found = match &entry {
                BlockListBodyEntry::Committed(id) => find(&committed, id).map(|bs| (id, bs)),
                BlockListBodyEntry::Uncommitted(id) => find(&uncommitted, id).map(|bs| (id, bs)),
                BlockListBodyEntry::Latest(id) => find(&uncommitted, id)
                    .or_else(|| find(&committed, id))
                    .map(|bs| (id, bs)),
            };
            let Some((id, bs)) = found else {
                return error_response(StatusCode::BAD_REQUEST, "InvalidBlockList");
            };
            blocks.push((id.clone(), bs));
        }

        let content: Vec<u8> = blocks.iter().flat_map(|(_, bs)| bs.to_vec()).collect();
        let blob = FakeBlob {
            blob_type: BlobType::BlockBlob,
            content,
            content_md5: header(req.headers(), "x-ms-blob-content-md5").map(|v| v.to_string()),
            committed: blocks,
            metadata: metadata(req.headers()),
            sequence_number: 0,
            etag,
        };
        let resp = write_response(StatusCode::CREATED, &blob);
        self.uncommitted.remove(key);
        self.blobs.insert(key.to_string(), blob);
        resp
    }

    fn get_block_list(&self, key: &str, query: &HashMap<String, String>) -> Response<Bytes> {
        let render = |blocks: &[(String, Bytes)]| {
            blocks
                .iter()
                .map(|(id, bs)| format!("<Block><Name>{id}</Name><Size>{}</Size></Block>", bs.len()))
                .collect::<String>()
        };

        let list_type = query.get("blocklisttype").map(String::as_str);
        let committed = match (list_type, self.blobs.get(key)) {
            (Some("uncommitted"), _) => String::new(),
            (_, Some(blob)) => render(&blob.committed),
            (_, None) => String::new(),
        };
        let uncommitted = match list_type {
            Some("uncommitted") | Some("all") => {
                render(self.uncommitted.get(key).map(Vec::as_slice).unwrap_or_default())
            }
            _ => String::new(),
        };
        if !self.blobs.contains_key(key) && !self.uncommitted.contains_key(key) {
            return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
        }

        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList><CommittedBlocks>{committed}</CommittedBlocks><UncommittedBlocks>{uncommitted}</UncommittedBlocks></BlockList>"
        );
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/xml")
            .header("x-ms-request-id", "fake-request")
            .body(Bytes::from(body))
            .unwrap()
    }

    fn create_page_blob(&mut self, key: &str, req: &Request<Bytes>, etag: String) -> Response<Bytes> {
        let Some(length) = header(req.headers(), "x-ms-blob-content-length")
            .and_then(|v| v.parse::<usize>().ok())
        else {
            return error_response(StatusCode::BAD_REQUEST, "MissingRequiredHeader");
        };
        let blob = FakeBlob {
            blob_type: BlobType::PageBlob,
            content: vec![0; length],
            content_md5: None,
            committed: vec![],
            metadata: metadata(req.headers()),
            sequence_number: header(req.headers(), "x-ms-blob-sequence-number")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            etag,
        };
        let resp = write_response(StatusCode::CREATED, &blob);
        self.blobs.insert(key.to_string(), blob);
        resp
    }

    fn put_page(&mut self, key: &str, req: &Request<Bytes>, etag: String) -> Response<Bytes> {
        let Some(blob) = self.blobs.get_mut(key) else {
            return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
        };
        let Some((start, end)) = parse_range(req.headers(), "x-ms-range") else {
            return error_response(StatusCode::BAD_REQUEST, "InvalidHeaderValue");
        };
        let (start, end) = (start as usize, end as usize);
        if end >= blob.content.len() {
            return error_response(StatusCode::RANGE_NOT_SATISFIABLE, "InvalidPageRange");
        }

        let range = &mut blob.content[start..=end];
        match header(req.headers(), "x-ms-page-write") {
            Some("clear") => range.fill(0),
            _ => {
                if req.body().len() != range.len() {
                    return error_response(StatusCode::BAD_REQUEST, "InvalidHeaderValue");
                }
                range.copy_from_slice(req.body());
            }
        }
        blob.etag = etag;
        write_response(StatusCode::CREATED, blob)
    }

    fn set_properties(&mut self, key: &str, req: &Request<Bytes>, etag: String) -> Response<Bytes> {
        let Some(blob) = self.blobs.get_mut(key) else {
            return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
        };
        if let Some(length) =
            header(req.headers(), "x-ms-blob-content-length").and_then(|v| v.parse().ok())
        {
            blob.content.resize(length, 0);
        }
        if let Some(md5) = header(req.headers(), "x-ms-blob-content-md5") {
            blob.content_md5 = Some(md5.to_string());
        }
        blob.etag = etag;
        write_response(StatusCode::OK, blob)
    }

    fn get_blob(&self, key: &str, req: &Request<Bytes>, with_body: bool) -> Response<Bytes> {
        let Some(blob) = self.blobs.get(key) else {
            return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
        };

        let (status, body) = match parse_range(req.headers(), "range") {
            Some((start, end)) => {
                let end = (end as usize).min(blob.content.len().saturating_sub(1));
                (
                    StatusCode::PARTIAL_CONTENT,
                    blob.content[start as usize..=end].to_vec(),
                )
            }
            None => (StatusCode::OK, blob.content.clone()),
        };

        let mut resp = Response::builder()
            .status(status)
            .header("content-length", body.len())
            .header("etag", blob.etag.as_str())
            .header("last-modified", LAST_MODIFIED)
            .header("x-ms-request-id", "fake-request")
            .header("x-ms-blob-type", blob.blob_type.as_str());
        if status == StatusCode::OK {
            if let Some(md5) = &blob.content_md5 {
                resp = resp.header("content-md5", md5.as_str());
            }
        }
        if blob.blob_type == BlobType::PageBlob {
            resp = resp.header("x-ms-blob-sequence-number", blob.sequence_number);
        } else {
            resp = resp.header("x-ms-blob-committed-block-count", blob.committed.len());
        }
        for (k, v) in &blob.metadata {
            resp = resp.header(format!("x-ms-meta-{k}"), v.as_str());
        }

        let body = if with_body { Bytes::from(body) } else { Bytes::new() };
        resp.body(body).unwrap()
    }

    fn delete_blob(&mut self, key: &str) -> Response<Bytes> {
        if self.blobs.remove(key).is_none() {
            return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
        }
        self.uncommitted.remove(key);
        Response::builder()
            .status(StatusCode::ACCEPTED)
            .header("x-ms-request-id", "fake-request")
            .body(Bytes::new())
            .unwrap()
    }
}

/// Deterministic content of `size` bytes.
pub fn gen_bytes(size: usize) -> Bytes {
    (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}
