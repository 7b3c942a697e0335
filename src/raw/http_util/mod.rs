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

//! http_util contains the http primitives used by the request engine.

mod client;
pub use client::HttpClient;
pub use client::HttpFetch;
pub use client::HttpFetchDyn;
pub use client::HttpFetcher;

mod error;
pub use error::new_request_build_error;
pub use error::new_request_credential_error;
pub use error::new_request_sign_error;
pub use error::new_response_build_error;
pub use error::new_std_io_error;
pub use error::new_xml_deserialize_error;
pub use error::new_xml_serialize_error;

mod header;
pub use header::build_header_value;
pub use header::constants;
pub use header::format_content_md5;
pub use header::format_range_header;
pub use header::parse_blob_sequence_number;
pub use header::parse_content_length;
pub use header::parse_content_md5;
pub use header::parse_etag;
pub use header::parse_header_to_str;
pub use header::parse_header_to_u64;
pub use header::parse_last_modified;
pub use header::parse_prefixed_headers;
pub use header::parse_request_id;
pub use header::X_MS_VERSION_VALUE;

mod uri;
pub use uri::percent_decode_path;
pub use uri::percent_encode_path;
pub use uri::percent_encode_query;
pub use uri::query_pairs;
pub use uri::QueryPairsWriter;
