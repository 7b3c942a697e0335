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

//! azstorage is a client for Azure Storage blobs built around a retrying
//! request engine and streaming uploads for large objects.
//!
//! - Block blobs are uploaded in a single request when they fit under the
//!   single put threshold, otherwise as equally sized blocks (uploaded with
//!   bounded concurrency) followed by one block list commit.
//! - Page blobs are written by 512-byte aligned page ranges.
//! - Every request goes through [`raw::execute`], which owns retries, location
//!   selection, timeouts and body replay.
//!
//! # Quick Start
//!
//! ```no_run
//! use azstorage::raw::oio::BytesSource;
//! use azstorage::services::BlobBuilder;
//! use azstorage::OperationContext;
//! use azstorage::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = BlobBuilder::default()
//!         .endpoint("https://myaccount.blob.core.windows.net")
//!         .account_name("myaccount")
//!         .account_key("bXlrZXk=")
//!         .build()?;
//!
//!     let mut blob = client.block_blob("container", "hello.txt");
//!     let mut source = BytesSource::from("Hello, World!");
//!     blob.upload(&mut source, Some(13), None, None, &OperationContext::new())
//!         .await?;
//!
//!     let ctx = OperationContext::new();
//!     let bs = blob.download(None, None, &ctx).await?;
//!     assert_eq!(bs.as_ref(), b"Hello, World!");
//!     Ok(())
//! }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]
// Deny unused qualifications.
#![deny(unused_qualifications)]

// Private module with public types, they will be accessed via `azstorage::Xxxx`
mod types;
pub use types::*;

// Public modules, they will be accessed like `azstorage::services::Xxxx`
pub mod raw;
pub mod services;
