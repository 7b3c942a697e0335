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

mod backend;
pub use backend::BlobBuilder;
pub use backend::BlobServiceClient;

mod config;
pub use config::BlobConfig;

mod core;
pub use self::core::BlobPath;
pub use self::core::BlockEntry;
pub use self::core::BlockListingFilter;
pub use self::core::BlockSearchMode;
pub use self::core::PageOperation;
pub use self::core::PageRange;

mod error;

mod block_blob;
pub use block_blob::BlockBlob;

mod page_blob;
pub use page_blob::PageBlob;

mod writer;
pub use writer::BlobWriter;
