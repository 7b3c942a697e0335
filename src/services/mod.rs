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

//! Services are the blob surfaces built on top of the request engine.

mod blob;
pub use blob::BlobBuilder;
pub use blob::BlobConfig;
pub use blob::BlobPath;
pub use blob::BlobServiceClient;
pub use blob::BlobWriter;
pub use blob::BlockBlob;
pub use blob::BlockEntry;
pub use blob::BlockListingFilter;
pub use blob::BlockSearchMode;
pub use blob::PageBlob;
pub use blob::PageOperation;
pub use blob::PageRange;
