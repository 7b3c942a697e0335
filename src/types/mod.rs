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

mod access_condition;
pub use access_condition::AccessCondition;

mod context;
pub use context::OperationContext;
pub use context::RequestResult;
pub use context::ResponseReceivedEvent;
pub use context::RetryingEvent;
pub use context::SendingRequestEvent;

mod encryption;
pub use encryption::EncryptionPolicy;
pub use encryption::Encryptor;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod location;
pub use location::LocationMode;
pub use location::RequestLocationMode;
pub use location::StorageLocation;
pub use location::StorageUri;

mod options;
pub use options::*;

mod properties;
pub use properties::BlobProperties;
pub use properties::BlobType;

mod retry;
pub use retry::*;
