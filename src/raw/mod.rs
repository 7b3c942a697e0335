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

//! Raw modules provide the building blocks of blob clients.
//!
//! Most users don't need them, they are exposed for implementing new
//! operations on top of the request engine.

mod operation;
pub use operation::Operation;

mod http_util;
pub use http_util::*;

mod chrono_util;
pub use chrono_util::*;

mod futures_util;
pub use futures_util::BoxedFuture;
pub use futures_util::BoxedStaticFuture;
pub use futures_util::ConcurrentFutures;

mod sign;
pub use sign::AnonymousSigner;
pub use sign::SharedKeySigner;
pub use sign::Sign;

mod request;
pub use request::*;

mod execute;
pub use execute::classify_status;
pub use execute::execute;
pub use execute::StorageCore;

pub mod oio;
