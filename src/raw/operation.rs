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

use std::fmt::Display;
use std::fmt::Formatter;

/// Operation is the name of a single REST call or public API that an
/// error or log line is attributed to.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
#[non_exhaustive]
pub enum Operation {
    /// `Put Blob`, the single shot upload.
    #[default]
    PutBlob,
    /// `Put Block`.
    PutBlock,
    /// `Put Block List`, the block commit.
    PutBlockList,
    /// `Get Block List`.
    GetBlockList,
    /// `Put Page` with `x-ms-page-write: update`.
    PutPage,
    /// `Put Page` with `x-ms-page-write: clear`.
    ClearPage,
    /// `Put Blob` creating an empty page blob.
    CreatePageBlob,
    /// `Set Blob Properties` changing the page blob length.
    ResizeBlob,
    /// `Set Blob Properties`.
    SetBlobProperties,
    /// `Get Blob`.
    GetBlob,
    /// `Get Blob Properties`.
    GetBlobProperties,
    /// `Delete Blob`.
    DeleteBlob,
    /// The block blob upload orchestration.
    Upload,
    /// Opening a [`crate::services::BlobWriter`].
    OpenWrite,
    /// [`crate::services::BlobWriter::write`]
    WriterWrite,
    /// [`crate::services::BlobWriter::close`]
    WriterClose,
    /// [`crate::services::BlobWriter::abort`]
    WriterAbort,
}

impl Operation {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }

    /// Check if given operation is a single REST call.
    pub fn is_request(&self) -> bool {
        !matches!(
            self,
            Operation::Upload
                | Operation::OpenWrite
                | Operation::WriterWrite
                | Operation::WriterClose
                | Operation::WriterAbort
        )
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<Operation> for &'static str {
    fn from(v: Operation) -> &'static str {
        match v {
            Operation::PutBlob => "PutBlob",
            Operation::PutBlock => "PutBlock",
            Operation::PutBlockList => "PutBlockList",
            Operation::GetBlockList => "GetBlockList",
            Operation::PutPage => "PutPage",
            Operation::ClearPage => "ClearPage",
            Operation::CreatePageBlob => "CreatePageBlob",
            Operation::ResizeBlob => "ResizeBlob",
            Operation::SetBlobProperties => "SetBlobProperties",
            Operation::GetBlob => "GetBlob",
            Operation::GetBlobProperties => "GetBlobProperties",
            Operation::DeleteBlob => "DeleteBlob",
            Operation::Upload => "upload",
            Operation::OpenWrite => "open_write",
            Operation::WriterWrite => "Writer::write",
            Operation::WriterClose => "Writer::close",
            Operation::WriterAbort => "Writer::abort",
        }
    }
}

impl From<Operation> for String {
    fn from(v: Operation) -> Self {
        v.into_static().to_string()
    }
}
