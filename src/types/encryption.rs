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

use std::collections::HashMap;
use std::fmt::Debug;

use bytes::Bytes;

use crate::*;

/// EncryptionPolicy produces the cipher used for client side encryption.
///
/// Key management lives behind this trait, the upload pipeline only sees
/// the bytes produced by an [`Encryptor`].
pub trait EncryptionPolicy: Debug + Send + Sync + 'static {
    /// Create an encryptor for a new blob.
    ///
    /// The policy records whatever it needs for decryption (wrapped key,
    /// iv, algorithm) into `metadata`, which is stored with the blob.
    fn create_encryptor(&self, metadata: &mut HashMap<String, String>)
        -> Result<Box<dyn Encryptor>>;

    /// Decrypt a whole blob downloaded with given metadata.
    fn decrypt(&self, metadata: &HashMap<String, String>, data: Bytes) -> Result<Bytes>;
}

/// Encryptor is a streaming cipher.
///
/// Output may be shorter or longer than input, block ciphers hold back a
/// partial block until [`Encryptor::finalize`] pads it.
pub trait Encryptor: Send {
    /// Encrypt more plaintext.
    fn update(&mut self, plaintext: &[u8]) -> Result<Bytes>;

    /// Flush the trailing ciphertext.
    fn finalize(&mut self) -> Result<Bytes>;
}
