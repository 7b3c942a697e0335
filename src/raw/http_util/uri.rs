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

use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

/// PATH_ENCODE_SET follows `encodeURIComponent` but keeps `/`, blob names
/// may contain virtual directories.
static PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// QUERY_ENCODE_SET encodes everything but unreserved characters, block
/// ids are base64 and carry `+`, `/` and `=`.
static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// percent_encode_path will do percent encoding for http encode path.
pub fn percent_encode_path(path: &str) -> String {
    utf8_percent_encode(path, &PATH_ENCODE_SET).to_string()
}

/// percent_encode_query encodes one query value.
pub fn percent_encode_query(value: &str) -> String {
    utf8_percent_encode(value, &QUERY_ENCODE_SET).to_string()
}

/// percent_decode_path will do percent decoding for http decode path.
///
/// If the input is not percent encoded or not valid utf8, return the input.
pub fn percent_decode_path(path: &str) -> String {
    match percent_decode_str(path).decode_utf8() {
        Ok(v) => v.to_string(),
        Err(_) => path.to_string(),
    }
}

/// query_pairs parses a query string into decoded key-value pairs.
pub fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut iter = pair.splitn(2, '=');
            let key = iter.next().unwrap_or("");
            let value = iter.next().unwrap_or("");
            (percent_decode_path(key), percent_decode_path(value))
        })
        .collect()
}

/// QueryPairsWriter builds an url with query pairs, values are encoded.
#[derive(Debug)]
pub struct QueryPairsWriter {
    base: String,
    has_query: bool,
}

impl QueryPairsWriter {
    /// Create a writer on top of `base`.
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            has_query: base.contains('?'),
        }
    }

    /// Append `key=value`.
    pub fn push(mut self, key: &str, value: &str) -> Self {
        self.base.push(if self.has_query { '&' } else { '?' });
        self.has_query = true;
        self.base.push_str(key);
        if !value.is_empty() {
            self.base.push('=');
            self.base.push_str(&percent_encode_query(value));
        }
        self
    }

    /// Finish the url.
    pub fn finish(self) -> String {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_percent_encode_path() {
        let cases = vec![
            ("reserved", ";,/?:@&=+$", "%3B%2C/%3F%3A%40%26%3D%2B%24"),
            ("unescaped", "-_.!~*'()", "-_.!~*'()"),
            ("space", "dir/a b.txt", "dir/a%20b.txt"),
        ];

        for (name, input, expected) in cases {
            assert_eq!(percent_encode_path(input), expected, "{name}");
        }
    }

    #[test]
    fn test_query_pairs_writer() {
        let url = QueryPairsWriter::new("http://127.0.0.1/c/b")
            .push("comp", "block")
            .push("blockid", "YWJj+/==")
            .finish();
        assert_eq!(url, "http://127.0.0.1/c/b?comp=block&blockid=YWJj%2B%2F%3D%3D");

        let (_, query) = url.split_once('?').unwrap();
        assert_eq!(
            query_pairs(query),
            vec![
                ("comp".to_string(), "block".to_string()),
                ("blockid".to_string(), "YWJj+/==".to_string()),
            ]
        );
    }
}
