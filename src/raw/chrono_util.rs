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

use chrono::DateTime;
use chrono::Utc;

use crate::*;

/// Parse datetime from rfc2822.
///
/// For example: `Fri, 28 Nov 2014 21:00:09 GMT`
pub fn parse_datetime_from_rfc2822(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .map(|v| v.into())
        .map_err(|e| {
            Error::new(ErrorKind::Unexpected, "parse datetime from rfc2822 failed")
                .with_context("value", s)
                .set_source(e)
        })
}

/// Format datetime into http date as used by `If-Modified-Since` and
/// `If-Unmodified-Since`.
pub fn format_datetime_into_http_date(s: DateTime<Utc>) -> String {
    s.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_datetime_into_http_date() {
        let v = parse_datetime_from_rfc2822("Sat, 29 Oct 1994 19:43:31 +0000").unwrap();
        assert_eq!(
            format_datetime_into_http_date(v),
            "Sat, 29 Oct 1994 19:43:31 GMT"
        );
    }
}
