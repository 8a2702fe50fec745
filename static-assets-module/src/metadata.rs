// Copyright 2025 Bazaar Web Server contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File metadata handling and conditional request evaluation

use http::{header, StatusCode};
use httpdate::{fmt_http_date, parse_http_date};
use mime_guess::MimeGuess;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io::{Error, ErrorKind};
use std::path::Path;
use std::time::{Duration, SystemTime};

use bazaar_module_utils::{Error as ServerError, ResponseHeader, SessionWrapper};

/// Number of leading digest bytes encoded into an entity tag.
const ETAG_BYTES: usize = 8;

/// Computes the entity tag for a file: a SHA-256 digest of size,
/// modification time (as epoch milliseconds) and resolved path, truncated
/// and wrapped in quotes per the wire format for entity tags. Identical
/// inputs always produce the identical tag.
fn entity_tag(size: u64, modified: Option<SystemTime>, path: &Path) -> String {
    let millis = modified
        .and_then(|modified| modified.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map_or(0, |duration| duration.as_millis());

    let mut hasher = Sha256::new();
    hasher.update(size.to_be_bytes());
    hasher.update(millis.to_be_bytes());
    hasher.update(path.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();

    let mut tag = String::with_capacity(ETAG_BYTES * 2 + 2);
    tag.push('"');
    for byte in &digest[..ETAG_BYTES] {
        let _ = write!(tag, "{byte:02x}");
    }
    tag.push('"');
    tag
}

/// HTTP dates carry whole seconds only, drop the sub-second part before
/// comparing file modification times against them.
fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| SystemTime::UNIX_EPOCH + Duration::from_secs(duration.as_secs()))
        .unwrap_or(time)
}

/// Helper wrapping file metadata information
#[derive(Debug)]
pub struct Metadata {
    /// Guessed MIME types (if any) for the file
    pub mime: MimeGuess,
    /// File size in bytes
    pub size: u64,
    /// Last modified time of the file if it can be retrieved
    pub modified: Option<SystemTime>,
    /// Last modified time in the format `Fri, 15 May 2015 15:34:21 GMT`
    pub last_modified: Option<String>,
    /// ETag header value for the file
    pub etag: String,
}

impl Metadata {
    /// Collects the metadata for a file.
    ///
    /// This method will return any errors produced by [`std::fs::metadata()`].
    /// It will also result in a [`ErrorKind::InvalidInput`] error if the path
    /// given doesn’t point to a regular file.
    pub fn from_path<P: AsRef<Path> + ?Sized>(path: &P) -> Result<Self, Error> {
        let meta = path.as_ref().metadata()?;

        if !meta.is_file() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let mime = mime_guess::from_path(path);
        let size = meta.len();
        let modified = meta.modified().ok();
        let last_modified = modified.map(fmt_http_date);
        let etag = entity_tag(size, modified, path.as_ref());

        Ok(Self {
            mime,
            size,
            modified,
            last_modified,
            etag,
        })
    }

    /// Checks `If-None-Match` and `If-Modified-Since` headers of the request
    /// to determine whether a `304 Not Modified` response should be produced.
    ///
    /// `If-None-Match` takes precedence; `If-Modified-Since` is only
    /// consulted in its absence and matches when the file’s modification
    /// time is not strictly after the header timestamp.
    pub fn is_not_modified(&self, session: &impl SessionWrapper) -> bool {
        let headers = &session.req_header().headers;
        if let Some(value) = headers
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
        {
            value == "*"
                || value
                    .split(',')
                    .map(str::trim)
                    .any(|value| value == self.etag)
        } else if let Some(value) = headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
        {
            match (self.modified, parse_http_date(value)) {
                (Some(modified), Ok(since)) => truncate_to_seconds(modified) <= since,
                _ => false,
            }
        } else {
            false
        }
    }

    /// Appends the `ETag` and `Last-Modified` cache validator headers.
    pub(crate) fn append_cache_validators(
        &self,
        header: &mut ResponseHeader,
    ) -> Result<(), Box<ServerError>> {
        if let Some(last_modified) = &self.last_modified {
            header.append_header(header::LAST_MODIFIED, last_modified)?;
        }
        header.append_header(header::ETAG, &self.etag)?;
        Ok(())
    }

    /// Produces a `200 OK` response header with `Content-Length` and
    /// `Content-Type` according to file metadata.
    pub(crate) fn to_response_header(&self) -> Result<Box<ResponseHeader>, Box<ServerError>> {
        let mut header = ResponseHeader::build(StatusCode::OK, Some(8))?;
        header.append_header(header::CONTENT_LENGTH, self.size.to_string())?;
        header.append_header(
            header::CONTENT_TYPE,
            self.mime.first_or_octet_stream().as_ref(),
        )?;
        Ok(Box::new(header))
    }

    /// Produces a response header with the specified status code, cache
    /// validators and no response body.
    pub(crate) fn to_custom_header(
        &self,
        status: StatusCode,
    ) -> Result<Box<ResponseHeader>, Box<ServerError>> {
        let mut header = ResponseHeader::build(status, Some(4))?;
        self.append_cache_validators(&mut header)?;
        Ok(Box::new(header))
    }
}
