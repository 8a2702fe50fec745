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

//! Path resolution and request gatekeeping
//!
//! Rejections are communicated through [`std::io::ErrorKind`]:
//!
//! * [`ErrorKind::InvalidInput`]: path not starting with a slash (/)
//! * [`ErrorKind::InvalidData`]: traversal sequence, or the resolved path
//!   left the root directory
//! * [`ErrorKind::PermissionDenied`]: hidden file or directory
//! * [`ErrorKind::Unsupported`]: file extension not in the allowlist
//! * [`ErrorKind::NotFound`] and others: produced by
//!   [`std::fs::canonicalize()`]

use percent_encoding::percent_decode_str;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

/// The closed set of file extensions this module will serve. Everything else
/// is rejected before the filesystem is consulted.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    // documents
    "css", "htm", "html", "js", "json", "map", "md", "mjs", "txt", "xml",
    // images
    "avif", "bmp", "gif", "ico", "jpeg", "jpg", "png", "svg", "webp",
    // fonts
    "eot", "otf", "ttf", "woff", "woff2",
    // media
    "mp3", "mp4", "ogg", "wav", "webm",
    // archives and binary payloads
    "gz", "pdf", "tar", "wasm", "zip",
];

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> &std::ffi::OsStr {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    OsStr::from_bytes(bytes)
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> String {
    // Non-Unicode file names will result in 404 on non-Unix platforms.
    String::from_utf8_lossy(bytes).into_owned()
}

/// Fast-path pre-filter for parent-directory traversal sequences in their
/// literal, backslash and percent-encoded forms. The canonicalization in
/// [`resolve_asset`] remains the structural guarantee.
fn has_traversal_sequence(raw_path: &str) -> bool {
    let lower = raw_path.to_ascii_lowercase();
    lower.contains("../")
        || lower.contains("..\\")
        || lower.contains("%2e%2e")
        || lower.contains("..%2f")
        || lower.contains("..%5c")
}

/// Returns the extension of a path segment, ignoring any leading dots so
/// that hidden files without a further extension are not misclassified.
fn segment_extension(segment: &str) -> Option<&str> {
    segment
        .trim_start_matches('.')
        .rsplit_once('.')
        .map(|(_, extension)| extension)
}

/// Checks a file extension against [`ALLOWED_EXTENSIONS`].
pub fn extension_allowed(extension: &str) -> bool {
    ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
}

/// Resolves the path from a request URI against the root directory.
///
/// The path is validated against the extension allowlist, the hidden-file
/// policy and traversal sequences before the filesystem is consulted. The
/// joined path is then canonicalized and verified to still be a descendant
/// of the root directory.
pub fn resolve_asset(uri_path: &str, root: &Path, serve_hidden: bool) -> Result<PathBuf, Error> {
    let rel_path = uri_path.strip_prefix('/').ok_or(ErrorKind::InvalidInput)?;

    let rel_path = rel_path.strip_suffix('/').unwrap_or(rel_path);

    if has_traversal_sequence(uri_path) {
        return Err(ErrorKind::InvalidData.into());
    }

    let mut segments = Vec::new();
    for component in rel_path.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }

        let decoded = percent_decode_str(component).collect::<Vec<_>>();
        if decoded == b".." {
            return Err(ErrorKind::InvalidData.into());
        }
        if !serve_hidden && decoded.first() == Some(&b'.') {
            return Err(ErrorKind::PermissionDenied.into());
        }
        segments.push(decoded);
    }

    if let Some(last) = segments.last() {
        let last = String::from_utf8_lossy(last);
        if let Some(extension) = segment_extension(&last) {
            if !extension_allowed(extension) {
                return Err(ErrorKind::Unsupported.into());
            }
        }
    }

    let mut path = root.to_path_buf();
    for segment in &segments {
        path.push(path_from_bytes(segment));
    }

    let path = path.canonicalize()?;

    if path.starts_with(root) {
        Ok(path)
    } else {
        Err(ErrorKind::InvalidData.into())
    }
}
