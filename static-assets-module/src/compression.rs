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

//! Transfer-encoding negotiation and dynamic compression

use bytes::Bytes;
use flate2::write::GzEncoder;
use http::header;
use std::io::Write as _;

use bazaar_module_utils::{Error, ErrorType, ResponseHeader, SessionWrapper};

use crate::compression_algorithm::{find_matches, CompressionAlgorithm};
use crate::configuration::StaticAssetsConf;

/// Text-like extensions eligible for compression. Binary formats are
/// already compressed or gain nothing.
const COMPRESSIBLE_EXTENSIONS: &[&str] = &[
    "css", "htm", "html", "js", "json", "map", "md", "mjs", "svg", "txt", "xml",
];

const ENCODER_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW_SIZE: u32 = 22;

fn compressible(extension: Option<&str>) -> bool {
    extension.is_some_and(|extension| {
        COMPRESSIBLE_EXTENSIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    })
}

/// Encapsulates the negotiated compression state for the current request.
#[derive(Debug)]
pub(crate) struct Compression {
    active: Option<CompressionAlgorithm>,
}

impl Compression {
    /// Negotiates a compression algorithm from the client’s `Accept-Encoding`
    /// preferences, the enabled algorithms and the asset’s extension.
    pub(crate) fn negotiate(
        session: &impl SessionWrapper,
        conf: &StaticAssetsConf,
        extension: Option<&str>,
    ) -> Self {
        let mut supported = Vec::with_capacity(2);
        if conf.compress_gzip {
            supported.push(CompressionAlgorithm::Gzip);
        }
        if conf.compress_brotli {
            supported.push(CompressionAlgorithm::Brotli);
        }

        if supported.is_empty() || !compressible(extension) {
            return Self { active: None };
        }

        let requested = session
            .req_header()
            .headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        Self {
            active: find_matches(requested, &supported).first().copied(),
        }
    }

    /// Whether an algorithm was negotiated for this request.
    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Applies the necessary modifications to the HTTP response header:
    /// `Content-Encoding`, `Vary: Accept-Encoding` and the `Content-Length`
    /// of the encoded payload. Responses without a negotiated algorithm are
    /// left untouched.
    pub(crate) fn transform_header(
        &self,
        header: &mut ResponseHeader,
        encoded_size: usize,
    ) -> Result<(), Box<Error>> {
        if let Some(algorithm) = self.active {
            header.insert_header(header::CONTENT_ENCODING, algorithm.name())?;
            header.insert_header(header::VARY, "Accept-Encoding")?;
            header.insert_header(header::CONTENT_LENGTH, encoded_size.to_string())?;
        }
        Ok(())
    }

    /// Encodes the response body with the negotiated algorithm.
    pub(crate) fn encode(&self, data: &[u8]) -> Result<Bytes, Box<Error>> {
        let encoded = match self.active {
            Some(CompressionAlgorithm::Gzip) => {
                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(ENCODER_BUFFER_SIZE),
                    flate2::Compression::default(),
                );
                encoder.write_all(data).map_err(|err| {
                    Error::because(ErrorType::InternalError, "gzip encoding failed", err)
                })?;
                encoder.finish().map_err(|err| {
                    Error::because(ErrorType::InternalError, "gzip encoding failed", err)
                })?
            }
            Some(CompressionAlgorithm::Brotli) => {
                let mut encoder = brotli::CompressorWriter::new(
                    Vec::new(),
                    ENCODER_BUFFER_SIZE,
                    BROTLI_QUALITY,
                    BROTLI_WINDOW_SIZE,
                );
                encoder.write_all(data).map_err(|err| {
                    Error::because(ErrorType::InternalError, "brotli encoding failed", err)
                })?;
                encoder.flush().map_err(|err| {
                    Error::because(ErrorType::InternalError, "brotli encoding failed", err)
                })?;
                encoder.into_inner()
            }
            None => data.to_vec(),
        };
        Ok(encoded.into())
    }
}
