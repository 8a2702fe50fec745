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

//! Handler for the request filter phase

use async_trait::async_trait;
use http::{header, Method, StatusCode};
use log::{debug, error, warn};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;

use bazaar_module_utils::standard_response::error_response;
use bazaar_module_utils::{
    Error, ErrorType, RequestFilter, RequestFilterResult, SessionWrapper,
};

use crate::analytics::AssetAnalytics;
use crate::cache_control::policy_for;
use crate::compression::Compression;
use crate::configuration::StaticAssetsConf;
use crate::file_writer::file_response;
use crate::metadata::Metadata;
use crate::path::resolve_asset;
use crate::security_headers::append_security_headers;

/// Longest prefix of a client-supplied path that makes it into the logs.
const LOGGED_PATH_MAX: usize = 100;

/// Prepares a client-supplied path for logging: control and non-ASCII bytes
/// are replaced and overlong paths truncated, so that log output stays one
/// line per event.
fn sanitize_path(path: &str) -> String {
    let mut sanitized = path
        .chars()
        .take(LOGGED_PATH_MAX)
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '?'
            }
        })
        .collect::<String>();
    if path.chars().count() > LOGGED_PATH_MAX {
        sanitized.push_str("...");
    }
    sanitized
}

/// Handler serving static assets during the request filter phase
#[derive(Debug)]
pub struct StaticAssetsHandler {
    conf: StaticAssetsConf,
    root: PathBuf,
    analytics: Arc<AssetAnalytics>,
}

impl TryFrom<StaticAssetsConf> for StaticAssetsHandler {
    type Error = Box<Error>;

    fn try_from(conf: StaticAssetsConf) -> Result<Self, Self::Error> {
        Self::with_analytics(conf, Arc::new(AssetAnalytics::new()))
    }
}

impl StaticAssetsHandler {
    /// Creates a new handler with the given configuration and an existing
    /// analytics store. This will canonicalize the path to the root directory
    /// and results in an error if that path isn’t an accessible directory.
    pub fn with_analytics(
        conf: StaticAssetsConf,
        analytics: Arc<AssetAnalytics>,
    ) -> Result<Self, Box<Error>> {
        let root = conf
            .root
            .as_ref()
            .ok_or_else(|| Error::explain(ErrorType::InternalError, "root directory not configured"))?;
        let root = root.canonicalize().map_err(|err| {
            Error::because(
                ErrorType::InternalError,
                format!("Failed accessing root path {root:?}"),
                err,
            )
        })?;
        if !root.is_dir() {
            return Err(Error::explain(
                ErrorType::InternalError,
                format!("Root path {root:?} is not a directory"),
            ));
        }

        debug!("Initialized static assets handler, settings: {conf:#?}");
        Ok(Self {
            conf,
            root,
            analytics,
        })
    }

    /// Provides read-only access to the handler’s configuration.
    pub fn conf(&self) -> &StaticAssetsConf {
        &self.conf
    }

    /// Provides access to the handler’s analytics store.
    pub fn analytics(&self) -> Arc<AssetAnalytics> {
        Arc::clone(&self.analytics)
    }

    /// Resolves the configured fallback file against the root directory if it
    /// refers to a regular file.
    fn fallback_path(&self) -> Option<PathBuf> {
        let fallback = self.conf.fallback_file.as_ref()?;
        let path = self.root.join(fallback);
        path.is_file().then_some(path)
    }
}

#[async_trait]
impl RequestFilter for StaticAssetsHandler {
    type Conf = StaticAssetsConf;
    type CTX = ();
    fn new_ctx() -> Self::CTX {}

    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        _ctx: &mut Self::CTX,
    ) -> Result<RequestFilterResult, Box<Error>> {
        match session.req_header().method {
            Method::GET | Method::HEAD => {
                // Allowed
            }
            _ => {
                debug!(
                    "passing non-GET/HEAD request on to the next handler: {}",
                    session.req_header().method
                );
                return Ok(RequestFilterResult::Unhandled);
            }
        }

        let uri_path = session.req_header().uri.path().to_owned();
        debug!("received URI path {}", sanitize_path(&uri_path));

        let mut path = match resolve_asset(&uri_path, &self.root, self.conf.serve_hidden) {
            Ok(path) => path,
            Err(err) => {
                match err.kind() {
                    ErrorKind::InvalidInput => {
                        warn!("rejecting invalid path {}", sanitize_path(&uri_path));
                    }
                    ErrorKind::InvalidData => {
                        warn!(
                            "rejecting path traversal attempt {}",
                            sanitize_path(&uri_path)
                        );
                    }
                    ErrorKind::PermissionDenied => {
                        warn!("rejecting hidden path {}", sanitize_path(&uri_path));
                    }
                    ErrorKind::Unsupported => {
                        warn!(
                            "rejecting path with disallowed extension {}",
                            sanitize_path(&uri_path)
                        );
                    }
                    ErrorKind::NotFound => {
                        debug!("no asset found for path {}", sanitize_path(&uri_path));
                        if let Some(fallback) = self.fallback_path() {
                            return self.deliver(session, fallback).await;
                        }
                        return Ok(RequestFilterResult::Unhandled);
                    }
                    _ => {
                        error!("failed resolving a request path");
                        debug!(
                            "resolution failure for {}: {err}",
                            sanitize_path(&uri_path)
                        );
                        error_response(session, StatusCode::INTERNAL_SERVER_ERROR).await?;
                        return Ok(RequestFilterResult::ResponseSent);
                    }
                }
                error_response(session, StatusCode::FORBIDDEN).await?;
                return Ok(RequestFilterResult::ResponseSent);
            }
        };

        debug!("translated into file path {path:?}");

        if path.is_dir() {
            let mut index = None;
            for filename in &self.conf.index_files {
                let candidate = path.join(filename);
                if candidate.is_file() {
                    debug!("using directory index file {filename}");
                    index = Some(candidate);
                    break;
                }
            }

            path = match index.or_else(|| self.fallback_path()) {
                Some(path) => path,
                None => {
                    debug!(
                        "no index file in directory {}",
                        sanitize_path(&uri_path)
                    );
                    return Ok(RequestFilterResult::Unhandled);
                }
            };
        }

        self.deliver(session, path).await
    }
}

impl StaticAssetsHandler {
    /// Delivers a gatekeeper-approved file: evaluates conditional headers,
    /// negotiates the response representation and writes it to the session.
    async fn deliver(
        &self,
        session: &mut impl SessionWrapper,
        path: PathBuf,
    ) -> Result<RequestFilterResult, Box<Error>> {
        let conf = &self.conf;

        let meta = match Metadata::from_path(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::InvalidInput => {
                warn!("path {path:?} is not a regular file, denying access");
                error_response(session, StatusCode::FORBIDDEN).await?;
                return Ok(RequestFilterResult::ResponseSent);
            }
            Err(err) => {
                error!("failed retrieving asset metadata");
                debug!("metadata failure for {path:?}: {err}");
                error_response(session, StatusCode::INTERNAL_SERVER_ERROR).await?;
                return Ok(RequestFilterResult::ResponseSent);
            }
        };

        if meta.size > conf.max_file_size {
            warn!(
                "asset {} exceeds the configured size ceiling ({} > {})",
                sanitize_path(&path.to_string_lossy()),
                meta.size,
                conf.max_file_size
            );
            error_response(session, StatusCode::PAYLOAD_TOO_LARGE).await?;
            return Ok(RequestFilterResult::ResponseSent);
        }

        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        let extension = extension.as_deref();

        if conf.caching_enabled && meta.is_not_modified(session) {
            debug!("If-None-Match/If-Modified-Since check resulted in Not Modified");
            let mut header = meta.to_custom_header(StatusCode::NOT_MODIFIED)?;
            header.append_header(
                header::CACHE_CONTROL,
                policy_for(extension, conf.default_max_age).header_value(),
            )?;
            session.write_response_header(header).await?;
            self.analytics.record_cache_hit();
            return Ok(RequestFilterResult::ResponseSent);
        }

        let compression = Compression::negotiate(session, conf, extension);

        let mut header = meta.to_response_header()?;
        if conf.caching_enabled {
            header.append_header(
                header::CACHE_CONTROL,
                policy_for(extension, conf.default_max_age).header_value(),
            )?;
            meta.append_cache_validators(&mut header)?;
        }
        append_security_headers(&mut header, extension)?;

        let is_head = session.req_header().method == Method::HEAD;

        let bytes_sent = if compression.is_active() {
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(err) => {
                    error!("failed reading asset data");
                    debug!("read failure for {path:?}: {err}");
                    error_response(session, StatusCode::INTERNAL_SERVER_ERROR).await?;
                    return Ok(RequestFilterResult::ResponseSent);
                }
            };
            let encoded = compression.encode(&data)?;
            compression.transform_header(&mut header, encoded.len())?;

            session.write_response_header(header).await?;
            if is_head {
                0
            } else {
                let len = encoded.len() as u64;
                session.write_response_body(encoded).await?;
                len
            }
        } else if is_head {
            session.write_response_header(header).await?;
            0
        } else {
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(err) => {
                    error!("failed opening asset file");
                    debug!("open failure for {path:?}: {err}");
                    error_response(session, StatusCode::INTERNAL_SERVER_ERROR).await?;
                    return Ok(RequestFilterResult::ResponseSent);
                }
            };

            session.write_response_header(header).await?;
            file_response(session, file, meta.size).await?
        };

        self.analytics.record_delivery(&path, bytes_sent);
        Ok(RequestFilterResult::ResponseSent)
    }
}
