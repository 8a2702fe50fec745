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

//! # Static Assets Module for Bazaar Web Server
//!
//! This crate implements the static asset delivery engine: it serves files
//! from a configured root directory with correct caching semantics,
//! conditional-request short-circuiting, content-type and compression
//! negotiation, path-traversal defense and per-asset usage accounting.
//!
//! ## Supported functionality
//!
//! * `GET` and `HEAD` requests; everything else is passed on to the next
//!   handler
//! * Default-deny extension allowlist checked before any filesystem access
//! * Traversal and hidden-file rejection with canonicalize-then-verify
//!   containment in the root directory
//! * Configurable directory index files and a single fallback file for
//!   single-page-application routing
//! * Conditional requests via `If-None-Match` and `If-Modified-Since` HTTP
//!   headers, with entity tags derived from file size, modification time and
//!   path
//! * Per-extension `Cache-Control` policies (immutable build artifacts,
//!   short-lived markup, uncached source maps)
//! * Dynamic compression via gzip and Brotli, negotiated against the
//!   client’s `Accept-Encoding` preferences
//! * Security response headers appropriate to the content class
//! * Process-wide request/bandwidth accounting per asset
//!
//! ## Known limitations
//!
//! * Byte range requests are not supported, the full file is returned.
//! * Concurrent requests for the same asset each read the file independently;
//!   there is no single-flight deduplication.
//!
//! ## Code example
//!
//! You will typically create a [`StaticAssetsHandler`] instance and make your
//! server call it during the request filter phase. A `NotFound` outcome is
//! reported as “unhandled” so that the surrounding router can try the next
//! handler.
//!
//! ```rust,no_run
//! use bazaar_module_utils::{FromYaml, RequestFilter};
//! use static_assets_module::{StaticAssetsConf, StaticAssetsHandler};
//!
//! let conf = StaticAssetsConf::from_yaml(
//!     r#"
//!         root: /var/www/html
//!         compress_gzip: true
//!     "#,
//! )
//! .unwrap();
//! let handler = StaticAssetsHandler::new(conf).unwrap();
//! ```
//!
//! ## Compression support
//!
//! Compression is enabled per algorithm via the `compress_gzip` and
//! `compress_brotli` configuration settings. Only text-like assets are
//! eligible; the algorithm is chosen from the client’s `Accept-Encoding`
//! preferences, and compressed responses carry `Content-Encoding` and
//! `Vary: Accept-Encoding` headers.

mod compression;
mod compression_algorithm;
mod configuration;
mod file_writer;
mod handler;
mod security_headers;
pub mod analytics;
pub mod cache_control;
pub mod metadata;
pub mod path;
#[cfg(test)]
mod tests;

pub use analytics::{AssetAnalytics, AssetRecord};
pub use configuration::{StaticAssetsConf, StaticAssetsOpt};
pub use handler::StaticAssetsHandler;
