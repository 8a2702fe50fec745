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

//! Data structures required for `StaticAssetsHandler` configuration

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Default ceiling for the size of a served file (50 MiB).
const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Command line options of the static assets module
#[derive(Debug, Default, Parser)]
pub struct StaticAssetsOpt {
    /// The root directory.
    #[clap(short, long)]
    pub root: Option<PathBuf>,

    /// Produce Cache-Control/ETag/Last-Modified headers and evaluate
    /// conditional requests.
    #[clap(long)]
    pub caching_enabled: Option<bool>,

    /// Cache-Control max-age in seconds for extensions without a dedicated
    /// cache policy.
    #[clap(long)]
    pub default_max_age: Option<u32>,

    /// Maximum size in bytes of a file that will be served.
    #[clap(long)]
    pub max_file_size: Option<u64>,

    /// Index file to look for when a directory is requested. This command
    /// line flag can be specified multiple times.
    #[clap(long)]
    pub index_files: Option<Vec<String>>,

    /// File served (relative to the root directory) when the requested path
    /// does not resolve, e.g. index.html for single-page applications.
    #[clap(long)]
    pub fallback_file: Option<PathBuf>,

    /// Serve files and directories whose name starts with a dot.
    #[clap(long)]
    pub serve_hidden: Option<bool>,

    /// Compress eligible responses with gzip when the client accepts it.
    #[clap(long)]
    pub compress_gzip: Option<bool>,

    /// Compress eligible responses with Brotli when the client accepts it.
    #[clap(long)]
    pub compress_brotli: Option<bool>,
}

/// Configuration file settings of the static assets module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StaticAssetsConf {
    /// The root directory.
    pub root: Option<PathBuf>,

    /// If `true` (default), Cache-Control/ETag/Last-Modified headers are
    /// produced and conditional requests are evaluated.
    pub caching_enabled: bool,

    /// Cache-Control max-age in seconds for extensions without a dedicated
    /// cache policy.
    pub default_max_age: u32,

    /// Maximum size in bytes of a file that will be served. Larger files
    /// result in a 413 Payload Too Large response.
    pub max_file_size: u64,

    /// List of index files to look for in a requested directory, tried in
    /// order.
    pub index_files: Vec<String>,

    /// File served (relative to the root directory) when the requested path
    /// does not resolve, e.g. index.html for single-page applications.
    pub fallback_file: Option<PathBuf>,

    /// If `true`, files and directories whose name starts with a dot are
    /// served rather than rejected.
    pub serve_hidden: bool,

    /// If `true`, eligible responses are compressed with gzip when the
    /// client accepts it.
    pub compress_gzip: bool,

    /// If `true`, eligible responses are compressed with Brotli when the
    /// client accepts it.
    pub compress_brotli: bool,
}

impl StaticAssetsConf {
    /// Merges the command line options into the current configuration. Any
    /// command line options present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: StaticAssetsOpt) {
        if opt.root.is_some() {
            self.root = opt.root;
        }

        if let Some(caching_enabled) = opt.caching_enabled {
            self.caching_enabled = caching_enabled;
        }

        if let Some(default_max_age) = opt.default_max_age {
            self.default_max_age = default_max_age;
        }

        if let Some(max_file_size) = opt.max_file_size {
            self.max_file_size = max_file_size;
        }

        if let Some(index_files) = opt.index_files {
            self.index_files = index_files;
        }

        if opt.fallback_file.is_some() {
            self.fallback_file = opt.fallback_file;
        }

        if let Some(serve_hidden) = opt.serve_hidden {
            self.serve_hidden = serve_hidden;
        }

        if let Some(compress_gzip) = opt.compress_gzip {
            self.compress_gzip = compress_gzip;
        }

        if let Some(compress_brotli) = opt.compress_brotli {
            self.compress_brotli = compress_brotli;
        }
    }
}

impl Default for StaticAssetsConf {
    fn default() -> Self {
        Self {
            root: None,
            caching_enabled: true,
            default_max_age: 3600,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            index_files: vec!["index.html".to_owned()],
            fallback_file: None,
            serve_hidden: false,
            compress_gzip: false,
            compress_brotli: false,
        }
    }
}
