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

//! Per-extension cache policy table

use std::fmt::Write as _;

/// Stylesheets, scripts and fonts carry content-addressable or
/// build-versioned names and can be cached for a year without revalidation.
const IMMUTABLE_EXTENSIONS: &[&str] = &["css", "eot", "js", "mjs", "otf", "ttf", "woff", "woff2"];

/// Markup is short-lived so that near-term edits propagate.
const MARKUP_EXTENSIONS: &[&str] = &["htm", "html"];

/// Source maps are not cached at all.
const UNCACHED_EXTENSIONS: &[&str] = &["map"];

const ONE_YEAR: u32 = 31_536_000;
const ONE_HOUR: u32 = 3600;

/// A per-extension caching directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// `max-age` directive value in seconds
    pub max_age: u32,
    /// Whether the response may be stored by shared caches
    pub public: bool,
    /// Whether the response carries the `immutable` directive
    pub immutable: bool,
}

impl CachePolicy {
    /// Renders the policy as a `Cache-Control` header value.
    pub fn header_value(&self) -> String {
        if self.max_age == 0 && !self.immutable {
            return "no-cache".to_owned();
        }

        let mut value = String::from(if self.public { "public" } else { "private" });
        let _ = write!(value, ", max-age={}", self.max_age);
        if self.immutable {
            value.push_str(", immutable");
        }
        value
    }
}

/// Looks up the cache policy for a file extension. Extensions without a
/// dedicated entry receive a public policy with the caller-supplied
/// `default_max_age`.
pub fn policy_for(extension: Option<&str>, default_max_age: u32) -> CachePolicy {
    let matches = |table: &[&str]| {
        extension.is_some_and(|extension| {
            table
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        })
    };

    if matches(IMMUTABLE_EXTENSIONS) {
        CachePolicy {
            max_age: ONE_YEAR,
            public: true,
            immutable: true,
        }
    } else if matches(MARKUP_EXTENSIONS) {
        CachePolicy {
            max_age: ONE_HOUR,
            public: true,
            immutable: false,
        }
    } else if matches(UNCACHED_EXTENSIONS) {
        CachePolicy {
            max_age: 0,
            public: false,
            immutable: false,
        }
    } else {
        CachePolicy {
            max_age: default_max_age,
            public: true,
            immutable: false,
        }
    }
}
