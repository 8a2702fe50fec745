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

//! Security response headers keyed by content class

use http::header;

use bazaar_module_utils::{Error, ResponseHeader};

/// Extensions whose content can carry or trigger script execution.
const SCRIPT_BEARING_EXTENSIONS: &[&str] = &["htm", "html", "js", "mjs"];

/// Vector images can embed executable markup, so they get a restrictive
/// content security policy scoped to the single response.
const SVG_CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; style-src 'unsafe-inline'; sandbox";

/// Attaches the security headers appropriate to the content class: every
/// response is marked `nosniff`, script-bearing content additionally denies
/// framing, and vector images receive a restrictive content security policy.
pub(crate) fn append_security_headers(
    header: &mut ResponseHeader,
    extension: Option<&str>,
) -> Result<(), Box<Error>> {
    header.insert_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")?;

    if let Some(extension) = extension {
        if SCRIPT_BEARING_EXTENSIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        {
            header.insert_header(header::X_FRAME_OPTIONS, "DENY")?;
        }

        if extension.eq_ignore_ascii_case("svg") {
            header.insert_header(header::CONTENT_SECURITY_POLICY, SVG_CONTENT_SECURITY_POLICY)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::StatusCode;

    fn headers_for(extension: Option<&str>) -> ResponseHeader {
        let mut header = ResponseHeader::build(StatusCode::OK, None).unwrap();
        append_security_headers(&mut header, extension).unwrap();
        header
    }

    #[test]
    fn content_classes() {
        let header = headers_for(Some("png"));
        assert_eq!(
            header
                .headers
                .get(header::X_CONTENT_TYPE_OPTIONS)
                .and_then(|value| value.to_str().ok()),
            Some("nosniff")
        );
        assert!(header.headers.get(header::X_FRAME_OPTIONS).is_none());
        assert!(header.headers.get(header::CONTENT_SECURITY_POLICY).is_none());

        let header = headers_for(Some("html"));
        assert_eq!(
            header
                .headers
                .get(header::X_FRAME_OPTIONS)
                .and_then(|value| value.to_str().ok()),
            Some("DENY")
        );

        let header = headers_for(Some("svg"));
        assert_eq!(
            header
                .headers
                .get(header::CONTENT_SECURITY_POLICY)
                .and_then(|value| value.to_str().ok()),
            Some(SVG_CONTENT_SECURITY_POLICY)
        );
        assert!(header.headers.get(header::X_FRAME_OPTIONS).is_none());
    }
}
