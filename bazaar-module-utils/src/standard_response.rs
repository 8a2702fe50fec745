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

//! Standard responses for various conditions
//!
//! The response bodies are generic and stable for a given status code, so
//! that nothing from the request ever leaks into an error page.

use http::{header, Method, StatusCode};

use crate::error::Error;
use crate::session::{ResponseHeader, SessionWrapper};

/// Produces the text of a standard response page for the given status code.
pub fn response_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{status_str} {reason}</title></head>
<body>
<center><h1>{status_str} {reason}</h1></center>
</body>
</html>"#
    )
}

async fn response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
    location: Option<&str>,
) -> Result<(), Box<Error>> {
    let text = response_text(status);

    let num_headers = if location.is_some() { 3 } else { 2 };
    let mut header = ResponseHeader::build(status, Some(num_headers))?;
    header.append_header(header::CONTENT_LENGTH, text.len().to_string())?;
    header.append_header(header::CONTENT_TYPE, "text/html")?;
    if let Some(location) = location {
        header.append_header(header::LOCATION, location)?;
    }
    session.write_response_header(Box::new(header)).await?;

    if session.req_header().method != Method::HEAD {
        session.write_response_body(text.into()).await?;
    }

    Ok(())
}

/// Responds with a standard error page for the given status code.
pub async fn error_response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
) -> Result<(), Box<Error>> {
    response(session, status, None).await
}

/// Responds with a redirect to the given location.
pub async fn redirect_response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
    location: &str,
) -> Result<(), Box<Error>> {
    response(session, status, Some(location)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::{RequestHeader, TestSession};
    use test_log::test;

    #[test(tokio::test)]
    async fn error_page() {
        let mut session = TestSession::new(RequestHeader::build("GET", b"/anything").unwrap());
        error_response(&mut session, StatusCode::FORBIDDEN)
            .await
            .unwrap();

        let header = session.response_written().unwrap();
        assert_eq!(header.status, StatusCode::FORBIDDEN);
        assert_eq!(
            header
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/html")
        );

        let text = response_text(StatusCode::FORBIDDEN);
        assert_eq!(session.body_str(), text);
        assert!(!text.contains("/anything"));
    }

    #[test(tokio::test)]
    async fn head_omits_body() {
        let mut session = TestSession::new(RequestHeader::build("HEAD", b"/").unwrap());
        error_response(&mut session, StatusCode::NOT_FOUND)
            .await
            .unwrap();

        assert_eq!(
            session.response_written().map(|header| header.status),
            Some(StatusCode::NOT_FOUND)
        );
        assert_eq!(session.body_str(), "");
    }

    #[test(tokio::test)]
    async fn redirect() {
        let mut session = TestSession::new(RequestHeader::build("GET", b"/old").unwrap());
        redirect_response(&mut session, StatusCode::PERMANENT_REDIRECT, "/new")
            .await
            .unwrap();

        let header = session.response_written().unwrap();
        assert_eq!(header.status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            header
                .headers
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/new")
        );
    }
}
