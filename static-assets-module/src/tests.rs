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

use crate::configuration::StaticAssetsConf;
use crate::handler::StaticAssetsHandler;
use crate::metadata::Metadata;

use bazaar_module_utils::standard_response::response_text;
use bazaar_module_utils::{
    ErrorType, FromYaml, RequestFilter, RequestFilterResult, RequestHeader, SessionWrapper,
    TestSession,
};
use http::{header, StatusCode};
use std::io::Read as _;
use std::path::PathBuf;
use test_log::test;

fn root_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push("root");
    if !filename.is_empty() {
        path.push(filename);
    }
    path
}

fn default_conf() -> String {
    format!(
        "root: {}",
        root_path("").into_os_string().into_string().unwrap()
    )
}

fn extended_conf(conf_str: impl AsRef<str>) -> String {
    format!("{}\n{}", default_conf(), conf_str.as_ref())
}

fn make_handler(conf_str: impl AsRef<str>) -> StaticAssetsHandler {
    StaticAssetsConf::from_yaml(conf_str)
        .unwrap()
        .try_into()
        .unwrap()
}

fn make_session(method: &str, path: &str) -> TestSession {
    TestSession::new(RequestHeader::build(method, path.as_bytes()).unwrap())
}

async fn handle(handler: &StaticAssetsHandler, session: &mut TestSession) -> RequestFilterResult {
    handler.request_filter(session, &mut ()).await.unwrap()
}

fn assert_status(session: &TestSession, expected: u16) {
    assert_eq!(
        session.response_written().unwrap().status.as_u16(),
        expected
    );
}

fn assert_headers(session: &TestSession, expected: Vec<(&str, &str)>) {
    let mut headers: Vec<_> = session
        .response_written()
        .unwrap()
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                value.to_str().unwrap().to_owned(),
            )
        })
        .collect();
    headers.sort();

    let mut expected: Vec<_> = expected
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_owned()))
        .collect();
    expected.sort();

    assert_eq!(headers, expected);
}

fn assert_body(session: &TestSession, expected: &str) {
    assert_eq!(session.body_str(), expected);
}

fn header_value(session: &TestSession, name: header::HeaderName) -> Option<String> {
    session
        .response_written()
        .unwrap()
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

#[test(tokio::test)]
async fn text_file() {
    let meta = Metadata::from_path(&root_path("file.txt")).unwrap();
    let content_type = meta.mime.first_or_octet_stream();

    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/file.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_headers(
        &session,
        vec![
            ("Content-Length", &meta.size.to_string()),
            ("Content-Type", content_type.as_ref()),
            ("Cache-Control", "public, max-age=3600"),
            ("Last-Modified", meta.last_modified.as_ref().unwrap()),
            ("ETag", &meta.etag),
            ("X-Content-Type-Options", "nosniff"),
        ],
    );
    assert_body(&session, "Hi!\n");
}

#[test(tokio::test)]
async fn utf8_path() {
    let handler = make_handler(default_conf());
    let mut session = make_session(
        "GET",
        "/subdir/%D1%84%D0%B0%D0%B9%D0%BB.txt",
    );
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "Hi!\n");
}

#[test(tokio::test)]
async fn dir_index() {
    let meta = Metadata::from_path(&root_path("index.html")).unwrap();
    let content_type = meta.mime.first_or_octet_stream();

    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_headers(
        &session,
        vec![
            ("Content-Length", &meta.size.to_string()),
            ("Content-Type", content_type.as_ref()),
            ("Cache-Control", "public, max-age=3600"),
            ("Last-Modified", meta.last_modified.as_ref().unwrap()),
            ("ETag", &meta.etag),
            ("X-Content-Type-Options", "nosniff"),
            ("X-Frame-Options", "DENY"),
        ],
    );
    assert_body(&session, "<html>Hi!</html>\n");

    // Index files are tried in order, first hit wins.
    let handler = make_handler(extended_conf("index_files: [missing.html, index.html]"));
    let mut session = make_session("GET", "/docs/");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "<html>Docs</html>\n");

    // Without a matching directory index the request is passed on.
    let handler = make_handler(extended_conf("index_files: []"));
    let mut session = make_session("GET", "/");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::Unhandled
    );
    assert!(session.response_written().is_none());
}

#[test(tokio::test)]
async fn traversal_rejected() {
    let handler = make_handler(default_conf());
    let text = response_text(StatusCode::FORBIDDEN);

    for path in [
        "/../file.txt",
        "/subdir/../file.txt",
        "/%2e%2e/file.txt",
        "/%2E%2E%2Fetc%2Fpasswd",
        "/..%2Ffile.txt",
        "/..%5Cfile.txt",
    ] {
        let mut session = make_session("GET", path);
        assert_eq!(
            handle(&handler, &mut session).await,
            RequestFilterResult::ResponseSent,
            "expected Forbidden for {path}"
        );
        assert_status(&session, 403);
        assert_body(&session, &text);
    }
}

#[test(tokio::test)]
async fn extension_allowlist() {
    let handler = make_handler(default_conf());
    let text = response_text(StatusCode::FORBIDDEN);

    // The file exists but its extension is not allowlisted.
    let mut session = make_session("GET", "/payload.exe");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 403);
    assert_body(&session, &text);

    // Disallowed extensions are rejected before the filesystem is consulted,
    // so a missing file yields the same response.
    let mut session = make_session("GET", "/missing.php");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 403);
    assert_body(&session, &text);
}

#[test(tokio::test)]
async fn hidden_files() {
    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/.hidden.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 403);
    assert_body(&session, &response_text(StatusCode::FORBIDDEN));

    let handler = make_handler(extended_conf("serve_hidden: true"));
    let mut session = make_session("GET", "/.hidden.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "secret\n");
}

#[test(tokio::test)]
async fn no_file() {
    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/missing.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::Unhandled
    );
    assert!(session.response_written().is_none());
    assert_body(&session, "");
}

#[test(tokio::test)]
async fn fallback_file() {
    let handler = make_handler(extended_conf("fallback_file: index.html"));

    // Single-page-application routes resolve to the fallback document.
    let mut session = make_session("GET", "/account/settings");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "<html>Hi!</html>\n");

    // A directory without index also falls back.
    let handler = make_handler(extended_conf(
        "fallback_file: index.html\nindex_files: []",
    ));
    let mut session = make_session("GET", "/subdir/");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "<html>Hi!</html>\n");
}

#[test(tokio::test)]
async fn wrong_method() {
    let handler = make_handler(default_conf());
    let mut session = make_session("POST", "/file.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::Unhandled
    );
    assert!(session.response_written().is_none());
}

#[test(tokio::test)]
async fn head_request() {
    let meta = Metadata::from_path(&root_path("file.txt")).unwrap();
    let content_type = meta.mime.first_or_octet_stream();

    let handler = make_handler(default_conf());
    let mut session = make_session("HEAD", "/file.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_headers(
        &session,
        vec![
            ("Content-Length", &meta.size.to_string()),
            ("Content-Type", content_type.as_ref()),
            ("Cache-Control", "public, max-age=3600"),
            ("Last-Modified", meta.last_modified.as_ref().unwrap()),
            ("ETag", &meta.etag),
            ("X-Content-Type-Options", "nosniff"),
        ],
    );
    assert_body(&session, "");
}

#[test(tokio::test)]
async fn size_limit() {
    let handler = make_handler(extended_conf("max_file_size: 1000"));

    let mut session = make_session("GET", "/exactly1000.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_eq!(session.body().len(), 1000);

    let mut session = make_session("GET", "/exactly1001.txt");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 413);
    assert_body(&session, &response_text(StatusCode::PAYLOAD_TOO_LARGE));
}

#[test(tokio::test)]
async fn conditional_round_trip() {
    let handler = make_handler(default_conf());

    let mut session = make_session("GET", "/style.css");
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    let etag = header_value(&session, header::ETAG).unwrap();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let mut session = make_session("GET", "/style.css");
    session
        .req_header_mut()
        .insert_header("If-None-Match", &etag)
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 304);
    assert_eq!(header_value(&session, header::ETAG).unwrap(), etag);
    assert_body(&session, "");

    // A tag list containing the right tag matches as well
    let mut session = make_session("GET", "/style.css");
    session
        .req_header_mut()
        .insert_header("If-None-Match", format!("\"xyz\", {etag}"))
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 304);

    // A mismatched tag delivers the full response
    let mut session = make_session("GET", "/style.css");
    session
        .req_header_mut()
        .insert_header("If-None-Match", "\"xyz\"")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "body { color: #333; }\n");
}

#[test(tokio::test)]
async fn if_modified_since() {
    let meta = Metadata::from_path(&root_path("file.txt")).unwrap();

    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/file.txt");
    session
        .req_header_mut()
        .insert_header("If-Modified-Since", meta.last_modified.as_ref().unwrap())
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 304);
    assert_eq!(header_value(&session, header::ETAG).unwrap(), meta.etag);
    assert_body(&session, "");

    let mut session = make_session("GET", "/file.txt");
    session
        .req_header_mut()
        .insert_header("If-Modified-Since", "Thu, 01 Jan 1970 00:00:00 GMT")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "Hi!\n");

    // If-None-Match takes precedence over If-Modified-Since
    let mut session = make_session("GET", "/file.txt");
    session
        .req_header_mut()
        .insert_header("If-None-Match", "\"xyz\"")
        .unwrap();
    session
        .req_header_mut()
        .insert_header("If-Modified-Since", meta.last_modified.as_ref().unwrap())
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "Hi!\n");
}

#[test(tokio::test)]
async fn idempotence() {
    let handler = make_handler(default_conf());

    let mut first = make_session("GET", "/app.js");
    assert_eq!(
        handle(&handler, &mut first).await,
        RequestFilterResult::ResponseSent
    );
    let mut second = make_session("GET", "/app.js");
    assert_eq!(
        handle(&handler, &mut second).await,
        RequestFilterResult::ResponseSent
    );

    assert_status(&first, 200);
    assert_status(&second, 200);
    assert_eq!(
        header_value(&first, header::CONTENT_TYPE),
        header_value(&second, header::CONTENT_TYPE)
    );
    assert_eq!(
        header_value(&first, header::CACHE_CONTROL),
        header_value(&second, header::CACHE_CONTROL)
    );
    assert_eq!(first.body(), second.body());
}

#[test(tokio::test)]
async fn cache_policy_table() {
    let handler = make_handler(default_conf());

    let mut session = make_session("GET", "/app.js");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000, immutable"
    );

    let mut session = make_session("GET", "/index.html");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );

    let mut session = make_session("GET", "/app.css.map");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );

    // Unknown extensions inherit the configured default
    let handler = make_handler(extended_conf("default_max_age: 86400"));
    let mut session = make_session("GET", "/pixel.png");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::CACHE_CONTROL).unwrap(),
        "public, max-age=86400"
    );
}

#[test(tokio::test)]
async fn caching_disabled() {
    let handler = make_handler(extended_conf("caching_enabled: false"));

    let mut session = make_session("GET", "/file.txt");
    session
        .req_header_mut()
        .insert_header("If-None-Match", "*")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_body(&session, "Hi!\n");
    assert!(header_value(&session, header::CACHE_CONTROL).is_none());
    assert!(header_value(&session, header::ETAG).is_none());
    assert!(header_value(&session, header::LAST_MODIFIED).is_none());
}

#[test(tokio::test)]
async fn compression_negotiation() {
    let plain = std::fs::read(root_path("app.js")).unwrap();

    let handler = make_handler(extended_conf("compress_gzip: true"));
    let mut session = make_session("GET", "/app.js");
    session
        .req_header_mut()
        .insert_header("Accept-Encoding", "gzip")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert_eq!(
        header_value(&session, header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    assert_eq!(
        header_value(&session, header::VARY).unwrap(),
        "Accept-Encoding"
    );
    assert_eq!(
        header_value(&session, header::CONTENT_LENGTH).unwrap(),
        session.body().len().to_string()
    );
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(session.body())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, plain);

    // A client declining compression receives the identity response
    let mut session = make_session("GET", "/app.js");
    session
        .req_header_mut()
        .insert_header("Accept-Encoding", "identity")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_status(&session, 200);
    assert!(header_value(&session, header::CONTENT_ENCODING).is_none());
    assert!(header_value(&session, header::VARY).is_none());
    assert_eq!(session.body(), &plain[..]);

    // No negotiation when the algorithm is disabled
    let handler = make_handler(default_conf());
    let mut session = make_session("GET", "/app.js");
    session
        .req_header_mut()
        .insert_header("Accept-Encoding", "gzip")
        .unwrap();
    handle(&handler, &mut session).await;
    assert!(header_value(&session, header::CONTENT_ENCODING).is_none());
    assert_eq!(session.body(), &plain[..]);

    // Binary assets are not eligible
    let handler = make_handler(extended_conf("compress_gzip: true"));
    let mut session = make_session("GET", "/pixel.png");
    session
        .req_header_mut()
        .insert_header("Accept-Encoding", "gzip")
        .unwrap();
    handle(&handler, &mut session).await;
    assert!(header_value(&session, header::CONTENT_ENCODING).is_none());
    assert!(header_value(&session, header::VARY).is_none());
}

#[test(tokio::test)]
async fn brotli_preference() {
    let plain = std::fs::read(root_path("app.js")).unwrap();

    let handler = make_handler(extended_conf(
        "compress_gzip: true\ncompress_brotli: true",
    ));
    let mut session = make_session("GET", "/app.js");
    session
        .req_header_mut()
        .insert_header("Accept-Encoding", "gzip;q=0.8, br")
        .unwrap();
    assert_eq!(
        handle(&handler, &mut session).await,
        RequestFilterResult::ResponseSent
    );
    assert_eq!(
        header_value(&session, header::CONTENT_ENCODING).unwrap(),
        "br"
    );
    let mut decoded = Vec::new();
    brotli::Decompressor::new(session.body(), 4096)
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, plain);
}

#[test(tokio::test)]
async fn security_headers() {
    let handler = make_handler(default_conf());

    let mut session = make_session("GET", "/image.svg");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert!(header_value(&session, header::CONTENT_SECURITY_POLICY).is_some());
    assert!(header_value(&session, header::X_FRAME_OPTIONS).is_none());

    let mut session = make_session("GET", "/index.html");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::X_FRAME_OPTIONS).unwrap(),
        "DENY"
    );

    let mut session = make_session("GET", "/pixel.png");
    handle(&handler, &mut session).await;
    assert_eq!(
        header_value(&session, header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert!(header_value(&session, header::X_FRAME_OPTIONS).is_none());
    assert!(header_value(&session, header::CONTENT_SECURITY_POLICY).is_none());
}

#[test(tokio::test)]
async fn analytics_accounting() {
    let file_size = std::fs::metadata(root_path("file.txt")).unwrap().len();
    let script_size = std::fs::metadata(root_path("app.js")).unwrap().len();

    let handler = make_handler(default_conf());
    let analytics = handler.analytics();

    for _ in 0..2 {
        let mut session = make_session("GET", "/file.txt");
        handle(&handler, &mut session).await;
    }
    let mut session = make_session("GET", "/app.js");
    handle(&handler, &mut session).await;

    assert_eq!(analytics.total_requests(), 3);
    assert_eq!(analytics.total_bytes(), 2 * file_size + script_size);
    assert_eq!(analytics.cache_hits(), 0);

    let top = analytics.top_requested(1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].0, root_path("file.txt").canonicalize().unwrap());
    assert_eq!(top[0].1.requests, 2);
    assert_eq!(top[0].1.bytes_served, 2 * file_size);

    // Not-modified responses are tracked separately, not against bandwidth
    let mut session = make_session("GET", "/file.txt");
    session
        .req_header_mut()
        .insert_header("If-None-Match", "*")
        .unwrap();
    handle(&handler, &mut session).await;
    assert_status(&session, 304);
    assert_eq!(analytics.total_requests(), 3);
    assert_eq!(analytics.total_bytes(), 2 * file_size + script_size);
    assert_eq!(analytics.cache_hits(), 1);

    // HEAD requests count as deliveries of zero bytes
    let mut session = make_session("HEAD", "/file.txt");
    handle(&handler, &mut session).await;
    assert_eq!(analytics.total_requests(), 4);
    assert_eq!(analytics.total_bytes(), 2 * file_size + script_size);

    analytics.reset();
    assert_eq!(analytics.total_requests(), 0);
    assert_eq!(analytics.total_bytes(), 0);
    assert_eq!(analytics.cache_hits(), 0);
}

#[test(tokio::test)]
async fn bad_configuration() {
    let conf = StaticAssetsConf::default();
    let err = StaticAssetsHandler::new(conf).unwrap_err();
    assert_eq!(err.etype, ErrorType::InternalError);

    let conf = StaticAssetsConf::from_yaml("root: /definitely/not/there").unwrap();
    let err = StaticAssetsHandler::new(conf).unwrap_err();
    assert_eq!(err.etype, ErrorType::InternalError);
}

#[test]
fn cli_overrides() {
    use clap::Parser;

    use crate::configuration::StaticAssetsOpt;

    let mut conf = StaticAssetsConf::from_yaml(default_conf()).unwrap();
    let opt = StaticAssetsOpt::parse_from([
        "static-assets",
        "--max-file-size",
        "1234",
        "--compress-gzip",
        "true",
    ]);
    conf.merge_with_opt(opt);

    assert_eq!(conf.max_file_size, 1234);
    assert!(conf.compress_gzip);
    // Settings without a command line override keep their configured values
    assert_eq!(conf.root, Some(root_path("")));
    assert_eq!(conf.default_max_age, 3600);
}
