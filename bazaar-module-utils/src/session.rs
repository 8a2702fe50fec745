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

//! Request/response session abstraction decoupling modules from the server

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use std::borrow::Cow;

use crate::error::{Error, ErrorType};

fn header_name(name: impl TryInto<HeaderName>) -> Result<HeaderName, Box<Error>> {
    name.try_into()
        .map_err(|_| Error::explain(ErrorType::InvalidHTTPHeader, "invalid header name"))
}

fn header_value(value: impl TryInto<HeaderValue>) -> Result<HeaderValue, Box<Error>> {
    value
        .try_into()
        .map_err(|_| Error::explain(ErrorType::InvalidHTTPHeader, "invalid header value"))
}

/// The header data of an inbound HTTP request.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    /// The request method
    pub method: Method,
    /// The request URI
    pub uri: Uri,
    /// The request headers
    pub headers: HeaderMap,
}

impl RequestHeader {
    /// Creates a new request header from a method name and a raw URI.
    pub fn build(method: impl AsRef<str>, uri: &[u8]) -> Result<Self, Box<Error>> {
        let method = Method::from_bytes(method.as_ref().as_bytes())
            .map_err(|err| Error::because(ErrorType::InternalError, "invalid method", err))?;
        let uri = Uri::try_from(uri)
            .map_err(|err| Error::because(ErrorType::InternalError, "invalid URI", err))?;
        Ok(Self {
            method,
            uri,
            headers: HeaderMap::new(),
        })
    }

    /// Inserts a header, replacing any previous value under the same name.
    pub fn insert_header(
        &mut self,
        name: impl TryInto<HeaderName>,
        value: impl TryInto<HeaderValue>,
    ) -> Result<(), Box<Error>> {
        self.headers
            .insert(header_name(name)?, header_value(value)?);
        Ok(())
    }
}

/// The header data of an outbound HTTP response.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    /// The response status code
    pub status: StatusCode,
    /// The response headers
    pub headers: HeaderMap,
}

impl ResponseHeader {
    /// Creates a new response header with the given status code. The second
    /// parameter hints at the number of headers to reserve space for.
    pub fn build(status: StatusCode, capacity: Option<usize>) -> Result<Self, Box<Error>> {
        Ok(Self {
            status,
            headers: capacity.map_or_else(HeaderMap::new, HeaderMap::with_capacity),
        })
    }

    /// Appends a header without removing previous values under the same name.
    pub fn append_header(
        &mut self,
        name: impl TryInto<HeaderName>,
        value: impl TryInto<HeaderValue>,
    ) -> Result<(), Box<Error>> {
        self.headers
            .append(header_name(name)?, header_value(value)?);
        Ok(())
    }

    /// Inserts a header, replacing any previous value under the same name.
    pub fn insert_header(
        &mut self,
        name: impl TryInto<HeaderName>,
        value: impl TryInto<HeaderValue>,
    ) -> Result<(), Box<Error>> {
        self.headers
            .insert(header_name(name)?, header_value(value)?);
        Ok(())
    }
}

/// The interface between module handlers and the surrounding server.
///
/// The server implements this trait for its connection type; [`TestSession`]
/// is an in-memory implementation for handler tests.
#[async_trait]
pub trait SessionWrapper: Send {
    /// Returns the request header.
    fn req_header(&self) -> &RequestHeader;

    /// Returns the request header for modification.
    fn req_header_mut(&mut self) -> &mut RequestHeader;

    /// Writes the response header, starting the response.
    async fn write_response_header(&mut self, header: Box<ResponseHeader>)
        -> Result<(), Box<Error>>;

    /// Writes a chunk of the response body. The response header has to be
    /// written first.
    async fn write_response_body(&mut self, data: Bytes) -> Result<(), Box<Error>>;

    /// Returns the response header if one was written already.
    fn response_written(&self) -> Option<&ResponseHeader>;
}

/// In-memory session capturing the response, to be used in handler tests.
#[derive(Debug)]
pub struct TestSession {
    header: RequestHeader,
    response: Option<Box<ResponseHeader>>,
    body: BytesMut,
}

impl TestSession {
    /// Creates a new session for the given request header.
    pub fn new(header: RequestHeader) -> Self {
        Self {
            header,
            response: None,
            body: BytesMut::new(),
        }
    }

    /// Returns the accumulated response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the accumulated response body as a string.
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[async_trait]
impl SessionWrapper for TestSession {
    fn req_header(&self) -> &RequestHeader {
        &self.header
    }

    fn req_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    async fn write_response_header(
        &mut self,
        header: Box<ResponseHeader>,
    ) -> Result<(), Box<Error>> {
        if self.response.is_some() {
            return Err(Error::explain(
                ErrorType::WriteError,
                "response header written twice",
            ));
        }
        self.response = Some(header);
        Ok(())
    }

    async fn write_response_body(&mut self, data: Bytes) -> Result<(), Box<Error>> {
        if self.response.is_none() {
            return Err(Error::explain(
                ErrorType::WriteError,
                "response body written before header",
            ));
        }
        self.body.extend_from_slice(&data);
        Ok(())
    }

    fn response_written(&self) -> Option<&ResponseHeader> {
        self.response.as_deref()
    }
}
