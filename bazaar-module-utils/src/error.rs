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

//! Error type shared by all modules

use std::fmt::{Display, Formatter};

/// Classifies the errors produced by module handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// An error that should be communicated downstream with the given HTTP status code
    HTTPStatus(u16),
    /// Reading data from a file or stream failed
    ReadError,
    /// Writing a response to the session failed
    WriteError,
    /// A configuration file could not be opened
    FileOpenError,
    /// A configuration file could not be read or parsed
    FileReadError,
    /// An HTTP header name or value was rejected
    InvalidHTTPHeader,
    /// Any other unexpected error
    InternalError,
}

impl ErrorType {
    /// Returns a short static description of the error type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::HTTPStatus(_) => "HTTPStatus",
            Self::ReadError => "ReadError",
            Self::WriteError => "WriteError",
            Self::FileOpenError => "FileOpenError",
            Self::FileReadError => "FileReadError",
            Self::InvalidHTTPHeader => "InvalidHTTPHeader",
            Self::InternalError => "InternalError",
        }
    }
}

/// The error type used throughout the server modules.
///
/// Errors are always boxed, allowing them to be passed around cheaply and
/// chained to their underlying cause.
#[derive(Debug)]
pub struct Error {
    /// Classification of this error
    pub etype: ErrorType,
    /// Optional human-readable context
    pub context: Option<String>,
    /// Optional underlying cause
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error of the given type without further context.
    pub fn new(etype: ErrorType) -> Box<Self> {
        Box::new(Self {
            etype,
            context: None,
            cause: None,
        })
    }

    /// Creates a new error of the given type with a human-readable context.
    pub fn explain(etype: ErrorType, context: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            etype,
            context: Some(context.into()),
            cause: None,
        })
    }

    /// Creates a new error of the given type, chained to its underlying cause.
    pub fn because(
        etype: ErrorType,
        context: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Box<Self> {
        Box::new(Self {
            etype,
            context: Some(context.into()),
            cause: Some(cause.into()),
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.etype.as_str())?;
        if let Some(context) = &self.context {
            write!(f, " context: {context}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " cause: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|cause| {
            let cause: &(dyn std::error::Error + 'static) = &**cause;
            cause
        })
    }
}
