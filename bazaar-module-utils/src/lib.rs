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

//! # Module helpers
//!
//! This crate contains the glue shared by all Bazaar Web Server modules: the
//! session abstraction connecting modules to the surrounding server, the
//! request filter trait, configuration loading and standard responses.

mod error;
mod session;
pub mod standard_response;

use async_trait::async_trait;
use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub use error::{Error, ErrorType};
pub use session::{RequestHeader, ResponseHeader, SessionWrapper, TestSession};

/// Request filter result indicating how the current request should be processed further
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestFilterResult {
    /// Response has been sent, no further processing should happen.
    ResponseSent,

    /// Request has been handled and further request filters should not run.
    /// Response hasn’t been sent however, the server should deal with that.
    Handled,

    /// Request filter could not handle this request, next request filter
    /// should run if it exists.
    #[default]
    Unhandled,
}

/// Trait to be implemented by request filters.
#[async_trait]
pub trait RequestFilter {
    /// Configuration type of this handler.
    type Conf;

    /// Per-request state of this handler.
    type CTX;

    /// Creates a new state object for the current request.
    fn new_ctx() -> Self::CTX;

    /// Creates a new instance of the handler from its configuration.
    fn new(conf: Self::Conf) -> Result<Self, Box<Error>>
    where
        Self: Sized,
        Self::Conf: TryInto<Self, Error = Box<Error>>,
    {
        conf.try_into()
    }

    /// Handler to run during the server’s `request_filter` phase. This uses a
    /// different return type than `handle` to account for the existence of
    /// multiple request filters.
    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut Self::CTX,
    ) -> Result<RequestFilterResult, Box<Error>>;

    /// Handles the current request.
    ///
    /// This is essentially identical to the `request_filter` method but is
    /// supposed to be called when there is only a single handler.
    /// Consequently, its result can be returned directly.
    async fn handle(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut Self::CTX,
    ) -> Result<bool, Box<Error>>
    where
        Self::CTX: Send,
    {
        let result = self.request_filter(session, ctx).await?;
        Ok(result == RequestFilterResult::ResponseSent)
    }
}

/// Trait for configuration structures that can be loaded from YAML data. This
/// trait has a blanket implementation for any structure implementing
/// [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML string.
    fn from_yaml<S>(yaml: S) -> Result<Self, Box<Error>>
    where
        S: AsRef<str>,
        Self: Sized;

    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Box<Error>>
    where
        P: AsRef<Path>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug,
{
    fn from_yaml<S: AsRef<str>>(yaml: S) -> Result<Self, Box<Error>> {
        let conf = serde_yaml::from_str(yaml.as_ref()).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                "failed parsing configuration data",
                err,
            )
        })?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }

    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<Error>> {
        let file = File::open(path.as_ref()).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                "failed opening configuration file",
                err,
            )
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                "failed reading configuration file",
                err,
            )
        })?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }
}

/// This macro merges multiple structures implementing `clap::Parser` into a
/// structure containing all of them while making certain that all command
/// line flags can be used.
///
/// ```rust
/// use bazaar_module_utils::merge_opt;
/// use clap::Parser;
///
/// #[derive(Debug, Parser)]
/// struct AppOpt {
///     /// IP address and port for the server to listen on
///     #[clap(long, default_value = "127.0.0.1:8080")]
///     listen: String,
/// }
///
/// merge_opt! {
///     /// Starts the server.
///     struct Opt {
///         app: AppOpt,
///     }
/// }
///
/// let opt = Opt::parse_from(["server"]);
/// assert_eq!(opt.app.listen, "127.0.0.1:8080");
/// ```
#[macro_export]
macro_rules! merge_opt {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::clap::Parser)]
        $struct_vis struct $struct_name {
            $(
                #[clap(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}

/// This macro merges multiple structures implementing [`serde::Deserialize`]
/// and [`Default`] into a structure containing all of them.
///
/// The structure of the expected configuration file is flattened, so that the
/// configuration settings from each component are still expected to be found
/// on the top level.
///
/// ```rust
/// use bazaar_module_utils::{merge_conf, FromYaml};
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct AppConf {
///     listen: String,
/// }
///
/// merge_conf! {
///     struct Conf {
///         app: AppConf,
///     }
/// }
///
/// let conf = Conf::from_yaml("listen: 127.0.0.1:8080").unwrap();
/// assert_eq!(conf.app.listen, "127.0.0.1:8080");
/// ```
#[macro_export]
macro_rules! merge_conf {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::std::default::Default, ::serde::Deserialize)]
        #[serde(default)]
        $struct_vis struct $struct_name {
            $(
                #[serde(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}
