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

//! Writing files to the session response

use bytes::BytesMut;
use log::{debug, error};
use std::cmp::min;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use bazaar_module_utils::{Error, ErrorType, SessionWrapper};

const BUFFER_SIZE: usize = 64 * 1024;

/// Streams an opened file as the session’s response body in chunks and
/// returns the number of body bytes written. The response header has to be
/// written before this is called; if the request is canceled mid-read the
/// file handle is released with the dropped future.
pub(crate) async fn file_response(
    session: &mut impl SessionWrapper,
    mut file: File,
    size: u64,
) -> Result<u64, Box<Error>> {
    let mut remaining = usize::try_from(size).map_err(|err| {
        Error::because(ErrorType::InternalError, "file size exceeds addressable memory", err)
    })?;

    let mut written = 0u64;
    while remaining > 0 {
        let mut buf = BytesMut::zeroed(min(remaining, BUFFER_SIZE));
        let len = file.read(buf.as_mut()).await.map_err(|err| {
            debug!("failed reading file data: {err}");
            error!("failed reading asset data");
            Error::new(ErrorType::ReadError)
        })?;

        if len == 0 {
            error!("file ended with {remaining} bytes left to be written");
            return Err(Error::new(ErrorType::ReadError));
        }

        buf.truncate(len);
        session.write_response_body(buf.into()).await?;
        written += len as u64;
        remaining -= len;
    }

    Ok(written)
}
