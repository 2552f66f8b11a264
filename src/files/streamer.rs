//! The file streamer.
//!
//! `stream` walks one request through stat, the conditional-GET check and
//! the chunked zero-copy transfer, then ends the response. Every path out
//! of here ends the response exactly once; the file descriptor, when one
//! was opened, is released after the response has been ended.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

use crate::files::transfer::FileTransfer;
use crate::http::mime::mime_type;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = concat!("Portico/", env!("CARGO_PKG_VERSION"));

/// How a chunked transfer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEnd {
    /// Every byte announced in Content-Length was sent
    Complete,
    /// The file ran out before Content-Length was reached
    Truncated,
    /// The client went away; already reported by the timeout path
    ConnectionLost,
    /// Any other transfer error, logged and abandoned
    Failed,
}

enum Lookup {
    File(PathBuf, Metadata),
    Missing(PathBuf),
}

/// Serve the file at `path` for `request` and end the response.
pub async fn stream(path: impl Into<PathBuf>, request: &Request, response: &mut ResponseWriter<'_>) {
    let transfer = match locate(path.into()).await {
        Lookup::File(path, metadata) => {
            let modified = metadata.modified().ok();
            let since = request.header("If-Modified-Since");
            if modified.is_some_and(|mtime| is_not_modified(since, mtime, SystemTime::now())) {
                not_modified(&path, response).await;
                None
            } else {
                stream_file(&path, &metadata, request, response).await
            }
        }
        Lookup::Missing(path) => {
            not_found(&path, request, response).await;
            None
        }
    };

    response.finish().await;
    drop(transfer);
}

/// Stat `path`, descending into `index.html` for directories.
async fn locate(mut path: PathBuf) -> Lookup {
    loop {
        match tokio::fs::metadata(&path).await {
            Err(e) => {
                // NotFound is the normal miss; anything else is worth a look
                if e.kind() != io::ErrorKind::NotFound {
                    error!(path = %path.display(), error = %e, "stat failed");
                }
                return Lookup::Missing(path);
            }
            Ok(metadata) if metadata.is_dir() => path.push("index.html"),
            Ok(metadata) if metadata.is_file() => return Lookup::File(path, metadata),
            Ok(_) => return Lookup::Missing(path),
        }
    }
}

/// Conditional-GET check for an `If-Modified-Since` header value.
///
/// True when the header parses and `mtime <= since <= now`, compared in
/// whole seconds since HTTP dates carry no finer precision.
pub fn is_not_modified(since: Option<&str>, mtime: SystemTime, now: SystemTime) -> bool {
    let Some(since) = since.and_then(|v| httpdate::parse_http_date(v).ok()) else {
        return false;
    };

    let secs = |t: SystemTime| {
        t.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    };
    secs(mtime) <= secs(since) && secs(since) <= secs(now)
}

async fn stream_file(
    path: &Path,
    metadata: &Metadata,
    request: &Request,
    response: &mut ResponseWriter<'_>,
) -> Option<FileTransfer> {
    let size = metadata.len();
    let mut transfer = match FileTransfer::open(path, size).await {
        Ok(transfer) => transfer,
        Err(e) => {
            // Lost a race with whoever removed the file since the stat
            debug!(path = %path.display(), error = %e, "open failed");
            not_found(path, request, response).await;
            return None;
        }
    };

    let date = httpdate::fmt_http_date(SystemTime::now());
    let length = size.to_string();
    let content_type = mime_type(path);
    let last_modified = metadata.modified().ok().map(httpdate::fmt_http_date);

    let mut headers = vec![
        ("Server", SERVER_NAME),
        ("Date", date.as_str()),
        ("Content-Length", length.as_str()),
        ("Content-Type", content_type.as_str()),
    ];
    if let Some(last_modified) = &last_modified {
        headers.push(("Last-Modified", last_modified.as_str()));
    }

    let head = match response.write_head(StatusCode::Ok, &headers).await {
        Ok(()) => response.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = head {
        debug!(path = %path.display(), error = %e, "could not send headers");
        response.abandon();
        return Some(transfer);
    }

    if response.wants_body() {
        send_chunks(&mut transfer, response).await;
    }
    Some(transfer)
}

/// Push the rest of `transfer` through the response, one zero-copy call
/// at a time, until it is complete or cannot continue.
///
/// Each call asks for everything that remains; the transport may deliver
/// less, in which case the loop resumes from the new offset.
pub async fn send_chunks(transfer: &mut FileTransfer, response: &mut ResponseWriter<'_>) -> TransferEnd {
    while !transfer.is_complete() {
        let len = usize::try_from(transfer.remaining()).unwrap_or(usize::MAX);
        debug!(
            path = %transfer.path().display(),
            offset = transfer.offset(),
            len,
            "sending chunk"
        );

        match response.send_file_chunk(transfer.file(), transfer.offset(), len).await {
            Ok(0) => {
                warn!(
                    path = %transfer.path().display(),
                    offset = transfer.offset(),
                    expected = transfer.size(),
                    "file shrank during transfer"
                );
                response.abandon();
                return TransferEnd::Truncated;
            }
            Ok(written) => {
                transfer.advance(written);
                debug!(path = %transfer.path().display(), written, "chunk sent");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // Nothing went out; retry the same range
                tokio::task::yield_now().await;
            }
            Err(e) if is_connection_lost(&e) => {
                response.abandon();
                return TransferEnd::ConnectionLost;
            }
            Err(e) => {
                error!(path = %transfer.path().display(), error = %e, "sendfile failed");
                response.abandon();
                return TransferEnd::Failed;
            }
        }
    }

    TransferEnd::Complete
}

fn is_connection_lost(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    ) || e.raw_os_error() == Some(libc::EBADF)
}

fn with_standard_headers(mut response: Response) -> Response {
    response
        .headers
        .insert("Server".to_string(), SERVER_NAME.to_string());
    response.headers.insert(
        "Date".to_string(),
        httpdate::fmt_http_date(SystemTime::now()),
    );
    response
}

async fn send_error_page(path: &Path, page: Response, response: &mut ResponseWriter<'_>) {
    if response.headers_sent() {
        warn!(path = %path.display(), status = page.status.as_u16(), "response already started");
        response.abandon();
        return;
    }
    if let Err(e) = response.send(with_standard_headers(page)).await {
        debug!(path = %path.display(), error = %e, "could not send response");
    }
}

async fn not_modified(path: &Path, response: &mut ResponseWriter<'_>) {
    debug!(path = %path.display(), "304 for resource");
    let page = ResponseBuilder::new(StatusCode::NotModified).build();
    send_error_page(path, page, response).await;
}

async fn not_found(path: &Path, request: &Request, response: &mut ResponseWriter<'_>) {
    debug!(path = %path.display(), url = %request.path, "404");
    send_error_page(path, Response::not_found(&request.path), response).await;
}

/// Answer with a 500 carrying `message`.
///
/// Used when something other than the filesystem failed while serving the
/// request. The response is not ended here.
pub async fn server_error(path: &Path, message: &str, response: &mut ResponseWriter<'_>) {
    error!(path = %path.display(), error = %message, "error serving request");
    send_error_page(path, Response::internal_error(message), response).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn conditional_requires_parsable_date() {
        assert!(!is_not_modified(None, at(10), at(20)));
        assert!(!is_not_modified(Some("yesterday"), at(10), at(20)));
    }

    #[test]
    fn conditional_ignores_sub_second_mtime() {
        let since = httpdate::fmt_http_date(at(1_700_000_000));
        let mtime = at(1_700_000_000) + Duration::from_millis(750);
        assert!(is_not_modified(Some(&since), mtime, at(1_800_000_000)));
    }

    #[test]
    fn conditional_rejects_dates_in_the_future() {
        let since = httpdate::fmt_http_date(at(2_000_000_000));
        assert!(!is_not_modified(Some(&since), at(1_000), at(1_900_000_000)));
    }

    #[test]
    fn conditional_rejects_dates_before_mtime() {
        let since = httpdate::fmt_http_date(at(1_000));
        assert!(!is_not_modified(Some(&since), at(2_000), at(3_000)));
    }
}
