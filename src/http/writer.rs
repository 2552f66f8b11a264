use std::fs::File;
use std::io;

use crate::http::response::{Response, StatusCode};
use crate::http::transport::Transport;
use crate::server::timer::IdleTimer;

const HTTP_VERSION: &str = "HTTP/1.1";

fn serialize_head(status: StatusCode, headers: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Nothing sent yet
    Pending,
    HeadersSent,
    Finished,
}

/// Write side of a single request/response exchange.
///
/// The head goes out first and exactly once; body bytes follow either as
/// buffered writes or as zero-copy file chunks. [`finish`](Self::finish)
/// ends the response and is safe to call from every exit path: only the
/// first call has an effect.
pub struct ResponseWriter<'a> {
    transport: &'a mut dyn Transport,
    timer: Option<IdleTimer>,
    head_only: bool,
    state: WriterState,
    status: Option<StatusCode>,
    content_length: Option<u64>,
    body_sent: u64,
    /// Cleared when a write failed or a transfer was abandoned midway
    clean: bool,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(transport: &'a mut dyn Transport) -> Self {
        Self {
            transport,
            timer: None,
            head_only: false,
            state: WriterState::Pending,
            status: None,
            content_length: None,
            body_sent: 0,
            clean: true,
        }
    }

    /// Suppress the body, as required for `HEAD` requests.
    pub fn head_only(mut self, head_only: bool) -> Self {
        self.head_only = head_only;
        self
    }

    /// Report write progress to the connection's idle timer.
    pub fn with_timer(mut self, timer: IdleTimer) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn headers_sent(&self) -> bool {
        self.state != WriterState::Pending
    }

    pub fn is_finished(&self) -> bool {
        self.state == WriterState::Finished
    }

    /// Body bytes delivered to the transport so far.
    pub fn body_sent(&self) -> u64 {
        self.body_sent
    }

    /// Whether body bytes should actually be transmitted.
    pub fn wants_body(&self) -> bool {
        !self.head_only && self.status.is_none_or(|s| s.allows_body())
    }

    fn touch(&self) {
        if let Some(timer) = &self.timer {
            timer.touch();
        }
    }

    /// Send the status line and headers.
    pub async fn write_head(
        &mut self,
        status: StatusCode,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<()> {
        if self.state != WriterState::Pending {
            anyhow::bail!("response head already sent");
        }

        self.content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .and_then(|(_, v)| v.trim().parse().ok());

        let head = serialize_head(status, headers);
        self.status = Some(status);
        self.state = WriterState::HeadersSent;

        if let Err(e) = self.transport.write_all(&head).await {
            self.clean = false;
            return Err(e.into());
        }
        self.touch();
        Ok(())
    }

    pub async fn flush(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.transport.flush().await {
            self.clean = false;
            return Err(e.into());
        }
        Ok(())
    }

    /// Write a piece of the body. Sends a bare `200` head first if none
    /// was written yet.
    pub async fn write_body(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        if self.state == WriterState::Pending {
            self.write_head(StatusCode::Ok, &[]).await?;
        }
        if self.state == WriterState::Finished {
            anyhow::bail!("write after response finished");
        }
        if !self.wants_body() || chunk.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.transport.write_all(chunk).await {
            self.clean = false;
            return Err(e.into());
        }
        self.body_sent += chunk.len() as u64;
        self.touch();
        Ok(())
    }

    /// Write a complete buffered response.
    pub async fn send(&mut self, response: Response) -> anyhow::Result<()> {
        let headers: Vec<(&str, &str)> = response
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.write_head(response.status, &headers).await?;
        self.write_body(&response.body).await
    }

    /// One zero-copy transfer attempt of `len` bytes of `file` at `offset`.
    pub async fn send_file_chunk(
        &mut self,
        file: &File,
        offset: u64,
        len: usize,
    ) -> io::Result<usize> {
        let written = self.transport.send_file(file, offset, len).await?;
        if written > 0 {
            self.body_sent += written as u64;
            self.touch();
        }
        Ok(written)
    }

    /// Mark the response as incomplete; the connection must not be reused.
    /// An abandoned response that never sent its head is ended silently.
    pub fn abandon(&mut self) {
        self.clean = false;
    }

    /// End the response. Returns `false` when it had already been ended.
    pub async fn finish(&mut self) -> bool {
        if self.state == WriterState::Finished {
            return false;
        }

        if self.state == WriterState::Pending && self.clean {
            // Nobody produced a response; end it as an empty 200
            if self
                .write_head(StatusCode::Ok, &[("Content-Length", "0")])
                .await
                .is_err()
            {
                tracing::debug!("Failed to write empty response head");
            }
        }

        if let Err(e) = self.transport.flush().await {
            self.clean = false;
            tracing::debug!(error = %e, "Flush failed while finishing response");
        }

        self.state = WriterState::Finished;
        tracing::debug!(status = ?self.status.map(|s| s.as_u16()), "finished response");
        true
    }

    /// Whether the connection can carry another request after this response.
    ///
    /// Requires a finished, error-free response whose body length the client
    /// could determine from the head.
    pub fn is_reusable(&self) -> bool {
        if self.state != WriterState::Finished || !self.clean {
            return false;
        }
        if !self.wants_body() {
            return true;
        }
        self.content_length == Some(self.body_sent)
    }
}
