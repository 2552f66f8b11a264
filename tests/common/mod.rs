//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use portico::http::transport::Transport;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;

/// What the next `send_file` call on a [`MockTransport`] does.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Transfer everything requested
    Full,
    /// Transfer at most this many bytes
    Partial(usize),
    /// Fail with `WouldBlock`, nothing transferred
    WouldBlock,
    /// Fail with an error of this kind
    Fail(io::ErrorKind),
}

/// In-memory transport with scripted zero-copy behaviour.
#[derive(Default)]
pub struct MockTransport {
    pub written: Vec<u8>,
    /// `(offset, len)` of every `send_file` call, in order
    pub send_file_calls: Vec<(u64, usize)>,
    script: VecDeque<Step>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    fn copy_from(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = file.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.written.extend_from_slice(&buf[..filled]);
        Ok(filled)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn send_file(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        self.send_file_calls.push((offset, len));
        match self.script.pop_front().unwrap_or(Step::Full) {
            Step::Full => self.copy_from(file, offset, len),
            Step::Partial(n) => self.copy_from(file, offset, len.min(n)),
            Step::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
            Step::Fail(kind) => Err(kind.into()),
        }
    }
}

/// A response as seen by the client.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Split one serialized response into status, headers (lowercased names)
/// and everything after the blank line.
pub fn parse_response(raw: &[u8]) -> RawResponse {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no end of head");
    let head = std::str::from_utf8(&raw[..end]).expect("head is not utf-8");
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body: raw[end + 4..].to_vec(),
    }
}
