use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::pipeline::Pipeline;
use crate::server::timer::IdleTimer;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    pipeline: Arc<Pipeline>,
    timer: IdleTimer,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Rejecting(ParseError),
    Closed,
}

enum Incoming {
    Request(Request),
    Malformed(ParseError),
    Closed,
}

impl Connection {
    /// Wrap an accepted socket. The idle timer starts running now.
    pub fn new(stream: TcpStream, peer: SocketAddr, pipeline: Arc<Pipeline>) -> Self {
        let timer = IdleTimer::new(pipeline.config().request_timeout());
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(4096),
            state: ConnectionState::Reading,
            pipeline,
            timer,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    let timer = self.timer.clone();
                    let peer = self.peer;
                    let incoming = tokio::select! {
                        incoming = self.read_request() => incoming?,
                        _ = timer.expired() => {
                            warn!(peer = %peer, "Idle connection timed out");
                            Incoming::Closed
                        }
                    };

                    self.state = match incoming {
                        Incoming::Request(request) => ConnectionState::Processing(request),
                        Incoming::Malformed(e) => ConnectionState::Rejecting(e),
                        Incoming::Closed => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(request) => {
                    if self.process(&request).await {
                        self.state = ConnectionState::Reading;
                    }
                }

                ConnectionState::Rejecting(e) => {
                    debug!(peer = %self.peer, error = ?e, "Malformed request");
                    let mut writer = ResponseWriter::new(&mut self.stream);
                    if let Err(e) = writer.send(Response::bad_request()).await {
                        debug!(error = %e, "Failed to send 400");
                    }
                    writer.finish().await;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one request through the pipeline. Returns whether the
    /// connection may carry another request.
    async fn process(&mut self, request: &Request) -> bool {
        let timer = self.timer.clone();
        let mut writer = ResponseWriter::new(&mut self.stream)
            .head_only(request.is_head())
            .with_timer(timer.clone());

        if !self.pipeline.respond_within(request, &mut writer, &timer).await {
            return false;
        }

        request.keep_alive() && writer.is_reusable()
    }

    async fn read_request(&mut self) -> anyhow::Result<Incoming> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((mut request, consumed)) => {
                    self.buffer.advance(consumed);
                    request.remote_addr = Some(self.peer);
                    return Ok(Incoming::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => return Ok(Incoming::Malformed(e)),
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                return Ok(Incoming::Closed);
            }

            self.timer.touch();
        }
    }
}
