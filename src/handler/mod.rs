//! Custom request handlers.
//!
//! Handlers are registered in code before the server starts and get the
//! first look at every request, in registration order. A handler either
//! claims the request, taking full responsibility for the response, or
//! passes and lets the next one (and eventually the static file fallback)
//! have it.
//!
//! # Example
//!
//! ```ignore
//! struct Health;
//!
//! #[async_trait]
//! impl Handler for Health {
//!     async fn handle(
//!         &self,
//!         _request: &Request,
//!         response: &mut ResponseWriter<'_>,
//!         _ctx: &HandlerContext<'_>,
//!     ) -> anyhow::Result<bool> {
//!         response.send(Response::ok("ok\n")).await?;
//!         Ok(true)
//!     }
//! }
//!
//! let chain = HandlerChain::new()
//!     .gated("health", |req: &Request| req.path == "/health", Health);
//! ```

pub mod chain;

pub use chain::{HandlerChain, Predicate};

use async_trait::async_trait;
use std::path::Path;

use crate::files;
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle `request`. Returning `true` claims it: nothing else runs.
    async fn handle(
        &self,
        request: &Request,
        response: &mut ResponseWriter<'_>,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<bool>;
}

/// What the server lends a handler while it runs.
pub struct HandlerContext<'a> {
    request: &'a Request,
}

impl<'a> HandlerContext<'a> {
    pub fn new(request: &'a Request) -> Self {
        Self { request }
    }

    /// Serve the file at `path` as the response to the current request.
    ///
    /// Goes through the regular file streamer, conditional GET included,
    /// and ends the response.
    pub async fn send_file(&self, path: impl AsRef<Path>, response: &mut ResponseWriter<'_>) {
        files::stream(path.as_ref(), self.request, response).await;
    }
}
