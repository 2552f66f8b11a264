use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::files;
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::server::timer::IdleTimer;
use crate::vhost::VirtualHostTable;

/// Everything a request goes through once it has been parsed.
///
/// Custom handlers first; when none claims the request its path is
/// resolved against the virtual host table and the file is streamed.
/// The response is always ended before `respond` returns.
pub struct Pipeline {
    config: Arc<ServerConfig>,
    vhosts: VirtualHostTable,
}

impl Pipeline {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let vhosts = VirtualHostTable::from_config(&config);
        Self { config, vhosts }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn respond(&self, request: &Request, response: &mut ResponseWriter<'_>) {
        let peer = request
            .remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(peer = %peer, method = ?request.method, url = %request.path, "Request received");
        info!(headers = ?request.headers, "Request headers");

        match self.config.handlers.dispatch(request, response).await {
            Ok(true) => {}
            Ok(false) => {
                let path = self.vhosts.resolve(request);
                files::stream(path, request, response).await;
            }
            Err(e) => {
                files::server_error(Path::new(&request.path), &format!("{e:#}"), response).await;
            }
        }

        response.finish().await;
    }

    /// [`respond`](Self::respond), cut short once `timer` expires.
    ///
    /// On expiry the in-flight work is dropped along with any open file,
    /// and the response is abandoned and ended. Returns `false` in that case.
    pub async fn respond_within(
        &self,
        request: &Request,
        response: &mut ResponseWriter<'_>,
        timer: &IdleTimer,
    ) -> bool {
        let timed_out = tokio::select! {
            _ = self.respond(request, response) => false,
            _ = timer.expired() => true,
        };

        if timed_out {
            warn!(peer = ?request.remote_addr, url = %request.path, "Request timed out");
            response.abandon();
            response.finish().await;
        }
        !timed_out
    }
}
