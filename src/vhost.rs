//! Virtual host selection and request path resolution.
//!
//! The sanitisation here is deliberately naive: every literal `../` is
//! removed and `%20` becomes a space, nothing else is decoded. Whatever
//! survives the strip (a trailing `..`, for one) is resolved by the join
//! below, which never climbs above the host root. Encoded sequences such
//! as `%2e%2e%2f` are passed through undecoded and end up as literal file
//! names.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::config::{HostConfig, ServerConfig};
use crate::http::request::Request;

/// Host name to document root, with a fallback for everything else.
#[derive(Debug, Clone)]
pub struct VirtualHostTable {
    hosts: HashMap<String, HostConfig>,
    default_host: HostConfig,
}

impl VirtualHostTable {
    pub fn new(hosts: HashMap<String, HostConfig>, default_host: HostConfig) -> Self {
        Self {
            hosts,
            default_host,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.hosts.clone(), config.default_host.clone())
    }

    /// Pick the virtual host for a `Host` header value.
    ///
    /// Any `:port` suffix is ignored. A missing header or an unknown name
    /// selects the default host; this never fails.
    pub fn select(&self, host_header: Option<&str>) -> &HostConfig {
        host_header
            .and_then(|host| host.split(':').next())
            .and_then(|name| self.hosts.get(name))
            .unwrap_or(&self.default_host)
    }

    /// Local file path for `request`. Existence is not checked here.
    pub fn resolve(&self, request: &Request) -> PathBuf {
        let vhost = self.select(request.header("Host"));
        let pathname = request_pathname(&request.path);
        join_under_root(&vhost.root, &sanitize(&pathname))
    }
}

/// The path component of a request target, `/` when there is none.
///
/// Origin-form targets (`/a/b?q`) are split by hand so the path reaches the
/// sanitiser exactly as sent. Absolute-form targets go through the URL parser.
pub fn request_pathname(target: &str) -> String {
    if target.starts_with('/') {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        return target[..end].to_string();
    }

    match url::Url::parse(target) {
        Ok(url) if !url.cannot_be_a_base() && !url.path().is_empty() => url.path().to_string(),
        _ => "/".to_string(),
    }
}

/// Remove every `../` and turn `%20` into a space.
///
/// Stripping repeats until nothing is left to strip, since one pass over
/// `....//` leaves a fresh `../` behind.
pub fn sanitize(pathname: &str) -> String {
    let mut clean = pathname.replace("../", "");
    while clean.contains("../") {
        clean = clean.replace("../", "");
    }
    clean.replace("%20", " ")
}

/// Join `path` onto `root`, resolving `..` against the segments pushed so far.
///
/// A `..` with nothing left to pop is dropped, so the result always lies
/// under `root`. Root and current-dir components are ignored.
pub fn join_under_root(root: &Path, path: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::ParentDir if depth > 0 => {
                joined.pop();
                depth -= 1;
            }
            _ => {}
        }
    }
    joined
}
