use anyhow::Context;
use std::fmt;
use std::sync::Arc;

use crate::handler::{Handler, HandlerContext};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Gate deciding whether a handler sees a request at all.
pub type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

#[derive(Clone)]
struct Registration {
    name: String,
    test: Option<Predicate>,
    handler: Arc<dyn Handler>,
}

/// Ordered list of custom handlers.
///
/// Read-only once the server is running; clones share the handlers.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Registration>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|r| &r.name))
            .finish()
    }
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler that is tried for every request.
    pub fn handler(mut self, name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.push(Registration {
            name: name.into(),
            test: None,
            handler: Arc::new(handler),
        });
        self
    }

    /// Append a handler that only runs when `test` accepts the request.
    ///
    /// A passing test already claims the request, whatever `handle` returns.
    pub fn gated<F>(
        mut self,
        name: impl Into<String>,
        test: F,
        handler: impl Handler + 'static,
    ) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.handlers.push(Registration {
            name: name.into(),
            test: Some(Arc::new(test)),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|r| r.name.as_str())
    }

    /// Offer `request` to each handler in order.
    ///
    /// Returns `Ok(true)` as soon as one claims it, `Ok(false)` when the
    /// chain runs out. A handler claims a request by returning `true` from
    /// `handle`, or by having a test that returned `true`, even if `handle`
    /// then returns `false`.
    pub async fn dispatch(
        &self,
        request: &Request,
        response: &mut ResponseWriter<'_>,
    ) -> anyhow::Result<bool> {
        let ctx = HandlerContext::new(request);

        for registration in &self.handlers {
            let tested = match &registration.test {
                Some(test) if !test(request) => continue,
                Some(_) => true,
                None => false,
            };

            let handled = registration
                .handler
                .handle(request, response, &ctx)
                .await
                .with_context(|| format!("handler `{}` failed", registration.name))?;

            if handled || tested {
                tracing::debug!(handler = %registration.name, url = %request.path, "request claimed by handler");
                return Ok(true);
            }
        }

        Ok(false)
    }
}
