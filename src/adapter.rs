//! The event-to-response transform an invocation loop drives.
//!
//! # Data Flow
//! ```text
//! ProxyEvent
//!     → RequestBuilder (headers, URL, decoded body, context)
//!     → Handler::serve_http(recorder, request)
//!     → ResponseRecorder::finalize
//!     → ResponseEvent
//! ```
//!
//! Each call builds its own request and recorder; nothing survives between
//! invocations, so one `Adapter` can be shared freely.

use tracing::{debug, info_span};

use crate::config::Config;
use crate::context::InvocationContext;
use crate::event::{ProxyEvent, ResponseEvent};
use crate::request::{Request, RequestBuilder};
use crate::response::{ResponseRecorder, ResponseWriter};
use crate::Result;

/// A synchronous HTTP handler: reads the request, writes the response.
pub trait Handler: Send + Sync {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &mut Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &mut Request) + Send + Sync,
{
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &mut Request) {
        self(w, req)
    }
}

pub struct Adapter<H> {
    handler: H,
    config: Config,
    builder: RequestBuilder,
}

impl<H: Handler> Adapter<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, Config::default())
    }

    pub fn with_config(handler: H, config: Config) -> Self {
        let builder = RequestBuilder::with_config(config.request.clone());
        Self {
            handler,
            config,
            builder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one invocation. Only an undecodable body fails; the handler's
    /// own failures are whatever status it wrote.
    pub fn invoke(&self, ctx: InvocationContext, event: &ProxyEvent) -> Result<ResponseEvent> {
        let span = info_span!(
            "invoke",
            request_id = %ctx.request_id(),
            method = %event.http_method,
            path = %event.path,
        );
        let _enter = span.enter();

        let mut request = self.builder.build(event, &ctx)?;
        let mut recorder = ResponseRecorder::with_config(self.config.response.clone());

        self.handler.serve_http(&mut recorder, &mut request);

        let response = recorder.finalize();
        debug!(
            "Handler responded {} with {} body bytes",
            response.status_code,
            response.body.len()
        );
        Ok(response)
    }

    /// JSON in, JSON out: the seam for an external invocation loop.
    pub fn invoke_json(&self, ctx: InvocationContext, event: &str) -> Result<String> {
        let event: ProxyEvent = serde_json::from_str(event)?;
        let response = self.invoke(ctx, &event)?;
        Ok(serde_json::to_string(&response)?)
    }
}
