//! Run synchronous HTTP handlers behind API Gateway proxy events.
//!
//! An invocation loop hands one [`ProxyEvent`] at a time to an [`Adapter`],
//! which rebuilds a [`Request`], lets the wrapped [`Handler`] write into a
//! [`ResponseRecorder`], and returns the finalized [`ResponseEvent`].
//!
//! ```rust
//! use lambdahttp::{Adapter, InvocationContext, ProxyEvent, Request, ResponseWriter};
//! use std::io::Write;
//!
//! let adapter = Adapter::new(|w: &mut dyn ResponseWriter, req: &mut Request| {
//!     write!(w, "hello {}", req.url().path).unwrap();
//! });
//! let event = ProxyEvent::new("GET", "/world");
//! let response = adapter.invoke(InvocationContext::background(), &event).unwrap();
//! assert_eq!(response.body, "hello /world");
//! ```

pub mod adapter;
pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod request;
pub mod response;
pub mod sniff;

pub use adapter::{Adapter, Handler};
pub use body::Body;
pub use context::InvocationContext;
pub use error::{BodyDecodeError, Error, Result};
pub use event::{ProxyEvent, ResponseEvent};
pub use request::{build_request, Request, RequestBuilder, RequestUrl};
pub use response::{ResponseRecorder, ResponseWriter};
pub use sniff::detect_content_type;
