//! Reconstruction of an HTTP request from a proxy event.
//!
//! Building is lenient: absent or unrepresentable parts of the event degrade
//! the request (empty host, skipped header) instead of failing.
//! The single hard failure is a body flagged as base64 that does not decode,
//! since there is no safe guess for its bytes.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::body::Body;
use crate::config::RequestConfig;
use crate::context::InvocationContext;
use crate::event::ProxyEvent;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestUrl {
    pub scheme: String,
    pub host: String,
    pub path: String,
    /// Percent-encoded form of `path`.
    pub raw_path: String,
    /// Encoded query without the leading `?`.
    pub raw_query: String,
}

impl RequestUrl {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.raw_query.as_bytes())
            .into_owned()
            .collect()
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if !self.scheme.is_empty() || !self.host.is_empty() {
            write!(f, "//{}", self.host)?;
        }
        f.write_str(&self.path)?;
        if !self.raw_query.is_empty() {
            write!(f, "?{}", self.raw_query)?;
        }
        Ok(())
    }
}

/// Request handed to the wrapped handler.
///
/// Everything but the body's read position is fixed once built.
///
/// Headers hold one entry per event header, except entries `http` cannot
/// represent (a name with spaces, a value with control characters), which
/// are dropped with a warning. Handlers must not assume every event header
/// is present.
#[derive(Debug)]
pub struct Request {
    method: String,
    url: RequestUrl,
    headers: HeaderMap,
    body: Body,
    content_length: u64,
    remote_addr: String,
    version: Version,
    context: InvocationContext,
}

impl Request {
    /// Method as sent by the client; an empty one reads as `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Typed method, `None` when the client sent something that is not a
    /// valid method token.
    pub fn http_method(&self) -> Option<Method> {
        Method::from_bytes(self.method.as_bytes()).ok()
    }

    pub fn url(&self) -> &RequestUrl {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.url.host
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name`, if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// A new unread stream over the body, independent of [`body_mut`](Self::body_mut).
    pub fn get_body(&self) -> Body {
        self.body.replay()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs()
    }

    /// Credentials from an `Authorization: Basic ...` header.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        let auth = self.header("authorization")?;
        const PREFIX: &str = "Basic ";
        if auth.len() < PREFIX.len() || !auth[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
            return None;
        }

        let decoded = BASE64.decode(&auth[PREFIX.len()..]).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }
}

/// Turns proxy events into [`Request`]s.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RequestConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, event: &ProxyEvent, ctx: &InvocationContext) -> Result<Request> {
        let host = lookup_header(&event.headers, &self.config.host_header).unwrap_or_default();
        let scheme = lookup_header(&event.headers, &self.config.scheme_header).unwrap_or_default();
        if host.is_empty() {
            debug!("Proxy event has no {} header", self.config.host_header);
        }
        if scheme.is_empty() {
            debug!("Proxy event has no {} header", self.config.scheme_header);
        }

        let url = RequestUrl {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: event.path.clone(),
            raw_path: escape_path(&event.path),
            raw_query: encode_query(&event.query_string_parameters),
        };

        let mut headers = HeaderMap::with_capacity(event.headers.len());
        for (name, value) in &event.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping unrepresentable header: {:?}", name),
            }
        }

        let body = if event.is_base64_encoded {
            decode_body(&event.body)?
        } else {
            event.body.clone().into_bytes()
        };
        let content_length = body.len() as u64;
        let body = if body.is_empty() {
            Body::empty()
        } else {
            Body::from(body)
        };

        Ok(Request {
            method: parse_method(&event.http_method),
            url,
            headers,
            body,
            content_length,
            remote_addr: event.source_ip().to_string(),
            version: Version::HTTP_11,
            context: ctx.clone(),
        })
    }
}

/// Builds a request with the default header names.
pub fn build_request(event: &ProxyEvent, ctx: &InvocationContext) -> Result<Request> {
    RequestBuilder::new().build(event, ctx)
}

fn lookup_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

fn parse_method(method: &str) -> String {
    if method.is_empty() {
        return Method::GET.to_string();
    }
    if Method::from_bytes(method.as_bytes()).is_err() {
        warn!("Invalid HTTP method token {:?}, passing it through", method);
    }
    method.to_string()
}

/// Standard alphabet with required padding, tolerant of non-zero trailing
/// bits in the last symbol.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decodes a base64 event body, skipping line breaks of wrapped encoders.
fn decode_body(body: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    if body.contains(['\r', '\n']) {
        let unwrapped: Vec<u8> = body
            .bytes()
            .filter(|b| !matches!(b, b'\r' | b'\n'))
            .collect();
        BASE64.decode(unwrapped)
    } else {
        BASE64.decode(body)
    }
}

/// Escapes `path` as a single path segment, so `/` becomes `%2F`.
///
/// The event path is already decoded; escaping it again turns a literal
/// `%` into `%25`.
pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT).to_string()
}

/// Bytes escaped inside a single path segment: everything but unreserved
/// characters and the sub-delimiters a segment may carry.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Form-encodes the query parameters in map iteration order, which is not
/// stable across runs.
pub fn encode_query(params: &HashMap<String, String>) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Read;

    fn event() -> ProxyEvent {
        ProxyEvent::new("GET", "/pets/tobi")
            .with_header("Host", "apex-ping.com")
            .with_header("X-Forwarded-Proto", "https")
            .with_header("User-Agent", "curl/7.48.0")
            .with_source_ip("207.102.57.26")
    }

    fn read_all(body: &mut Body) -> String {
        let mut out = String::new();
        body.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_get_request() {
        let event = event().with_query("format", "json");
        let req = build_request(&event, &InvocationContext::background()).unwrap();

        assert_eq!(req.method(), "GET");
        assert_eq!(req.host(), "apex-ping.com");
        assert_eq!(req.url().scheme, "https");
        assert_eq!(req.url().path, "/pets/tobi");
        assert_eq!(req.url().raw_query, "format=json");
        assert_eq!(req.remote_addr(), "207.102.57.26");
        assert_eq!(req.version(), Version::HTTP_11);
        assert_eq!(req.content_length(), 0);
        assert!(req.body().is_empty());
        assert_eq!(req.header("user-agent"), Some("curl/7.48.0"));
        assert_eq!(
            req.url().to_string(),
            "https://apex-ping.com/pets/tobi?format=json"
        );
    }

    #[test]
    fn test_missing_host_and_scheme_degrade() {
        let event = ProxyEvent::new("GET", "/");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.host(), "");
        assert_eq!(req.url().scheme, "");
        assert_eq!(req.url().raw_query, "");
        assert_eq!(req.remote_addr(), "");
        assert_eq!(req.url().to_string(), "/");
    }

    #[test]
    fn test_host_lookup_falls_back_to_case_insensitive() {
        let event = ProxyEvent::new("GET", "/")
            .with_header("host", "lower.example")
            .with_header("x-forwarded-proto", "http");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.host(), "lower.example");
        assert_eq!(req.url().scheme, "http");
    }

    #[test]
    fn test_configured_host_header() {
        let builder = RequestBuilder::with_config(RequestConfig {
            host_header: "X-Original-Host".to_string(),
            ..RequestConfig::default()
        });
        let event = event().with_header("X-Original-Host", "origin.example");
        let req = builder.build(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.host(), "origin.example");
    }

    #[test]
    fn test_plain_body() {
        let event = ProxyEvent::new("POST", "/pets/tobi").with_body("{ \"name\": \"Tobi\" }", false);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();

        assert_eq!(req.method(), "POST");
        assert_eq!(req.content_length(), 18);
        assert_eq!(read_all(req.body_mut()), "{ \"name\": \"Tobi\" }");
        assert_eq!(read_all(&mut req.get_body()), "{ \"name\": \"Tobi\" }");
    }

    #[test]
    fn test_base64_body() {
        let event = ProxyEvent::new("POST", "/pets/tobi").with_body("SGVsbG8gV29ybGQ=", true);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();

        assert_eq!(req.content_length(), 11);
        assert_eq!(read_all(req.body_mut()), "Hello World");
    }

    #[test]
    fn test_base64_binary_body() {
        let event = ProxyEvent::new("PUT", "/blob").with_body("AP+AAQ==", true);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();

        let mut bytes = Vec::new();
        req.body_mut().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x00, 0xff, 0x80, 0x01]);
        assert_eq!(req.content_length(), 4);
    }

    #[test]
    fn test_empty_base64_body() {
        let event = ProxyEvent::new("POST", "/").with_body("", true);
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert!(req.body().is_empty());
        assert_eq!(req.content_length(), 0);
    }

    #[test]
    fn test_invalid_base64_body_fails() {
        let event = ProxyEvent::new("POST", "/").with_body("not*base64", true);
        let err = build_request(&event, &InvocationContext::background()).unwrap_err();
        assert!(err.is_body_decode());
    }

    #[test]
    fn test_basic_auth() {
        let event = event().with_header("Authorization", "Basic dG9iaTpmZXJyZXQ=");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(
            req.basic_auth(),
            Some(("tobi".to_string(), "ferret".to_string()))
        );
    }

    #[test]
    fn test_basic_auth_rejects_other_schemes() {
        let event = event().with_header("Authorization", "Bearer dG9iaTpmZXJyZXQ=");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.basic_auth(), None);

        let req = build_request(&self::event(), &InvocationContext::background()).unwrap();
        assert_eq!(req.basic_auth(), None);
    }

    #[test]
    fn test_unrepresentable_header_is_skipped() {
        let event = event().with_header("Bad Header", "x").with_header("X-Ok", "yes");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert!(req.headers().get("bad header").is_none());
        assert_eq!(req.header("x-ok"), Some("yes"));
    }

    #[test]
    fn test_method_passthrough() {
        assert_eq!(parse_method(""), "GET");
        assert_eq!(parse_method("DELETE"), "DELETE");
        assert_eq!(parse_method("PURGE"), "PURGE");
        assert_eq!(parse_method("BAD METHOD"), "BAD METHOD");
    }

    #[test]
    fn test_invalid_method_is_not_rewritten() {
        let event = ProxyEvent::new("BAD METHOD", "/");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.method(), "BAD METHOD");
        assert_eq!(req.http_method(), None);

        let event = ProxyEvent::new("PATCH", "/");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.http_method(), Some(Method::PATCH));
    }

    #[test]
    fn test_base64_body_with_line_breaks() {
        let event = ProxyEvent::new("POST", "/").with_body("SGVs\r\nbG8=", true);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(read_all(req.body_mut()), "Hello");
        assert_eq!(req.content_length(), 5);

        let event = ProxyEvent::new("POST", "/").with_body("SGVsbG8g\nV29ybGQ=\n", true);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(read_all(req.body_mut()), "Hello World");
    }

    #[test]
    fn test_base64_body_with_trailing_bits() {
        let event = ProxyEvent::new("POST", "/").with_body("SGVsbG9=", true);
        let mut req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(read_all(req.body_mut()), "Hello");
    }

    #[test]
    fn test_base64_body_still_requires_padding() {
        let event = ProxyEvent::new("POST", "/").with_body("SGVsbG8", true);
        let err = build_request(&event, &InvocationContext::background()).unwrap_err();
        assert!(err.is_body_decode());
    }

    #[test]
    fn test_unrepresentable_headers_are_dropped() {
        let event = ProxyEvent::new("GET", "/")
            .with_header("X-Name", "caf\u{e9}")
            .with_header("X-Ctl", "a\x01b")
            .with_header("X Space", "v");
        let req = build_request(&event, &InvocationContext::background()).unwrap();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(
            req.headers().get("x-name").map(|v| v.as_bytes()),
            Some("caf\u{e9}".as_bytes())
        );
    }

    #[test]
    fn test_escape_path_escapes_slashes() {
        assert_eq!(escape_path("/pets/tobi"), "%2Fpets%2Ftobi");
        assert_eq!(escape_path("a b;c,d?e"), "a%20b%3Bc%2Cd%3Fe");
        assert_eq!(escape_path("$&+:=@-_.~"), "$&+:=@-_.~");
        assert_eq!(escape_path("caf\u{e9}"), "caf%C3%A9");
    }

    #[test]
    fn test_escape_path_double_encodes_percent() {
        assert_eq!(escape_path("/a%20b"), "%2Fa%2520b");
    }

    #[test]
    fn test_query_pairs_round_trip() {
        let event = event()
            .with_query("format", "json")
            .with_query("q", "a b&c")
            .with_query("empty", "");
        let req = build_request(&event, &InvocationContext::background()).unwrap();

        let pairs: HashSet<(String, String)> = req.query_pairs().into_iter().collect();
        let expected: HashSet<(String, String)> = event
            .query_string_parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(pairs, expected);
        assert_eq!(req.url().raw_query.matches('&').count(), 2);
    }

    #[test]
    fn test_context_is_attached() {
        let ctx = InvocationContext::new("abc-123");
        let req = build_request(&event(), &ctx).unwrap();
        assert_eq!(req.context().request_id(), "abc-123");
        ctx.cancel();
        assert!(req.context().is_cancelled());
    }
}
