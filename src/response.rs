//! Buffered response sink and its conversion into a response event.
//!
//! Nothing is sent while the handler runs: status, headers and body are
//! recorded and only turned into a [`ResponseEvent`] by
//! [`ResponseRecorder::finalize`]. Headers may therefore still change after
//! body bytes were written.

use base64::Engine;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, DATE};
use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use std::io;

use crate::config::ResponseConfig;
use crate::event::ResponseEvent;
use crate::sniff::detect_content_type;

/// `strftime` form of the IMF-fixdate used in HTTP headers.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// What a handler can do to a response.
pub trait ResponseWriter: io::Write {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Records the status; later calls override earlier ones.
    fn write_header(&mut self, status: StatusCode);
}

#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: Option<HeaderMap>,
    body: BytesMut,
    config: ResponseConfig,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ResponseConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn finalize(self) -> ResponseEvent {
        self.finalize_at(Utc::now())
    }

    /// Converts the recording into a response event, stamping `Date` with
    /// `now` when the handler did not set one.
    pub fn finalize_at(self, now: DateTime<Utc>) -> ResponseEvent {
        let recorded = self.headers.unwrap_or_default();
        let mut headers = IndexMap::with_capacity(recorded.keys_len() + 2);

        // multi-value headers keep only their first value
        for name in recorded.keys() {
            if let Some(value) = recorded.get(name) {
                headers.insert(
                    canonical_header_key(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                );
            }
        }

        if self.config.sniff_content_type
            && !recorded.contains_key(CONTENT_TYPE)
            && !self.body.is_empty()
        {
            headers.insert(
                "Content-Type".to_string(),
                detect_content_type(&self.body).to_string(),
            );
        }
        if self.config.stamp_date && !recorded.contains_key(DATE) {
            headers.insert("Date".to_string(), http_date(now));
        }

        let (body, is_base64_encoded) = match String::from_utf8(self.body.to_vec()) {
            Ok(body) => (body, false),
            Err(err) if self.config.base64_binary_bodies => (
                base64::engine::general_purpose::STANDARD.encode(err.as_bytes()),
                true,
            ),
            Err(err) => (String::from_utf8_lossy(err.as_bytes()).into_owned(), false),
        };

        ResponseEvent {
            status_code: self.status.unwrap_or(StatusCode::OK).as_u16(),
            headers,
            body,
            is_base64_encoded,
        }
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.headers.get_or_insert_with(HeaderMap::new)
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl io::Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// `content-type` -> `Content-Type`. Names with characters outside the
/// token set are returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let c = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            c
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
