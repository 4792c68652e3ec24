//! Buffered response and the sink it is flushed into.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
};
use tokio::sync::oneshot;

use crate::{AppError, Result};

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_JSONP: &str = "application/javascript; charset=utf-8";
pub const CONTENT_TYPE_XML: &str = "application/xml; charset=utf-8";

/// Response being built by middleware and controllers.
///
/// Nothing reaches the client until the owning context is flushed.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replace any existing value of `name`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a value to `name`, keeping existing ones.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    pub fn set_html_header(&mut self) {
        self.set_content_type(CONTENT_TYPE_HTML);
    }

    pub fn set_json_header(&mut self) {
        self.set_content_type(CONTENT_TYPE_JSON);
    }

    pub fn set_jsonp_header(&mut self) {
        self.set_content_type(CONTENT_TYPE_JSONP);
    }

    pub fn set_xml_header(&mut self) {
        self.set_content_type(CONTENT_TYPE_XML);
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn append_body(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }

    /// Set `status` and use `message`, or the reason phrase, as the body.
    pub fn error(&mut self, status: StatusCode, message: Option<&str>) {
        self.status = status;
        self.body = match message {
            Some(message) => message.to_owned(),
            None => status.canonical_reason().unwrap_or_default().to_owned(),
        };
    }

    pub fn unauthorized(&mut self, message: Option<&str>) {
        self.error(StatusCode::UNAUTHORIZED, message);
    }

    pub fn forbidden(&mut self, message: Option<&str>) {
        self.error(StatusCode::FORBIDDEN, message);
    }

    pub fn method_not_allowed(&mut self, message: Option<&str>) {
        self.error(StatusCode::METHOD_NOT_ALLOWED, message);
    }

    /// Write status and headers, then the body.
    pub(crate) fn write_to(&self, writer: &mut dyn ResponseWriter) {
        writer.write_head(self.status, &self.headers);
        writer.write_body(&self.body);
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AppError::InternalServerError(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| AppError::InternalServerError(format!("invalid header value {value:?}: {e}")))?;
    Ok((name, value))
}

/// Destination of a flushed response.
pub trait ResponseWriter: Send {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap);
    fn write_body(&mut self, body: &str);
}

/// Writer that hands the finished response to an awaiting task.
pub struct OneshotWriter {
    head: Option<(StatusCode, HeaderMap)>,
    tx: Option<oneshot::Sender<axum::response::Response>>,
}

impl OneshotWriter {
    pub fn channel() -> (Self, oneshot::Receiver<axum::response::Response>) {
        let (tx, rx) = oneshot::channel();
        let writer = Self {
            head: None,
            tx: Some(tx),
        };
        (writer, rx)
    }
}

impl ResponseWriter for OneshotWriter {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) {
        self.head = Some((status, headers.clone()));
    }

    fn write_body(&mut self, body: &str) {
        let Some(tx) = self.tx.take() else {
            tracing::warn!("response already written, dropping body");
            return;
        };
        let (status, headers) = self.head.take().unwrap_or((StatusCode::OK, HeaderMap::new()));

        let mut response = axum::response::Response::new(Body::from(body.to_owned()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        // The receiver is gone when the client disconnected.
        let _ = tx.send(response);
    }
}
