//! HTTP/1.1 request parsing and response building.
//!
//! Requests are parsed with [`httparse`]; responses are serialized into a
//! [`BytesMut`] buffer ready to be written to the socket.

use std::collections::HashMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header")]
    InvalidContentLength,
}

/// Request methods the form server distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP/1.1 request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    /// Header names are stored lowercased.
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers accepted per request.
    const MAX_HEADERS: usize = 64;

    /// Parses the request head from `buf`.
    ///
    /// Returns the request with an empty body and the offset at which the body
    /// starts. The caller attaches the body with [`Request::set_body`] once it has
    /// been read in full.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = Method::parse(
            raw_req
                .method
                .ok_or(RequestError::MissingField { field: "method" })?,
        );

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (raw_path.to_string(), None),
        };

        let mut header_map = HashMap::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name.to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok((
            Self {
                method,
                path,
                query,
                headers: header_map,
                body: Bytes::new(),
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the declared body length, or zero if there is no Content-Length header.
    pub fn content_length(&self) -> Result<usize, RequestError> {
        match self.header("content-length") {
            Some(len) => len
                .parse()
                .map_err(|_| RequestError::InvalidContentLength),
            None => Ok(0),
        }
    }

    /// Returns the body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body once all of it has been read from the socket.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Returns a percent-decoded query string parameter.
    pub fn query_param(&self, key: &str) -> Option<String> {
        form_value(self.query.as_deref()?.as_bytes(), key)
    }

    /// Returns a percent-decoded field from an `application/x-www-form-urlencoded` body.
    pub fn form_field(&self, key: &str) -> Option<String> {
        form_value(&self.body, key)
    }

    /// Builds a request from parts. Used by tests that skip the socket.
    pub fn from_parts(method: &str, target: &str, body: impl Into<Bytes>) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method: Method::parse(method),
            path,
            query,
            headers: HashMap::new(),
            body: body.into(),
        }
    }
}

fn form_value(encoded: &[u8], key: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Response status codes used by the form server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    SeeOther,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
}

impl StatusCode {
    /// Returns the numeric status code.
    pub fn as_u16(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::SeeOther => 303,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::PayloadTooLarge => 413,
        }
    }

    /// Returns the canonical reason phrase.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::SeeOther => "See Other",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::PayloadTooLarge => "Payload Too Large",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// Every response is sent with `Connection: close`.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// An HTML page.
    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    /// A JSON document.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status)
            .header("Content-Type", "application/json")
            .body(value.to_string())
    }

    /// A plain text message.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
    }

    /// A `303 See Other` redirect.
    pub fn redirect(location: &str) -> Self {
        Self::new(StatusCode::SeeOther).header("Location", location)
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body bytes.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Looks up a header by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Drops the body while keeping the headers, for HEAD requests.
    pub fn without_body(mut self) -> Self {
        let len = self.body.len();
        self.body.clear();
        self.header("Content-Length", len.to_string())
    }

    /// Serializes the response using HTTP/1.1 wire format.
    pub fn into_bytes(self) -> BytesMut {
        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        let has_length = self
            .headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("content-length"));
        for (name, value) in &self.headers {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        if !has_length {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        buf.put(&b"Connection: close\r\n\r\n"[..]);
        buf.put(self.body.as_slice());

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.header("HOST"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn query_params_are_percent_decoded() {
        let raw = b"GET /?query=SELECT+*+FROM+users%3B HTTP/1.1\r\nHost: x\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/");
        assert_eq!(
            req.query_param("query"),
            Some("SELECT * FROM users;".to_string())
        );
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn form_body_is_decoded() {
        let req = Request::from_parts(
            "POST",
            "/query",
            "query=SELECT+name+FROM+users+WHERE+age+%3E+20",
        );
        assert_eq!(
            req.form_field("query"),
            Some("SELECT name FROM users WHERE age > 20".to_string())
        );
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn content_length() {
        let raw = b"POST /query HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length().unwrap(), 5);
        assert_eq!(&raw[body_offset..], b"hello");
        assert!(req.body().is_empty());
    }

    #[test]
    fn bad_content_length() {
        let raw = b"POST /query HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(matches!(
            req.content_length(),
            Err(RequestError::InvalidContentLength)
        ));
    }

    #[test]
    fn response_wire_format() {
        let bytes = Response::text(StatusCode::NotFound, "nope").into_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nnope"));
    }

    #[test]
    fn head_response_keeps_length() {
        let response = Response::html(StatusCode::Ok, "<p>hi</p>").without_body();
        assert!(response.body_bytes().is_empty());
        assert_eq!(response.header_value("content-length"), Some("9"));
    }
}
