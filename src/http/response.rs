use bytes::Bytes;
use std::collections::HashMap;

/// An outbound response. Header names are stored lower-cased so that a
/// handler setting `Content-Type` and an inspector reading `content-type`
/// see the same entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    // Chainable status setter
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    pub fn body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn header<K: AsRef<str>, V: AsRef<str>>(&mut self, name: K, value: V) -> &mut Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.as_ref().to_string());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn text<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(content.as_ref().to_string());
        response
    }

    pub fn html<T: AsRef<str>>(content: T) -> Response {
        let mut response = Response::new(200);
        response
            .header("Content-Type", "text/html; charset=utf-8")
            .body(content.as_ref().to_string());
        response
    }

    pub fn not_modified() -> Response {
        Response::new(304)
    }

    /// Last-resort 500 used when no server-error handler could produce a
    /// response.
    pub fn internal_error() -> Response {
        let mut response = Response::new(500);
        response
            .header("Content-Type", "text/plain; charset=utf-8")
            .body("Internal Server Error");
        response
    }

    /// Whether the status forbids a message body on the wire.
    pub fn is_bodiless(&self) -> bool {
        matches!(self.status, 100..=199 | 204 | 304)
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut response = Response::new(200);
        response.header("Content-Type", "text/css");
        response.header("content-type", "text/html");
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.get_header("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn bodiless_statuses() {
        assert!(Response::not_modified().is_bodiless());
        assert!(Response::new(204).is_bodiless());
        assert!(!Response::text("hi").is_bodiless());
        assert_eq!(Response::internal_error().reason_phrase(), "Internal Server Error");
    }
}
