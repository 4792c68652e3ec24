//! Buffered request: the HTTP head plus the whole body, with query string
//! and url-encoded form already parsed.

use axum::{
    body::Bytes,
    http::{self, HeaderMap, Method, Uri, Version, header},
};

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
}

impl Request {
    pub fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| parse_urlencoded(q.as_bytes()))
            .unwrap_or_default();

        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let form = if is_form {
            parse_urlencoded(&body)
        } else {
            Vec::new()
        };

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            query,
            form,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First query-string value for `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        first(&self.query, name)
    }

    /// First url-encoded body value for `name`.
    pub fn post_form_value(&self, name: &str) -> Option<&str> {
        first(&self.form, name)
    }

    /// Body value for `name`, falling back to the query string.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.post_form_value(name).or_else(|| self.query(name))
    }

    /// Verb requested through the method-simulation `field`, upper-cased.
    ///
    /// The url-encoded body is consulted first, then the query string.
    /// Empty values count as absent.
    pub fn simulated_method(&self, field: &str) -> Option<String> {
        self.form_value(field)
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_uppercase)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    pub fn is_patch(&self) -> bool {
        self.method == Method::PATCH
    }

    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub fn is_options(&self) -> bool {
        self.method == Method::OPTIONS
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str, form: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if form.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        let body = Bytes::from(form.unwrap_or_default().to_owned());
        builder.body(body).unwrap().into()
    }

    #[test]
    fn test_query_and_form_parsing() {
        let req = request(Method::POST, "/posts?page=2&q=a%20b", Some("title=Hello+World"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("q"), Some("a b"));
        assert_eq!(req.post_form_value("title"), Some("Hello World"));
        assert_eq!(req.form_value("page"), Some("2"));
        assert_eq!(req.form_value("missing"), None);
    }

    #[test]
    fn test_form_ignored_without_content_type() {
        let req: Request = http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Bytes::from_static(b"a=1"))
            .unwrap()
            .into();
        assert_eq!(req.post_form_value("a"), None);
    }

    #[test]
    fn test_simulated_method_prefers_body() {
        let req = request(Method::POST, "/users?_method=put", Some("_method=delete"));
        assert_eq!(req.simulated_method("_method").as_deref(), Some("DELETE"));

        let req = request(Method::POST, "/users?_method=patch", None);
        assert_eq!(req.simulated_method("_method").as_deref(), Some("PATCH"));

        let req = request(Method::POST, "/users?_method=", None);
        assert_eq!(req.simulated_method("_method"), None);
    }

    #[test]
    fn test_cookie_lookup() {
        let req: Request = http::Request::builder()
            .uri("/")
            .header(header::COOKIE, "a=1; GOSESSION=abc")
            .body(Bytes::new())
            .unwrap()
            .into();
        assert_eq!(req.cookie("GOSESSION"), Some("abc"));
        assert_eq!(req.cookie("b"), None);
    }

    #[test]
    fn test_verb_predicates() {
        let req: Request = http::Request::builder()
            .method(Method::DELETE)
            .uri("/")
            .header("X-Requested-With", "xmlhttprequest")
            .body(Bytes::new())
            .unwrap()
            .into();
        assert!(req.is_delete());
        assert!(!req.is_get());
        assert!(req.is_ajax());
    }
}
