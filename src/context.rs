//! Per-request matching state.
//!
//! A [`Context`] is built once from the request target. The dispatcher binds
//! path variables into it while descending the trie; handlers and inspectors
//! only read it.

use std::collections::HashMap;

use crate::http::Request;

#[derive(Debug, Clone, Default)]
pub struct Context {
    path: String,
    query: HashMap<String, String>,
    segments: Vec<String>,
    path_variables: HashMap<String, String>,
}

impl Context {
    pub fn new(request: &Request) -> Context {
        let (path, query) = match request.target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.target.as_str(), None),
        };
        // absolute-form targets ("http://host/path") carry the authority inline
        let path = if path.contains("://") {
            url::Url::parse(path)
                .map(|url| url.path().to_owned())
                .unwrap_or_else(|_| path.to_owned())
        } else {
            path.to_owned()
        };
        let query = query
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Context {
            segments: path_segments(&path),
            path,
            query,
            path_variables: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Path split on `/` with the leading empty segment removed.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn path_variable(&self, name: &str) -> Option<&str> {
        self.path_variables.get(name).map(String::as_str)
    }

    pub fn path_variables(&self) -> &HashMap<String, String> {
        &self.path_variables
    }

    pub(crate) fn bind(&mut self, name: &str, value: &str) {
        self.path_variables.insert(name.to_string(), value.to_string());
    }
}

/// Splits a path on `/`, dropping the empty segment produced by a leading
/// slash. `"/"` yields a single empty segment, `"/a/"` yields `["a", ""]`
/// and the empty path yields no segments at all (the trie root).
pub(crate) fn path_segments(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn splits_path_and_query() {
        let req = Request::new(Method::GET, "/search/books?q=rust+lang&page=2");
        let ctx = Context::new(&req);
        assert_eq!(ctx.path(), "/search/books");
        assert_eq!(ctx.segments(), ["search", "books"]);
        assert_eq!(ctx.query_param("q"), Some("rust lang"));
        assert_eq!(ctx.query_param("page"), Some("2"));
        assert!(ctx.path_variables().is_empty());
    }

    #[test]
    fn root_and_trailing_slash_segments() {
        assert_eq!(path_segments("/"), [""]);
        assert_eq!(path_segments("/a/"), ["a", ""]);
        assert_eq!(path_segments("/a//b"), ["a", "", "b"]);
        assert!(path_segments("").is_empty());
    }

    #[test]
    fn absolute_form_target() {
        let req = Request::new(Method::GET, "http://example.com/users/7?x=1");
        let ctx = Context::new(&req);
        assert_eq!(ctx.path(), "/users/7");
        assert_eq!(ctx.segments(), ["users", "7"]);
        assert_eq!(ctx.query_param("x"), Some("1"));

        let ctx = Context::new(&Request::new(Method::GET, "http://example.com"));
        assert_eq!(ctx.path(), "/");
        assert_eq!(ctx.segments(), [""]);
    }

    #[test]
    fn bind_records_variables() {
        let mut ctx = Context::new(&Request::new(Method::GET, "/users/42"));
        ctx.bind("id", "42");
        assert_eq!(ctx.path_variable("id"), Some("42"));
        assert_eq!(ctx.path_variable("name"), None);
    }
}
