use http::{HeaderMap, HeaderValue, Method, header::AUTHORIZATION};

/// One outgoing API call, produced by the gateway and consumed once.
///
/// The path is relative to the configured API base URL. The session client
/// stamps the `Authorization` header in before the request is sent; nothing
/// here performs I/O.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The `Authorization` header value, if one has been attached.
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(AUTHORIZATION)
    }
}

/// Build a `Bearer <token>` header value. Tokens are opaque server-issued
/// strings; one that cannot be represented as a header value is rejected
/// rather than sent mangled.
pub fn bearer_header(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_method_path_and_body() {
        let desc = RequestDescriptor::post("agent/properties/7/inquire")
            .json(serde_json::json!({"message": "hi"}));
        assert_eq!(desc.method, Method::POST);
        assert_eq!(desc.path, "agent/properties/7/inquire");
        assert!(desc.body.is_some());
        assert!(desc.authorization().is_none());
    }

    #[test]
    fn bearer_header_formats_token() {
        let value = bearer_header("tok123").unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer tok123");
    }

    #[test]
    fn bearer_header_rejects_control_characters() {
        assert!(bearer_header("tok\n123").is_none());
    }
}
