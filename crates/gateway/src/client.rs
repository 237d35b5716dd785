use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    http::header,
    reqwest::multipart::Form,
    serde::{Deserialize, de::DeserializeOwned},
    tracing::debug,
};

use {
    propwire_common::{ApiError, RequestDescriptor},
    propwire_config::ApiConfig,
    propwire_session::Session,
};

/// HTTP client for the backend API. Every request is stamped by the
/// session client before it leaves, and every response is translated into
/// the shared taxonomy before it returns — a raw transport error never
/// crosses this boundary.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

/// Laravel-shaped 422 body: `{"message": "...", "errors": {field: [msgs]}}`.
#[derive(Debug, Default, Deserialize)]
struct ValidationBody {
    #[serde(default)]
    errors: HashMap<String, Vec<String>>,
}

/// Generic error body; most non-2xx responses carry a `message`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    pub fn new(cfg: &ApiConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(ApiError::network)?;

        Ok(Self {
            http,
            base_url: cfg.normalized_base_url(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send one descriptor: authorize, send, translate. The returned
    /// response is already known to be 2xx.
    pub(crate) async fn execute(
        &self,
        mut desc: RequestDescriptor,
    ) -> Result<reqwest::Response, ApiError> {
        self.session.authorize(&mut desc);

        let url = format!("{}{}", self.base_url, desc.path);
        debug!(method = %desc.method, path = %desc.path, "api request");

        let mut request = self
            .http
            .request(desc.method.clone(), &url)
            .headers(desc.headers.clone());
        if let Some(body) = &desc.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::network)?;
        self.translate(response).await
    }

    /// Like [`execute`], for the one endpoint that takes multipart form
    /// data instead of JSON. The descriptor still carries method, path and
    /// the authorization stamp.
    ///
    /// [`execute`]: ApiClient::execute
    pub(crate) async fn execute_multipart(
        &self,
        mut desc: RequestDescriptor,
        form: Form,
    ) -> Result<reqwest::Response, ApiError> {
        self.session.authorize(&mut desc);

        let url = format!("{}{}", self.base_url, desc.path);
        debug!(method = %desc.method, path = %desc.path, "api multipart request");

        let response = self
            .http
            .request(desc.method.clone(), &url)
            .headers(desc.headers.clone())
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::network)?;
        self.translate(response).await
    }

    /// Execute and decode a JSON body.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        desc: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.execute(desc).await?;
        let status = response.status().as_u16();
        response.json().await.map_err(|e| {
            debug!(error = %e, "undecodable response body");
            ApiError::RequestFailed {
                status,
                message: "invalid response body".into(),
            }
        })
    }

    /// Execute, discarding any response body.
    pub(crate) async fn fetch_unit(&self, desc: RequestDescriptor) -> Result<(), ApiError> {
        self.execute(desc).await?;
        Ok(())
    }

    /// Map a response onto the taxonomy. 401 routes through the session
    /// client (which clears the token and signals `SessionExpired`); 422
    /// becomes `Validation` with the first message per field; any other
    /// non-2xx becomes `RequestFailed` with the body's message when there
    /// is one.
    async fn translate(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        self.session.handle_status(status.as_u16())?;

        if status.as_u16() == 422 {
            let body: ValidationBody = response.json().await.unwrap_or_default();
            let field_errors = body
                .errors
                .into_iter()
                .filter_map(|(field, mut messages)| {
                    if messages.is_empty() {
                        None
                    } else {
                        Some((field, messages.remove(0)))
                    }
                })
                .collect();
            return Err(ApiError::Validation { field_errors });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .or_else(|| (!text.is_empty()).then(|| text.clone()))
                .unwrap_or_else(|| "request failed".into());
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}
