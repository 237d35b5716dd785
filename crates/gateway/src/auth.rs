use {serde::Deserialize, tracing::info};

use propwire_common::{ApiError, RequestDescriptor};

use crate::client::ApiClient;

/// `POST sanctum/token` response.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

impl ApiClient {
    /// Exchange credentials for a bearer token and make it the active
    /// session. The token is persisted before any dependent request can
    /// observe it.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let desc = RequestDescriptor::post("sanctum/token").json(serde_json::json!({
            "email": email,
            "password": password,
            "device_name": "propwire",
        }));
        let response: LoginResponse = self.fetch(desc).await?;
        self.session().set(&response.token)?;
        info!("logged in");
        Ok(())
    }

    /// Drop the local session. Idempotent; the token itself is left to
    /// expire server-side.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.session().clear()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        propwire_config::ApiConfig,
        propwire_session::{Session, TokenStore},
        tempfile::tempdir,
    };

    use super::*;

    #[tokio::test]
    async fn login_persists_token_used_by_subsequent_requests() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sanctum/token")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"email":"a@b.com","password":"x"}"#.into(),
            ))
            .with_body(r#"{"token":"tok123"}"#)
            .create_async()
            .await;
        let user_mock = server
            .mock("GET", "/agent/user")
            .match_header("authorization", "Bearer tok123")
            .with_body(r#"{"id":1,"name":"Agent A","email":"a@b.com"}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let session = Arc::new(Session::new(TokenStore::with_path(
            dir.path().join("session.json"),
        )));
        let cfg = ApiConfig {
            base_url: format!("{}/", server.url()),
            timeout_secs: 2,
        };
        let client = ApiClient::new(&cfg, session.clone()).unwrap();

        client.login("a@b.com", "x").await.unwrap();
        assert!(session.is_authenticated());

        // The response comes back to the caller unmodified.
        let user = client.current_user().await.unwrap();
        assert_eq!(user.name, "Agent A");
        user_mock.assert_async().await;

        client.logout().unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn bad_credentials_do_not_create_a_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sanctum/token")
            .with_status(422)
            .with_body(r#"{"errors":{"email":["These credentials do not match our records."]}}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let session = Arc::new(Session::new(TokenStore::with_path(
            dir.path().join("session.json"),
        )));
        let cfg = ApiConfig {
            base_url: format!("{}/", server.url()),
            timeout_secs: 2,
        };
        let client = ApiClient::new(&cfg, session.clone()).unwrap();

        let err = client.login("a@b.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert!(!session.is_authenticated());
    }
}
