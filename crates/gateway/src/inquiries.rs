use propwire_common::{ApiError, RequestDescriptor};

use crate::{
    client::ApiClient,
    types::{Inquiry, InquiryAction},
};

impl ApiClient {
    pub async fn inquiries(&self) -> Result<Vec<Inquiry>, ApiError> {
        self.fetch(RequestDescriptor::get("agent/inquiries")).await
    }

    /// Accept, decline, or cancel one inquiry.
    pub async fn inquiry_action(&self, id: u64, action: InquiryAction) -> Result<(), ApiError> {
        self.fetch_unit(RequestDescriptor::post(format!(
            "agent/inquiries/{id}/{}",
            action.path_segment()
        )))
        .await
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

    fn client_for(server: &mockito::Server, dir: &tempfile::TempDir) -> ApiClient {
        let session = Arc::new(Session::new(TokenStore::with_path(
            dir.path().join("session.json"),
        )));
        let cfg = ApiConfig {
            base_url: format!("{}/", server.url()),
            timeout_secs: 2,
        };
        ApiClient::new(&cfg, session).unwrap()
    }

    #[tokio::test]
    async fn accept_hits_the_action_route() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/agent/inquiries/3/accept")
            .with_body(r#"{"id":3,"status":"accepted"}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let client = client_for(&server, &dir);
        client.inquiry_action(3, InquiryAction::Accept).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn inquiries_decode_as_plain_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agent/inquiries")
            .with_body(r#"[{"id":3,"property_id":7,"message":"Is it available?","status":"pending"}]"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let client = client_for(&server, &dir);
        let inquiries = client.inquiries().await.unwrap();
        assert_eq!(inquiries.len(), 1);
        assert_eq!(inquiries[0].message, "Is it available?");
    }
}
