use propwire_common::{ApiError, RequestDescriptor};

use crate::{
    client::ApiClient,
    types::{ProfileUpdate, User},
};

impl ApiClient {
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.fetch(RequestDescriptor::get("agent/user")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        // Infallible for this shape (strings only).
        let body = serde_json::to_value(update).unwrap_or_default();
        self.fetch(RequestDescriptor::put("agent/user").json(body))
            .await
    }
}
