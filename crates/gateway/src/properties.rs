use reqwest::multipart::{Form, Part};

use propwire_common::{ApiError, RequestDescriptor};

use crate::{
    client::ApiClient,
    types::{ImageUpload, NewProperty, Property},
};

impl ApiClient {
    pub async fn properties(&self) -> Result<Vec<Property>, ApiError> {
        self.fetch(RequestDescriptor::get("agent/properties")).await
    }

    pub async fn property(&self, id: u64) -> Result<Property, ApiError> {
        self.fetch(RequestDescriptor::get(format!("agent/properties/{id}")))
            .await
    }

    /// Create a listing. The only non-JSON operation: multipart form data
    /// with binary image parts.
    pub async fn create_property(&self, new: &NewProperty) -> Result<Property, ApiError> {
        let form = build_listing_form(new)?;
        let response = self
            .execute_multipart(RequestDescriptor::post("postproperty"), form)
            .await?;
        let status = response.status().as_u16();
        response.json().await.map_err(|_| ApiError::RequestFailed {
            status,
            message: "invalid response body".into(),
        })
    }

    /// Send an inquiry about a listing.
    pub async fn inquire(&self, property_id: u64, message: &str) -> Result<(), ApiError> {
        self.fetch_unit(
            RequestDescriptor::post(format!("agent/properties/{property_id}/inquire"))
                .json(serde_json::json!({ "message": message })),
        )
        .await
    }
}

fn build_listing_form(new: &NewProperty) -> Result<Form, ApiError> {
    let mut form = Form::new()
        .text("title", new.title.clone())
        .text("description", new.description.clone())
        .text("price", new.price.to_string())
        .text("property_type", new.property_type.clone());

    if let Some(sub) = &new.property_sub_type {
        form = form.text("property_sub_type", sub.clone());
    }
    if let Some(address) = &new.address {
        form = form.text("address", address.clone());
    }
    for (field, value) in [("lot_area", new.lot_area), ("floor_area", new.floor_area)] {
        if let Some(value) = value {
            form = form.text(field, value.to_string());
        }
    }
    for (field, value) in [
        ("total_rooms", new.total_rooms),
        ("total_bedrooms", new.total_bedrooms),
        ("total_bathrooms", new.total_bathrooms),
        ("car_slots", new.car_slots),
    ] {
        if let Some(value) = value {
            form = form.text(field, value.to_string());
        }
    }
    for feature in &new.features {
        form = form.text("feature_name[]", feature.clone());
    }
    if !new.boundary.is_empty() {
        // The backend expects the boundary as one JSON-encoded text part.
        // Infallible for a list of plain coordinates.
        let boundary = serde_json::to_string(&new.boundary).unwrap_or_default();
        form = form.text("boundary", boundary);
    }
    if let Some(cover) = &new.cover_image {
        form = form.part("image_url", image_part(cover)?);
    }
    for image in &new.gallery {
        form = form.part("image_urls[]", image_part(image)?);
    }
    Ok(form)
}

fn image_part(image: &ImageUpload) -> Result<Part, ApiError> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| {
            let mut field_errors = std::collections::HashMap::new();
            field_errors.insert(
                "content_type".to_string(),
                format!("invalid content type for {}: {e}", image.file_name),
            );
            ApiError::Validation { field_errors }
        })
}
