//! Remote resource snapshots: plain data transferred as-is from the
//! backend. Unknown fields are ignored and most optional fields default,
//! so additive backend changes don't break decoding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Partial profile update; absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub property_sub_type: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lot_area: Option<f64>,
    #[serde(default)]
    pub floor_area: Option<f64>,
    #[serde(default)]
    pub total_rooms: Option<u32>,
    #[serde(default)]
    pub total_bedrooms: Option<u32>,
    #[serde(default)]
    pub total_bathrooms: Option<u32>,
    #[serde(default)]
    pub car_slots: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub feature_name: Vec<String>,
    /// Geofence boundary as the backend stores it; passed through
    /// uninterpreted (point-count minimums are a backend concern).
    #[serde(default)]
    pub boundary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One binary image part for the multipart listing upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Input for creating a listing. Sent as multipart form data: scalars as
/// text parts, features repeated, boundary JSON-encoded, images binary.
#[derive(Debug, Clone, Default)]
pub struct NewProperty {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub property_type: String,
    pub property_sub_type: Option<String>,
    pub address: Option<String>,
    pub lot_area: Option<f64>,
    pub floor_area: Option<f64>,
    pub total_rooms: Option<u32>,
    pub total_bedrooms: Option<u32>,
    pub total_bathrooms: Option<u32>,
    pub car_slots: Option<u32>,
    pub features: Vec<String>,
    pub boundary: Vec<GeoPoint>,
    pub cover_image: Option<ImageUpload>,
    pub gallery: Vec<ImageUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: u64,
    #[serde(default)]
    pub property_id: Option<u64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Per-inquiry actions exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryAction {
    Accept,
    Decline,
    Cancel,
}

impl InquiryAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMember {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub message: String,
    #[serde(default)]
    pub sender: Option<ChatMember>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChannelSummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<ChatMember>,
}

/// `GET agent/chat/channels/{id}` response: the conversation plus the id
/// of the requesting user, so the UI can tell the chatmate apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub current_channel: ChannelContents,
    pub current_user_id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelContents {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub members: Vec<ChatMember>,
}
