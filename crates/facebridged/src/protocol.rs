//! Host wire protocol: one JSON envelope per frame.
//!
//! ```text
//! Request:  { "type": "MATCH_FACE"|"DETECT_FACE", "queryImage": ..., "trainingImages"?: [...] }
//! Response: { "type": ..., "isSuccess": bool, "isError": bool, "result": any }
//! ```

use facebridge_core::{FaceError, ImageArg, ImageRef};
use serde::{Deserialize, Deserializer, Serialize};

pub mod error_codes {
    pub const CAPABILITY_UNAVAILABLE: &str = "CAPABILITY_UNAVAILABLE";
    pub const EXTRACTION_FAILURE: &str = "EXTRACTION_FAILURE";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Envelope `type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    MatchFace,
    DetectFace,
    /// Outbound only: models finished loading at startup.
    ModelLoaded,
}

/// Host → bridge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "MATCH_FACE", rename_all = "camelCase")]
    MatchFace {
        query_image: ImageRef,
        #[serde(default, deserialize_with = "null_as_empty")]
        training_images: Vec<ImageRef>,
    },
    #[serde(rename = "DETECT_FACE", rename_all = "camelCase")]
    DetectFace { query_image: ImageArg },
}

/// An explicit `null` list reads the same as an absent one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ImageRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ImageRef>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Request::MatchFace { .. } => MessageKind::MatchFace,
            Request::DetectFace { .. } => MessageKind::DetectFace,
        }
    }
}

/// `result` payload of an error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&FaceError> for ErrorInfo {
    fn from(err: &FaceError) -> Self {
        let code = match err {
            FaceError::Unavailable(_) => error_codes::CAPABILITY_UNAVAILABLE,
            FaceError::Extraction(_) => error_codes::EXTRACTION_FAILURE,
        };
        Self::new(code, err.to_string())
    }
}

/// Bridge → host response. Exactly one of `is_success` / `is_error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub is_success: bool,
    pub is_error: bool,
    pub result: serde_json::Value,
}

impl ResponseEnvelope {
    pub fn success(kind: MessageKind, result: serde_json::Value) -> Self {
        Self {
            kind,
            is_success: true,
            is_error: false,
            result,
        }
    }

    pub fn failure(kind: MessageKind, error: ErrorInfo) -> Self {
        Self {
            kind,
            is_success: false,
            is_error: true,
            result: serde_json::to_value(error).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn model_loaded() -> Self {
        Self::success(MessageKind::ModelLoaded, serde_json::Value::Null)
    }
}
