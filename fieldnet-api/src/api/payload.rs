//! Request body extractors shared by the JSON handlers

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ApiError;

/// A request body as a JSON object
///
/// Accepts `application/json` and `application/x-www-form-urlencoded`;
/// form values arrive as strings and go through the same validation.
#[derive(Debug, Clone, Default)]
pub struct Payload(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Payload(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::default());
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(obj)) => Ok(Payload(obj)),
            Ok(_) => Err(ApiError::BadRequest(
                "Invalid data. Expected a dictionary.".to_string(),
            )),
            Err(e) => Err(ApiError::BadRequest(format!("JSON parse error - {}", e))),
        }
    }
}

impl Payload {
    /// Integer `id` of the object a partial update targets
    pub fn target_id(&self) -> Option<i64> {
        self.0
            .get("id")
            .and_then(fieldnet_common::validation::integer_of)
    }
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Read the `document` part of a multipart upload
///
/// Other parts are ignored. `None` when no `document` part was sent.
pub async fn read_document(mut multipart: Multipart) -> Result<Option<Document>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Upload(e.body_text()))?
    {
        if field.name() != Some("document") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Upload(e.body_text()))?;
        return Ok(Some(Document { file_name, bytes }));
    }

    Ok(None)
}
