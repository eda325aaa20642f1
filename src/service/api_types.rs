//! Serde types matching the admin API's non-entity responses.
//!
//! Entities and pages deserialize straight into their domain types; what
//! lives here are the envelopes around them.

use serde::Deserialize;

use crate::cache::EntityId;
use crate::error::ServiceError;

// ============================================================================
// Error envelope
// ============================================================================

/// Body the API sends with a non-2xx status.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorEnvelope {
  pub message: Option<String>,
  #[serde(rename = "errorCode", alias = "code")]
  pub error_code: Option<String>,
  /// Framework default error pages carry a reason phrase here
  pub error: Option<String>,
}

impl ApiErrorEnvelope {
  pub fn into_service_error(self, status: u16) -> ServiceError {
    let message = self
      .message
      .filter(|m| !m.trim().is_empty())
      .or(self.error)
      .unwrap_or_else(|| format!("Request failed with status {}", status));
    ServiceError {
      message,
      error_code: self.error_code,
    }
  }
}

/// Build the uniform error from a failed response's status and raw body.
pub fn error_from_body(status: u16, body: &[u8]) -> ServiceError {
  match serde_json::from_slice::<ApiErrorEnvelope>(body) {
    Ok(envelope) => envelope.into_service_error(status),
    Err(_) => {
      let text = String::from_utf8_lossy(body);
      let text = text.trim();
      if text.is_empty() || text.starts_with('<') {
        ApiErrorEnvelope::default().into_service_error(status)
      } else {
        ServiceError::new(text)
      }
    }
  }
}

// ============================================================================
// Status toggle response
// ============================================================================

/// Toggle endpoints answer with the id, either bare or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiIdResponse {
  Bare(EntityId),
  Wrapped { id: EntityId },
}

impl ApiIdResponse {
  pub fn id(&self) -> EntityId {
    match self {
      ApiIdResponse::Bare(id) | ApiIdResponse::Wrapped { id } => *id,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_envelope_with_code() {
    let err = error_from_body(409, br#"{"message":"Coupon code already exists","errorCode":"DUPLICATE_CODE"}"#);
    assert_eq!(err.message, "Coupon code already exists");
    assert_eq!(err.error_code.as_deref(), Some("DUPLICATE_CODE"));
  }

  #[test]
  fn test_framework_error_page_falls_back_to_reason() {
    let err = error_from_body(
      404,
      br#"{"timestamp":"2024-01-01T00:00:00Z","status":404,"error":"Not Found","path":"/api/brands/9"}"#,
    );
    assert_eq!(err.message, "Not Found");
    assert_eq!(err.error_code, None);
  }

  #[test]
  fn test_plain_text_body() {
    let err = error_from_body(500, b"database unavailable");
    assert_eq!(err.message, "database unavailable");
  }

  #[test]
  fn test_empty_or_html_body_uses_status() {
    assert_eq!(error_from_body(502, b"").message, "Request failed with status 502");
    assert_eq!(
      error_from_body(502, b"<html>Bad Gateway</html>").message,
      "Request failed with status 502"
    );
  }

  #[test]
  fn test_id_response_shapes() {
    let bare: ApiIdResponse = serde_json::from_str("42").unwrap();
    let wrapped: ApiIdResponse = serde_json::from_str(r#"{"id": 42}"#).unwrap();
    assert_eq!(bare.id(), 42);
    assert_eq!(wrapped.id(), 42);
  }
}
