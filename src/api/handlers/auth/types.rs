//! Request/response types for the verify endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRequest {
    pub pin: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn success_response_has_no_message() -> Result<()> {
        let value = serde_json::to_value(VerifyResponse {
            success: true,
            message: None,
        })?;
        assert_eq!(value, serde_json::json!({ "success": true }));
        Ok(())
    }

    #[test]
    fn failure_response_carries_message() -> Result<()> {
        let value = serde_json::to_value(VerifyResponse {
            success: false,
            message: Some("Invalid PIN".to_string()),
        })?;
        assert_eq!(
            value,
            serde_json::json!({ "success": false, "message": "Invalid PIN" })
        );
        Ok(())
    }
}
