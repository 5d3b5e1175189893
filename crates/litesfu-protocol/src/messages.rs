use serde::{Deserialize, Serialize};

use crate::types::SessionDescription;

/// Body of `POST /sdp`
///
/// Older pages send `Name`/`SD`, which are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpRequest {
    /// `<Role>[:<label>]`
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "SD")]
    pub sd: SessionDescription,
}

/// Successful `POST /sdp` response (202 Accepted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpResponse {
    #[serde(rename = "Result")]
    pub result: String,
    #[serde(rename = "SD")]
    pub sd: SessionDescription,
}

impl SdpResponse {
    pub fn accepted(answer: SessionDescription) -> Self {
        Self {
            result: "Successfully received incoming client SDP".to_string(),
            sd: answer,
        }
    }
}

/// Error body returned for every request-scoped failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Synthetic overlay message pushed to viewers over the data channel once per second
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub height: i32,
    pub width: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SdpKind;

    #[test]
    fn sdp_response_uses_capitalized_keys() {
        let response = SdpResponse::accepted(SessionDescription::answer("v=0".into()));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["Result"].as_str().is_some_and(|s| !s.is_empty()));
        assert_eq!(value["SD"]["type"], "answer");
    }

    #[test]
    fn sdp_request_decodes_browser_body() {
        let body = r#"{"name":"Publisher:alice","sd":{"type":"offer","sdp":"v=0"}}"#;
        let request: SdpRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.name, "Publisher:alice");
        assert_eq!(request.sd.kind, SdpKind::Offer);

        let legacy = r#"{"Name":"Client:1","SD":{"type":"offer","sdp":"v=0"}}"#;
        let request: SdpRequest = serde_json::from_str(legacy).unwrap();
        assert_eq!(request.name, "Client:1");
    }

    #[test]
    fn sdp_request_requires_both_fields() {
        assert!(serde_json::from_str::<SdpRequest>(r#"{"name":"Client"}"#).is_err());
        assert!(serde_json::from_str::<SdpRequest>(r#"{"sd":{"type":"offer","sdp":""}}"#).is_err());
    }

    #[test]
    fn telemetry_message_shape() {
        let msg = TelemetryMessage {
            text: "2024-01-01 00:00:00 - one".into(),
            x: 12,
            y: 150,
            height: 100,
            width: 100,
        };
        let value = serde_json::to_value(&msg).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        for key in ["text", "x", "y", "height", "width"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
