use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a signaling request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unrecognized role prefix: {0:?}")]
    UnknownRole(String),

    #[error("expected an offer, got {0:?}")]
    NotAnOffer(SdpKind),
}

/// Session description kind, serialized the way browsers emit it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Session description as carried in the `sd` / `SD` fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn answer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp,
        }
    }

    /// Return the SDP body if this description is an offer
    pub fn into_offer(self) -> Result<String, ProtocolError> {
        match self.kind {
            SdpKind::Offer => Ok(self.sdp),
            other => Err(ProtocolError::NotAnOffer(other)),
        }
    }
}

/// Role a peer takes in the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sends the live video stream
    Publisher,
    /// Receives the broadcast stream and the telemetry feed
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Publisher => write!(f, "Publisher"),
            Role::Client => write!(f, "Client"),
        }
    }
}

/// Delimiter between the role prefix and the opaque label in a peer name
pub const NAME_DELIMITER: char = ':';

/// Result of parsing the `name` field of a signaling request
///
/// The prefix before [`NAME_DELIMITER`] selects the role. Whatever follows is an
/// opaque client-chosen label with no protocol meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequest {
    Publisher { label: Option<String> },
    Client { label: Option<String> },
    Invalid { prefix: String },
}

impl RoleRequest {
    pub fn parse(name: &str) -> Self {
        let (prefix, rest) = match name.split_once(NAME_DELIMITER) {
            Some((prefix, rest)) => (prefix, Some(rest)),
            None => (name, None),
        };
        let label = rest.filter(|s| !s.is_empty()).map(str::to_owned);

        match prefix {
            "Publisher" => RoleRequest::Publisher { label },
            "Client" => RoleRequest::Client { label },
            other => RoleRequest::Invalid {
                prefix: other.to_owned(),
            },
        }
    }

    /// Split into role and label, rejecting unrecognized prefixes
    pub fn into_role(self) -> Result<(Role, Option<String>), ProtocolError> {
        match self {
            RoleRequest::Publisher { label } => Ok((Role::Publisher, label)),
            RoleRequest::Client { label } => Ok((Role::Client, label)),
            RoleRequest::Invalid { prefix } => Err(ProtocolError::UnknownRole(prefix)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_prefixes() {
        assert_eq!(
            RoleRequest::parse("Publisher:alice"),
            RoleRequest::Publisher {
                label: Some("alice".to_string())
            }
        );
        assert_eq!(
            RoleRequest::parse("Client"),
            RoleRequest::Client { label: None }
        );
        // Browsers send "Client:<timestamp>:<random>"; only the first split matters
        assert_eq!(
            RoleRequest::parse("Client:1700000000:42"),
            RoleRequest::Client {
                label: Some("1700000000:42".to_string())
            }
        );
    }

    #[test]
    fn rejects_unknown_prefixes() {
        for name in ["Viewer:bob", "", "publisher:alice", ":Publisher", "Client2"] {
            let parsed = RoleRequest::parse(name);
            assert!(
                matches!(parsed, RoleRequest::Invalid { .. }),
                "{name:?} parsed as {parsed:?}"
            );
            assert!(parsed.into_role().is_err());
        }
    }

    #[test]
    fn session_description_uses_browser_field_names() {
        let sd: SessionDescription =
            serde_json::from_str(r#"{"type":"offer","sdp":"v=0\r\n"}"#).unwrap();
        assert_eq!(sd.kind, SdpKind::Offer);
        assert_eq!(sd.clone().into_offer().unwrap(), "v=0\r\n");

        let answer = serde_json::to_value(SessionDescription::answer("v=0".into())).unwrap();
        assert_eq!(answer["type"], "answer");
        assert_eq!(answer["sdp"], "v=0");
    }

    #[test]
    fn answer_is_not_accepted_as_offer() {
        let sd = SessionDescription::answer(String::new());
        assert_eq!(
            sd.into_offer(),
            Err(ProtocolError::NotAnOffer(SdpKind::Answer))
        );
    }
}
