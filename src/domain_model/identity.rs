use serde::{Deserialize, Serialize};

/// Caller-owned identity. The engine never looks inside it; only the
/// identity provider knows its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub serde_json::Value);

impl Identity {
    pub fn new(value: serde_json::Value) -> Self {
        Identity(value)
    }
}

/// Claims produced from an identity at issuance. `sub` is mandatory.
pub type ClaimsMap = serde_json::Map<String, serde_json::Value>;
