use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{AgoraError, AgoraResult};

/// Stable container identity, constant across revisions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub fn new() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    pub fn from_uuid_str(value: &str) -> AgoraResult<Self> {
        let uuid = Uuid::parse_str(value).map_err(|err| {
            AgoraError::validation("guid", format!("invalid uuid '{value}': {err}"))
        })?;
        Ok(Self(*uuid.as_bytes()))
    }

    pub fn to_uuid_string(self) -> String {
        Uuid::from_bytes(self.0).to_string()
    }

    pub fn as_bytes(self) -> [u8; 16] {
        self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = Uuid::from_bytes(self.0);
        write!(f, "{uuid}")
    }
}

impl Serialize for Guid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_uuid_string())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let uuid = Uuid::parse_str(&value).map_err(serde::de::Error::custom)?;
        Ok(Guid(*uuid.as_bytes()))
    }
}

/// Globally unique, monotonically increasing revision number allocated by the
/// backing store.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Revision(pub i64);

impl Revision {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Guid;

    #[test]
    fn guid_roundtrips_uuid() {
        let guid = Guid::new();
        let text = guid.to_uuid_string();
        let parsed = Guid::from_uuid_str(&text).expect("uuid parse");
        assert_eq!(parsed.as_bytes(), guid.as_bytes());
    }

    #[test]
    fn guid_rejects_invalid_strings() {
        assert!(Guid::from_uuid_str("not-a-uuid").is_err());
    }
}
