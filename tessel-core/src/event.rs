use crate::{ConfigKey, EncodedValue, Result, TesselError, unix_now};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Put(EncodedValue),
    Tombstone,
}

/// A write or delete in transit between instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireChangeEvent", into = "WireChangeEvent")]
pub struct ChangeEvent {
    pub key: ConfigKey,
    pub change: Change,
    pub origin_timestamp: i64,
    /// Instance that published the event. Informational only.
    pub origin: String,
}

impl ChangeEvent {
    /// Event for a write; the origin timestamp is the value's own timestamp.
    pub fn put(key: ConfigKey, value: EncodedValue, origin: impl Into<String>) -> Self {
        let origin_timestamp = value.timestamp();
        Self {
            key,
            change: Change::Put(value),
            origin_timestamp,
            origin: origin.into(),
        }
    }

    pub fn tombstone(key: ConfigKey, origin: impl Into<String>) -> Self {
        Self {
            key,
            change: Change::Tombstone,
            origin_timestamp: unix_now(),
            origin: origin.into(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.change, Change::Tombstone)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireChangeKind {
    Put,
    Tombstone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireChangeEvent {
    namespace: String,
    path: String,
    kind: WireChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<EncodedValue>,
    origin_timestamp: i64,
    #[serde(default)]
    origin: String,
}

impl From<ChangeEvent> for WireChangeEvent {
    fn from(event: ChangeEvent) -> Self {
        let (kind, value) = match event.change {
            Change::Put(value) => (WireChangeKind::Put, Some(value)),
            Change::Tombstone => (WireChangeKind::Tombstone, None),
        };

        Self {
            namespace: event.key.namespace().to_string(),
            path: event.key.path().to_string(),
            kind,
            value,
            origin_timestamp: event.origin_timestamp,
            origin: event.origin,
        }
    }
}

impl TryFrom<WireChangeEvent> for ChangeEvent {
    type Error = TesselError;

    fn try_from(wire: WireChangeEvent) -> Result<Self> {
        let key = ConfigKey::new(wire.namespace, wire.path)?;
        let change = match (wire.kind, wire.value) {
            (WireChangeKind::Put, Some(value)) if value.timestamp() != wire.origin_timestamp => {
                return Err(TesselError::InvalidRequest(format!(
                    "put event for {} has origin ts={} but value ts={}",
                    key,
                    wire.origin_timestamp,
                    value.timestamp()
                )));
            }
            (WireChangeKind::Put, Some(value)) => Change::Put(value),
            (WireChangeKind::Put, None) => {
                return Err(TesselError::InvalidRequest(format!(
                    "put event for {} carries no value",
                    key
                )));
            }
            (WireChangeKind::Tombstone, _) => Change::Tombstone,
        };

        Ok(Self {
            key,
            change,
            origin_timestamp: wire.origin_timestamp,
            origin: wire.origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueFormat;

    #[test]
    fn test_put_event_takes_value_timestamp() {
        let key = ConfigKey::in_default_namespace("feature.x").unwrap();
        let value = EncodedValue::new("true", ValueFormat::Json, "cli", 100);
        let event = ChangeEvent::put(key, value, "node-a");

        assert_eq!(event.origin_timestamp, 100);
        assert!(!event.is_tombstone());
    }

    #[test]
    fn test_tombstone_wire_shape() {
        let key = ConfigKey::new("tenant-a", "db.url").unwrap();
        let event = ChangeEvent::tombstone(key.clone(), "node-a");
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();

        assert_eq!(json["namespace"], "tenant-a");
        assert_eq!(json["path"], "db.url");
        assert_eq!(json["kind"], "tombstone");
        assert!(json.get("value").is_none());

        let decoded = ChangeEvent::decode(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(decoded.key, key);
        assert!(decoded.is_tombstone());
    }

    #[test]
    fn test_decode_rejects_empty_path() {
        let payload = br#"{"namespace":"global","path":"","kind":"tombstone","origin_timestamp":1}"#;
        assert!(ChangeEvent::decode(payload).is_err());
    }

    #[test]
    fn test_decode_rejects_put_without_value() {
        let payload = br#"{"namespace":"global","path":"a","kind":"put","origin_timestamp":1}"#;
        assert!(ChangeEvent::decode(payload).is_err());
    }

    #[test]
    fn test_decode_rejects_mismatched_origin_timestamp() {
        let key = ConfigKey::in_default_namespace("a").unwrap();
        let value = EncodedValue::new("1", ValueFormat::Json, "cli", 10);
        let mut json: serde_json::Value =
            serde_json::from_slice(&ChangeEvent::put(key, value, "node-a").encode().unwrap()).unwrap();
        assert!(ChangeEvent::decode(&serde_json::to_vec(&json).unwrap()).is_ok());

        json["origin_timestamp"] = serde_json::json!(11);
        assert!(ChangeEvent::decode(&serde_json::to_vec(&json).unwrap()).is_err());
    }
}
