use crate::{Result, TesselError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared content encoding of a payload. The core never inspects the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    #[default]
    Json,
    Yaml,
    Toml,
    Text,
    Binary,
}

impl ValueFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueFormat {
    type Err = TesselError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "text" | "txt" => Ok(Self::Text),
            "binary" | "bin" => Ok(Self::Binary),
            other => Err(TesselError::InvalidRequest(format!(
                "unsupported value format: {}",
                other
            ))),
        }
    }
}

/// One version of a config entry's payload. Immutable once built; an update
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedValue {
    #[serde(with = "base64_bytes")]
    data: Bytes,
    format: ValueFormat,
    source: String,
    timestamp: i64,
}

impl EncodedValue {
    pub fn new(
        data: impl Into<Bytes>,
        format: ValueFormat,
        source: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            data: data.into(),
            format,
            source: source.into(),
            timestamp,
        }
    }

    /// Value stamped with the current wall-clock second.
    pub fn now(data: impl Into<Bytes>, format: ValueFormat, source: impl Into<String>) -> Self {
        Self::new(data, format, source, unix_now())
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn format(&self) -> ValueFormat {
        self.format
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Empty payloads and a literal `null` read back as absent.
    pub fn is_null_like(&self) -> bool {
        let trimmed = self.data.trim_ascii();
        trimmed.is_empty() || trimmed == b"null"
    }
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ValueFormat>().unwrap(), ValueFormat::Json);
        assert_eq!(" yml ".parse::<ValueFormat>().unwrap(), ValueFormat::Yaml);
        assert!("xml".parse::<ValueFormat>().is_err());
    }

    #[test]
    fn test_null_like_payloads() {
        let empty = EncodedValue::new(Bytes::new(), ValueFormat::Json, "cli", 1);
        let null = EncodedValue::new("null", ValueFormat::Json, "cli", 1);
        let padded = EncodedValue::new(" null\n", ValueFormat::Json, "cli", 1);
        let real = EncodedValue::new("\"null\"", ValueFormat::Json, "cli", 1);

        assert!(empty.is_null_like());
        assert!(null.is_null_like());
        assert!(padded.is_null_like());
        assert!(!real.is_null_like());
    }

    #[test]
    fn test_json_shape_uses_base64_data() {
        let value = EncodedValue::new("true", ValueFormat::Json, "cli", 100);
        let json = serde_json::to_value(&value).unwrap();

        assert_eq!(json["data"], "dHJ1ZQ==");
        assert_eq!(json["format"], "json");
        assert_eq!(json["source"], "cli");
        assert_eq!(json["timestamp"], 100);

        let decoded: EncodedValue = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, value);
    }
}
