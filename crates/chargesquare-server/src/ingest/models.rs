//! Raw Open Charge Map POI records
//!
//! The directory is inconsistent about types (ids arrive as numbers or
//! strings, flags as bools or strings) and about which levels are present.
//! Every field here is optional and deserialized leniently: a value of the
//! wrong shape becomes `None` instead of failing the record.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A JSON scalar of whatever type the directory chose to send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            Scalar::Float(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                Some(*value as i64)
            },
            Scalar::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Text(text) => text.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Scalar::Bool(value) => value.to_string(),
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Text(text) => text.clone(),
        }
    }

    /// `true`, or the text "true" in any case.
    pub fn is_true(&self) -> bool {
        match self {
            Scalar::Bool(value) => *value,
            Scalar::Text(text) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPoi {
    #[serde(rename = "ID", default, deserialize_with = "lenient")]
    pub id: Option<Scalar>,
    #[serde(rename = "AddressInfo", default, deserialize_with = "lenient")]
    pub address_info: Option<RawAddressInfo>,
    #[serde(rename = "StatusType", default, deserialize_with = "lenient")]
    pub status_type: Option<RawStatusType>,
    #[serde(rename = "Connections", default, deserialize_with = "lenient")]
    pub connections: Option<Vec<RawConnection>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAddressInfo {
    #[serde(rename = "Title", default, deserialize_with = "lenient")]
    pub title: Option<Scalar>,
    #[serde(rename = "AddressLine1", default, deserialize_with = "lenient")]
    pub address_line1: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatusType {
    #[serde(rename = "IsOperational", default, deserialize_with = "lenient")]
    pub is_operational: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConnection {
    #[serde(rename = "PowerKW", default, deserialize_with = "lenient")]
    pub power_kw: Option<Scalar>,
    #[serde(rename = "ConnectionType", default, deserialize_with = "lenient")]
    pub connection_type: Option<RawConnectionType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConnectionType {
    #[serde(rename = "Title", default, deserialize_with = "lenient")]
    pub title: Option<Scalar>,
}
