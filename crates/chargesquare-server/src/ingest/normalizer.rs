//! Maps raw POI records to stations
//!
//! | Station field   | Source                               | Fallback            |
//! |-----------------|--------------------------------------|---------------------|
//! | `id`            | `ID`                                 | record rejected     |
//! | `name`          | `AddressInfo.Title`                  | record rejected     |
//! | `location`      | `AddressInfo.AddressLine1`           | record rejected     |
//! | `power_output`  | `Connections[0].PowerKW`             | `0.0`               |
//! | `connector_type`| `Connections[0].ConnectionType.Title`| `"Unknown"`         |
//! | `status`        | `StatusType.IsOperational`           | `MAINTENANCE`       |

use serde_json::Value;
use thiserror::Error;

use super::models::{RawConnection, RawPoi, Scalar};
use crate::db::stations::{MAX_CONNECTOR_TYPE_LEN, MAX_NAME_LEN};
use crate::models::{NewStation, StationStatus, UNKNOWN_CONNECTOR_TYPE};

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    /// Missing, unparsable, zero or negative
    #[error("Record has no usable ID (got {0:?})")]
    MissingId(Option<String>),

    #[error("Record {id} has no {field}")]
    MissingField { id: i64, field: &'static str },
}

/// Normalize one element of the directory response.
pub fn normalize_value(value: Value) -> Result<NewStation, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::NotAnObject);
    }
    let raw: RawPoi = serde_json::from_value(value).map_err(|_| NormalizeError::NotAnObject)?;
    normalize(&raw)
}

pub fn normalize(raw: &RawPoi) -> Result<NewStation, NormalizeError> {
    let id = raw
        .id
        .as_ref()
        .and_then(Scalar::as_i64)
        .filter(|id| *id > 0)
        .ok_or_else(|| NormalizeError::MissingId(raw.id.as_ref().map(Scalar::as_text)))?;

    let address = raw.address_info.as_ref();
    let name = required_text(address.and_then(|a| a.title.as_ref()))
        .ok_or(NormalizeError::MissingField { id, field: "AddressInfo.Title" })?;
    let location = required_text(address.and_then(|a| a.address_line1.as_ref()))
        .ok_or(NormalizeError::MissingField { id, field: "AddressInfo.AddressLine1" })?;

    let status = match raw.status_type.as_ref().and_then(|s| s.is_operational.as_ref()) {
        Some(flag) if flag.is_true() => StationStatus::Available,
        _ => StationStatus::Maintenance,
    };

    let connection = raw.connections.as_ref().and_then(|c| c.first());

    Ok(NewStation {
        id: Some(id),
        name: truncate(id, "name", name, MAX_NAME_LEN),
        location,
        status,
        power_output: power_output(id, connection),
        connector_type: truncate(id, "connector type", connector_type(connection), MAX_CONNECTOR_TYPE_LEN),
    })
}

fn required_text(value: Option<&Scalar>) -> Option<String> {
    value
        .map(|v| v.as_text().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn power_output(id: i64, connection: Option<&RawConnection>) -> f64 {
    let raw = connection.and_then(|c| c.power_kw.as_ref());
    match raw.and_then(Scalar::as_f64) {
        Some(kw) if kw.is_finite() && kw >= 0.0 => kw,
        parsed => {
            tracing::debug!(
                station_id = id,
                raw = ?raw,
                parsed = ?parsed,
                "No usable PowerKW, defaulting power output to 0"
            );
            0.0
        },
    }
}

fn connector_type(connection: Option<&RawConnection>) -> String {
    connection
        .and_then(|c| c.connection_type.as_ref())
        .and_then(|t| t.title.as_ref())
        .map(|title| title.as_text().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNKNOWN_CONNECTOR_TYPE.to_string())
}

fn truncate(id: i64, field: &str, value: String, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value;
    }
    tracing::debug!(station_id = id, field, max_chars, "Truncating overlong field");
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_record() {
        let station = normalize_value(json!({
            "ID": "42",
            "AddressInfo": {"Title": "Downtown", "AddressLine1": "Main St"},
            "StatusType": {"IsOperational": "true"},
            "Connections": [{"PowerKW": 22.0, "ConnectionType": {"Title": "Type2"}}]
        }))
        .unwrap();

        assert_eq!(
            station,
            NewStation {
                id: Some(42),
                name: "Downtown".to_string(),
                location: "Main St".to_string(),
                status: StationStatus::Available,
                power_output: 22.0,
                connector_type: "Type2".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_connections_use_defaults() {
        let station = normalize_value(json!({
            "ID": 7,
            "AddressInfo": {"Title": "Harbour", "AddressLine1": "Pier 4"},
            "StatusType": {"IsOperational": true}
        }))
        .unwrap();

        assert_eq!(station.power_output, 0.0);
        assert_eq!(station.connector_type, UNKNOWN_CONNECTOR_TYPE);
        assert_eq!(station.status, StationStatus::Available);
    }

    #[test]
    fn test_empty_connections_use_defaults() {
        let station = normalize_value(json!({
            "ID": 7,
            "AddressInfo": {"Title": "Harbour", "AddressLine1": "Pier 4"},
            "Connections": []
        }))
        .unwrap();

        assert_eq!(station.power_output, 0.0);
        assert_eq!(station.connector_type, UNKNOWN_CONNECTOR_TYPE);
    }

    #[test]
    fn test_status_is_maintenance_unless_operational() {
        let base = |flag: Value| {
            normalize_value(json!({
                "ID": 1,
                "AddressInfo": {"Title": "A", "AddressLine1": "B"},
                "StatusType": {"IsOperational": flag}
            }))
            .unwrap()
            .status
        };

        assert_eq!(base(json!(true)), StationStatus::Available);
        assert_eq!(base(json!("TRUE")), StationStatus::Available);
        assert_eq!(base(json!(false)), StationStatus::Maintenance);
        assert_eq!(base(json!(null)), StationStatus::Maintenance);
        assert_eq!(base(json!("yes")), StationStatus::Maintenance);

        let no_status = normalize_value(json!({
            "ID": 1,
            "AddressInfo": {"Title": "A", "AddressLine1": "B"}
        }))
        .unwrap();
        assert_eq!(no_status.status, StationStatus::Maintenance);
    }

    #[test]
    fn test_bad_power_defaults_to_zero() {
        for power in [json!("n/a"), json!(-5.0), json!(null), json!(true)] {
            let station = normalize_value(json!({
                "ID": 1,
                "AddressInfo": {"Title": "A", "AddressLine1": "B"},
                "Connections": [{"PowerKW": power}]
            }))
            .unwrap();
            assert_eq!(station.power_output, 0.0);
        }

        let text_power = normalize_value(json!({
            "ID": 1,
            "AddressInfo": {"Title": "A", "AddressLine1": "B"},
            "Connections": [{"PowerKW": "50"}]
        }))
        .unwrap();
        assert_eq!(text_power.power_output, 50.0);
    }

    #[test]
    fn test_missing_id_fails_record() {
        let err = normalize_value(json!({
            "AddressInfo": {"Title": "A", "AddressLine1": "B"}
        }))
        .unwrap_err();
        assert_eq!(err, NormalizeError::MissingId(None));

        let err = normalize_value(json!({
            "ID": "abc",
            "AddressInfo": {"Title": "A", "AddressLine1": "B"}
        }))
        .unwrap_err();
        assert_eq!(err, NormalizeError::MissingId(Some("abc".to_string())));
    }

    #[test]
    fn test_non_positive_id_fails_record() {
        for (id, text) in [(json!(0), "0"), (json!(-3), "-3"), (json!("-12"), "-12")] {
            let err = normalize_value(json!({
                "ID": id,
                "AddressInfo": {"Title": "A", "AddressLine1": "B"}
            }))
            .unwrap_err();
            assert_eq!(err, NormalizeError::MissingId(Some(text.to_string())));
        }
    }

    #[test]
    fn test_missing_name_or_location_fails_record() {
        let err = normalize_value(json!({
            "ID": 3,
            "AddressInfo": {"AddressLine1": "B"}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingField { id: 3, field: "AddressInfo.Title" }
        );

        let err = normalize_value(json!({"ID": 3, "AddressInfo": {"Title": "A", "AddressLine1": "  "}}))
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingField { id: 3, field: "AddressInfo.AddressLine1" }
        );
    }

    #[test]
    fn test_non_object_record() {
        assert_eq!(normalize_value(json!(12)), Err(NormalizeError::NotAnObject));
    }

    #[test]
    fn test_overlong_name_is_truncated() {
        let station = normalize_value(json!({
            "ID": 9,
            "AddressInfo": {"Title": "é".repeat(150), "AddressLine1": "B"}
        }))
        .unwrap();
        assert_eq!(station.name.chars().count(), MAX_NAME_LEN);
    }
}
