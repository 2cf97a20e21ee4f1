// Telemetry document domain model
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One machine-cycle or status record as returned by the document store.
///
/// Every field is optional; anything besides `deviceId` and `timestamp` lands
/// in `fields`, keyed by the store's short codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryDocument {
    #[serde(rename = "deviceId", default)]
    pub device_id: String,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Field codes used to read values out of a document.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FieldCodes {
    pub units: String,
    pub rejections: String,
    pub reason: String,
    pub downtime: String,
    pub status: String,
    pub mold: String,
    pub target: String,
    pub fallback_timestamps: Vec<String>,
    pub mapping_name: String,
    pub mapping_cycle_time: String,
}

impl Default for FieldCodes {
    fn default() -> Self {
        Self {
            units: "unitsProduced".to_string(),
            rejections: "rejectionCount".to_string(),
            reason: "rejectionReason".to_string(),
            downtime: "downtimeSeconds".to_string(),
            status: "statusIndicator".to_string(),
            mold: "moldIdentifier".to_string(),
            target: "targetUnits".to_string(),
            fallback_timestamps: vec!["ts".to_string(), "time".to_string(), "createdAt".to_string()],
            mapping_name: "moldName".to_string(),
            mapping_cycle_time: "cycleTimeSeconds".to_string(),
        }
    }
}

impl TelemetryDocument {
    /// Numeric value of a field. Numbers and numeric-looking strings are
    /// accepted; anything missing, blank or non-finite is `None`.
    pub fn number(&self, code: &str) -> Option<f64> {
        coerce_number(self.fields.get(code)?)
    }

    /// Text value of a field. Scalars are rendered as text so that a status
    /// sent as `0` or `0.0` reads the same as `"0"`.
    pub fn text(&self, code: &str) -> Option<String> {
        match self.fields.get(code)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some((f as i64).to_string()),
                _ => Some(n.to_string()),
            },
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether the mold field, trimmed, equals the trimmed selection key.
    pub fn matches_mold(&self, code: &str, mold: &str) -> bool {
        self.text(code)
            .map(|value| value.trim() == mold.trim())
            .unwrap_or(false)
    }

    /// Resolve the document instant from the primary timestamp, then from the
    /// fallback fields in order.
    pub fn resolve_timestamp(
        &self,
        fallbacks: &[String],
        offset: FixedOffset,
    ) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_ref()
            .and_then(|value| parse_instant(value, offset))
            .or_else(|| {
                fallbacks
                    .iter()
                    .filter_map(|name| self.fields.get(name))
                    .find_map(|value| parse_instant(value, offset))
            })
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse an instant from epoch milliseconds, RFC 3339, or a naive
/// `YYYY-MM-DD HH:MM:SS` string interpreted in plant local time.
pub fn parse_instant(value: &Value, offset: FixedOffset) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ms) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .and_then(|naive| offset.from_local_datetime(&naive).single())
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

#[cfg(test)]
impl TelemetryDocument {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            ..Self::default()
        }
    }

    pub fn at(mut self, rfc3339: &str) -> Self {
        self.timestamp = Some(Value::String(rfc3339.to_string()));
        self
    }

    pub fn with(mut self, code: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(code.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_number_coercion() {
        let doc = TelemetryDocument::new("M1")
            .with("a", 12)
            .with("b", " 7.5 ")
            .with("c", "")
            .with("d", "abc")
            .with("e", "0")
            .with("f", Value::Null)
            .with("g", "NaN");

        assert_eq!(doc.number("a"), Some(12.0));
        assert_eq!(doc.number("b"), Some(7.5));
        assert_eq!(doc.number("c"), None);
        assert_eq!(doc.number("d"), None);
        assert_eq!(doc.number("e"), Some(0.0));
        assert_eq!(doc.number("f"), None);
        assert_eq!(doc.number("g"), None);
        assert_eq!(doc.number("missing"), None);
    }

    #[test]
    fn test_integral_numbers_render_without_fraction() {
        let doc = TelemetryDocument::new("M1")
            .with("a", 0.0)
            .with("b", 1.0)
            .with("c", 2.5)
            .with("d", 7);

        assert_eq!(doc.text("a").as_deref(), Some("0"));
        assert_eq!(doc.text("b").as_deref(), Some("1"));
        assert_eq!(doc.text("c").as_deref(), Some("2.5"));
        assert_eq!(doc.text("d").as_deref(), Some("7"));
    }

    #[test]
    fn test_deserialize_flattens_fields() {
        let doc: TelemetryDocument = serde_json::from_value(json!({
            "deviceId": "M1",
            "timestamp": "2025-07-01T10:00:00Z",
            "moldIdentifier": " TRAY-A ",
            "unitsProduced": "100"
        }))
        .unwrap();

        assert_eq!(doc.device_id, "M1");
        assert!(doc.matches_mold("moldIdentifier", "TRAY-A"));
        assert!(!doc.matches_mold("moldIdentifier", "tray-a"));
        assert_eq!(doc.number("unitsProduced"), Some(100.0));
    }

    #[test]
    fn test_resolve_timestamp_formats() {
        let fallbacks = vec!["ts".to_string()];
        let expected = Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap();

        let rfc = TelemetryDocument::new("M1").at("2025-07-01T10:00:00Z");
        assert_eq!(rfc.resolve_timestamp(&fallbacks, utc()), Some(expected));

        let millis = TelemetryDocument::new("M1").with("ts", expected.timestamp_millis());
        assert_eq!(millis.resolve_timestamp(&fallbacks, utc()), Some(expected));

        let plant = FixedOffset::east_opt(2 * 3600).unwrap();
        let naive = TelemetryDocument::new("M1").at("2025-07-01 12:00:00");
        assert_eq!(naive.resolve_timestamp(&fallbacks, plant), Some(expected));

        let broken = TelemetryDocument::new("M1").at("yesterday");
        assert_eq!(broken.resolve_timestamp(&fallbacks, utc()), None);
    }
}
