//! Time-series output
//!
//! A poll cycle's [`ReadingSet`] becomes one [`Point`]: a measurement, a
//! `wallbox` tag, a capture timestamp in seconds and the readings as fields in
//! table order. Text values are quoted, numbers stay numbers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::warn;

use crate::query::ReadingSet;
use crate::registers::Value;

pub mod influx;

pub use influx::InfluxSink;

/// Field value in the produced artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Already wrapped in double quotes
    Quoted(String),
    Float(f64),
    Integer(i64),
}

/// One time-series record built from a reading set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    /// Unix timestamp, seconds
    pub time: i64,
    pub fields: Vec<(String, FieldValue)>,
}

impl Point {
    pub fn from_readings(
        measurement: &str,
        wallbox: &str,
        captured_at: DateTime<Utc>,
        readings: &ReadingSet,
    ) -> Self {
        let fields = readings
            .iter()
            .filter_map(|r| {
                let value = match &r.value {
                    Value::Text(s) => FieldValue::Quoted(format!("\"{}\"", s)),
                    // Line protocol has no NaN or infinity.
                    Value::Float(v) if !v.is_finite() => {
                        warn!("Dropping {} from output: value {} is not finite", r.name, v);
                        return None;
                    }
                    Value::Float(v) => FieldValue::Float(*v),
                    Value::U16(v) => FieldValue::Integer(i64::from(*v)),
                    Value::I16(v) => FieldValue::Integer(i64::from(*v)),
                };
                Some((r.name.clone(), value))
            })
            .collect();

        Self {
            measurement: measurement.to_string(),
            tags: vec![("wallbox".to_string(), wallbox.to_string())],
            time: captured_at.timestamp(),
            fields,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as InfluxDB line protocol with second precision.
    ///
    /// Quoted text is written as a string field whose content keeps the
    /// surrounding quotes.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_key(&self.measurement, false);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(key, true), escape_key(value, true));
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape_key(key, true));
            line.push('=');
            match value {
                FieldValue::Quoted(s) => {
                    let _ = write!(line, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""));
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{}i", v);
                }
            }
        }

        let _ = write!(line, " {}", self.time);
        line
    }
}

fn escape_key(s: &str, escape_equals: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ',' || c == ' ' || (escape_equals && c == '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::TypeTag;
    use chrono::TimeZone;

    fn sample() -> ReadingSet {
        let mut readings = ReadingSet::new();
        readings.push("ChargeBoxID", Value::Text("EBX 01".into()), TypeTag::IrStrg25);
        readings.push("CurrentPhase1", Value::Float(6.5), TypeTag::IrFloat);
        readings.push("RemaningTimeBeforeFallback", Value::U16(3600), TypeTag::U16x1);
        readings.push("Offset", Value::I16(-2), TypeTag::S16);
        readings
    }

    fn captured() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_point_keeps_order_and_quotes_text() {
        let point = Point::from_readings("ebox", "10.0.0.7", captured(), &sample());

        assert_eq!(point.time, 1_700_000_000);
        assert_eq!(point.tags, vec![("wallbox".into(), "10.0.0.7".into())]);
        let names: Vec<&str> = point.fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["ChargeBoxID", "CurrentPhase1", "RemaningTimeBeforeFallback", "Offset"]
        );
        assert_eq!(point.fields[0].1, FieldValue::Quoted("\"EBX 01\"".into()));
        assert_eq!(point.fields[1].1, FieldValue::Float(6.5));
        assert_eq!(point.fields[2].1, FieldValue::Integer(3600));
    }

    #[test]
    fn test_line_protocol() {
        let point = Point::from_readings("ebox", "10.0.0.7", captured(), &sample());

        assert_eq!(
            point.to_line_protocol(),
            "ebox,wallbox=10.0.0.7 ChargeBoxID=\"\\\"EBX 01\\\"\",CurrentPhase1=6.5,\
             RemaningTimeBeforeFallback=3600i,Offset=-2i 1700000000"
        );
    }

    #[test]
    fn test_line_protocol_escapes_keys() {
        let mut readings = ReadingSet::new();
        readings.push("a b,c=d", Value::Float(1.0), TypeTag::Float);
        let point = Point::from_readings("my ebox", "box=1", captured(), &readings);

        assert_eq!(
            point.to_line_protocol(),
            "my\\ ebox,wallbox=box\\=1 a\\ b\\,c\\=d=1 1700000000"
        );
    }

    #[test]
    fn test_non_finite_floats_are_dropped() {
        let mut readings = ReadingSet::new();
        readings.push("CurrentPhase1", Value::Float(f64::NAN), TypeTag::IrFloat);
        readings.push("Energy", Value::Float(f64::INFINITY), TypeTag::U32);
        readings.push("CurrentPhase2", Value::Float(6.0), TypeTag::IrFloat);

        let point = Point::from_readings("ebox", "h", captured(), &readings);

        assert_eq!(
            point.fields,
            vec![("CurrentPhase2".to_string(), FieldValue::Float(6.0))]
        );
        assert_eq!(point.to_line_protocol(), "ebox,wallbox=h CurrentPhase2=6 1700000000");
    }

    #[test]
    fn test_empty_reading_set() {
        let point = Point::from_readings("ebox", "h", captured(), &ReadingSet::new());
        assert!(point.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let point = Point::from_readings("ebox", "h", captured(), &sample());
        let json = serde_json::to_value(&point).unwrap();

        assert_eq!(json["measurement"], "ebox");
        assert_eq!(json["time"], 1_700_000_000);
        assert_eq!(json["fields"][1], serde_json::json!(["CurrentPhase1", 6.5]));
    }
}
