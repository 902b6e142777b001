//! Poll cycle over the register table

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{QueryError, TransportError};
use crate::metrics;
use crate::modbus::RegisterTransport;
use crate::registers::{AddressTable, FieldDescriptor, TypeTag, Value};

/// One decoded field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub name: String,
    pub value: Value,
    #[serde(serialize_with = "serialize_tag")]
    pub type_tag: TypeTag,
}

fn serialize_tag<S: serde::Serializer>(tag: &TypeTag, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(tag.as_str())
}

/// Values produced by one poll cycle, in register table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReadingSet {
    readings: Vec<Reading>,
}

impl ReadingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value, type_tag: TypeTag) {
        self.readings.push(Reading {
            name: name.into(),
            value,
            type_tag,
        });
    }

    /// Look up a reading by field name.
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.readings.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl<'a> IntoIterator for &'a ReadingSet {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

/// A poll cycle that stopped early.
///
/// `partial` holds every field decoded before the failure.
#[derive(Debug, thiserror::Error)]
#[error("poll cycle aborted after {} fields: {source}", .partial.len())]
pub struct CycleError {
    pub partial: ReadingSet,
    #[source]
    pub source: QueryError,
}

/// Reads every field of an [`AddressTable`] from a device.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    table: AddressTable,
}

impl QueryEngine {
    pub fn new(table: AddressTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    /// Run one poll cycle.
    ///
    /// Fields with an unknown type tag are logged and skipped. The first
    /// transport or decode failure ends the cycle; fields after it are not
    /// requested.
    pub async fn run<T: RegisterTransport>(
        &self,
        transport: &mut T,
    ) -> Result<ReadingSet, CycleError> {
        let started = Instant::now();
        let mut readings = ReadingSet::new();

        for field in &self.table {
            let tag = match field.type_tag() {
                Ok(tag) => tag,
                Err(e) => {
                    warn!("Skipping field: {}", e);
                    metrics::record_skipped_field(&field.name);
                    continue;
                }
            };
            let layout = tag.layout();

            let words = match transport
                .read_registers(layout.bank, field.address, layout.registers)
                .await
            {
                Ok(words) => words,
                Err(source) => {
                    metrics::record_field_read(&field.name, false);
                    return Err(abort(readings, transport_error(field, source), started));
                }
            };

            let value = match codec::decode(layout.bank, tag, &words) {
                Ok(value) => value,
                Err(source) => {
                    metrics::record_field_read(&field.name, false);
                    let err = QueryError::Decode {
                        field: field.name.clone(),
                        address: field.address,
                        source,
                    };
                    return Err(abort(readings, err, started));
                }
            };

            metrics::record_field_read(&field.name, true);
            debug!("{} ({}) = {}", field.name, tag, value);
            readings.push(field.name.clone(), value, tag);
        }

        metrics::record_poll_cycle(true, started.elapsed());
        Ok(readings)
    }
}

fn transport_error(field: &FieldDescriptor, source: TransportError) -> QueryError {
    QueryError::Transport {
        field: field.name.clone(),
        address: field.address,
        source,
    }
}

fn abort(partial: ReadingSet, source: QueryError, started: Instant) -> CycleError {
    metrics::record_poll_cycle(false, started.elapsed());
    CycleError { partial, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{Bank, FieldDescriptor};
    use std::collections::HashMap;

    /// Device double answering from a fixed register image.
    #[derive(Default)]
    struct RegisterImage {
        holding: HashMap<u16, u16>,
        input: HashMap<u16, u16>,
        requests: Vec<(Bank, u16, u16)>,
        fail_on_request: Option<usize>,
    }

    impl RegisterTransport for RegisterImage {
        async fn read_registers(
            &mut self,
            bank: Bank,
            address: u16,
            count: u16,
        ) -> Result<Vec<u16>, TransportError> {
            self.requests.push((bank, address, count));
            if self.fail_on_request == Some(self.requests.len()) {
                return Err(TransportError::Closed);
            }
            let map = match bank {
                Bank::Holding => &self.holding,
                Bank::Input => &self.input,
            };
            Ok((address..address + count)
                .map(|a| map.get(&a).copied().unwrap_or(0))
                .collect())
        }

        async fn write_registers(&mut self, _: u16, _: &[u16]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn float_big(value: f32) -> [u16; 2] {
        let bits = value.to_bits();
        [(bits >> 16) as u16, bits as u16]
    }

    #[test]
    fn test_requests_follow_layout() {
        let table = AddressTable::new(vec![
            FieldDescriptor::new(0, "ChargeBoxID", "IR_Strg25"),
            FieldDescriptor::new(1006, "CurrentPhase1", "IR_Float"),
            FieldDescriptor::new(1012, "MaxCurrentPhase1", "Float"),
            FieldDescriptor::new(1024, "RemaningTimeBeforeFallback", "U16_1"),
            FieldDescriptor::new(2000, "Energy", "U32"),
        ]);
        let mut device = RegisterImage::default();

        let readings = tokio_test::block_on(QueryEngine::new(table).run(&mut device)).unwrap();

        assert_eq!(readings.len(), 5);
        assert_eq!(
            device.requests,
            vec![
                (Bank::Input, 0, 25),
                (Bank::Input, 1006, 2),
                (Bank::Holding, 1012, 2),
                (Bank::Holding, 1024, 1),
                (Bank::Holding, 2000, 2),
            ]
        );
    }

    #[test]
    fn test_values_are_decoded_per_field() {
        let mut device = RegisterImage::default();
        let [hi, lo] = float_big(6.5);
        device.input.insert(1006, hi);
        device.input.insert(1007, lo);
        device.holding.insert(1024, 3600);
        device.holding.insert(1030, (-12_i16) as u16);

        let table = AddressTable::new(vec![
            FieldDescriptor::new(1006, "CurrentPhase1", "IR_Float"),
            FieldDescriptor::new(1024, "RemaningTimeBeforeFallback", "U16_1"),
            FieldDescriptor::new(1030, "Offset", "S16"),
        ]);

        let readings = tokio_test::block_on(QueryEngine::new(table).run(&mut device)).unwrap();

        assert_eq!(readings.get("CurrentPhase1").unwrap().value, Value::Float(6.5));
        assert_eq!(
            readings.get("RemaningTimeBeforeFallback").unwrap().value,
            Value::U16(3600)
        );
        let offset = readings.get("Offset").unwrap();
        assert_eq!(offset.value, Value::I16(-12));
        assert_eq!(offset.type_tag, TypeTag::S16);
    }

    #[test]
    fn test_unknown_tag_is_skipped_without_request() {
        let table = AddressTable::new(vec![
            FieldDescriptor::new(175, "ModbusTableVersion", "IR_U16_1"),
            FieldDescriptor::new(500, "Broken", "Double"),
            FieldDescriptor::new(1028, "Availability", "U16_1"),
        ]);
        let mut device = RegisterImage::default();

        let readings = tokio_test::block_on(QueryEngine::new(table).run(&mut device)).unwrap();

        assert_eq!(
            readings.names().collect::<Vec<_>>(),
            vec!["ModbusTableVersion", "Availability"]
        );
        assert_eq!(device.requests.len(), 2);
    }

    #[test]
    fn test_failure_keeps_partial_readings() {
        let table = AddressTable::new(
            (0..6)
                .map(|i| FieldDescriptor::new(i, format!("F{i}"), "U16_1"))
                .collect(),
        );
        let mut device = RegisterImage {
            fail_on_request: Some(3),
            ..Default::default()
        };

        let err = tokio_test::block_on(QueryEngine::new(table).run(&mut device)).unwrap_err();

        assert_eq!(err.partial.names().collect::<Vec<_>>(), vec!["F0", "F1"]);
        assert_eq!(device.requests.len(), 3);
        assert!(matches!(
            err.source,
            QueryError::Transport { ref field, address: 2, .. } if field == "F2"
        ));
    }

    #[test]
    fn test_short_response_aborts_cycle() {
        struct Truncating;

        impl RegisterTransport for Truncating {
            async fn read_registers(
                &mut self,
                _: Bank,
                _: u16,
                count: u16,
            ) -> Result<Vec<u16>, TransportError> {
                Ok(vec![0; usize::from(count) - 1])
            }

            async fn write_registers(&mut self, _: u16, _: &[u16]) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let table = AddressTable::new(vec![
            FieldDescriptor::new(1012, "MaxCurrentPhase1", "Float"),
            FieldDescriptor::new(1014, "MaxCurrentPhase2", "Float"),
        ]);

        let err = tokio_test::block_on(QueryEngine::new(table).run(&mut Truncating)).unwrap_err();

        assert!(err.partial.is_empty());
        assert!(matches!(err.source, QueryError::Decode { address: 1012, .. }));
    }

    #[test]
    fn test_reading_set_serializes_in_order() {
        let mut readings = ReadingSet::new();
        readings.push("Manufacturer", Value::Text("innogy".into()), TypeTag::IrStrg25);
        readings.push("CurrentPhase1", Value::Float(6.5), TypeTag::IrFloat);

        let json = serde_json::to_value(&readings).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "Manufacturer", "value": "innogy", "type_tag": "IR_Strg25"},
                {"name": "CurrentPhase1", "value": 6.5, "type_tag": "IR_Float"},
            ])
        );
    }
}
