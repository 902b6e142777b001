//! eBox Modbus - wallbox register poller and setpoint writer
//!
//! Reads the eBox register map over Modbus TCP, decodes every field according
//! to its wire type and hands the readings to InfluxDB. Also writes per-phase
//! current limits to the charging station.

pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod modbus;
pub mod query;
pub mod registers;
pub mod runner;
pub mod sink;
pub mod write;
