//! Error taxonomy for polling and writing

use crate::registers::{Bank, TypeTag};

/// A field in the address table carries a type tag the codec does not know.
///
/// Reported per field; the poll cycle skips the field and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field {field} at address {address}: unknown type tag {tag:?}")]
pub struct ConfigurationError {
    pub field: String,
    pub address: u16,
    pub tag: String,
}

/// Connection, request or response failure from the device.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid device address {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Modbus(#[from] crate::modbus::client::ModbusError),
    #[error("session is closed")]
    Closed,
}

/// The words returned by the device cannot be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{tag} needs {expected} registers, got {actual}")]
    ShortRead {
        tag: TypeTag,
        expected: u16,
        actual: usize,
    },
    #[error("{tag} is read from the {expected} bank, not the {actual} bank")]
    BankMismatch {
        tag: TypeTag,
        expected: Bank,
        actual: Bank,
    },
}

/// Anything that aborts a poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("reading {field} at address {address}: {source}")]
    Transport {
        field: String,
        address: u16,
        #[source]
        source: TransportError,
    },
    #[error("decoding {field} at address {address}: {source}")]
    Decode {
        field: String,
        address: u16,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("setpoint write at address {address} failed: {source}")]
    Transport {
        address: u16,
        #[source]
        source: TransportError,
    },
}
