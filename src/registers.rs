//! Register map of the eBox wallbox
//!
//! Every field the poller knows about is described by a [`FieldDescriptor`]
//! (address, name, wire type). The wire type ([`TypeTag`]) selects the register
//! bank, the number of registers and the word order through [`TypeTag::layout`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Register address space on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    /// Holding registers (function code 3).
    Holding,
    /// Input registers (function code 4).
    Input,
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bank::Holding => "holding",
            Bank::Input => "input",
        })
    }
}

/// Order of 16-bit words when two registers form a 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    /// First register holds the high word.
    Big,
    /// First register holds the low word.
    Little,
}

/// What the registers of a field decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// ASCII text, two bytes per register.
    Text,
    /// IEEE 754 single precision, optionally rounded to two decimals.
    Float { round: bool },
    /// Unsigned 16-bit integer taken from the first register.
    U16,
    /// Signed 16-bit integer taken from the first register.
    I16,
}

/// Wire layout of a type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub bank: Bank,
    pub registers: u16,
    pub word_order: WordOrder,
    pub kind: Kind,
}

impl Layout {
    const fn new(bank: Bank, registers: u16, word_order: WordOrder, kind: Kind) -> Self {
        Self {
            bank,
            registers,
            word_order,
            kind,
        }
    }
}

/// Wire type of a field as written in the register table.
///
/// The names follow the device documentation, including the ones that do not
/// describe what is actually decoded (`U32` and `R32` are floats, `U16_2` only
/// looks at its first register).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
pub enum TypeTag {
    #[strum(serialize = "Strg8")]
    Strg8,
    #[strum(serialize = "Strg16")]
    Strg16,
    #[strum(serialize = "Strg25")]
    Strg25,
    #[strum(serialize = "Strg32")]
    Strg32,
    #[strum(serialize = "IR_Strg25")]
    IrStrg25,
    #[strum(serialize = "Float")]
    Float,
    #[strum(serialize = "IR_Float")]
    IrFloat,
    #[strum(serialize = "U16_1")]
    U16x1,
    #[strum(serialize = "IR_U16_1")]
    IrU16x1,
    #[strum(serialize = "U16_2")]
    U16x2,
    #[strum(serialize = "R32")]
    R32,
    #[strum(serialize = "U32")]
    U32,
    #[strum(serialize = "S16")]
    S16,
}

impl TypeTag {
    /// Register bank, register count, word order and decoded kind.
    pub const fn layout(self) -> Layout {
        use Bank::{Holding, Input};
        use WordOrder::{Big, Little};
        match self {
            TypeTag::Strg8 => Layout::new(Holding, 8, Big, Kind::Text),
            TypeTag::Strg16 => Layout::new(Holding, 16, Big, Kind::Text),
            TypeTag::Strg25 => Layout::new(Holding, 25, Big, Kind::Text),
            TypeTag::Strg32 => Layout::new(Holding, 32, Big, Kind::Text),
            TypeTag::IrStrg25 => Layout::new(Input, 25, Big, Kind::Text),
            TypeTag::Float => Layout::new(Holding, 2, Big, Kind::Float { round: true }),
            TypeTag::IrFloat => Layout::new(Input, 2, Big, Kind::Float { round: true }),
            TypeTag::U16x1 => Layout::new(Holding, 1, Little, Kind::U16),
            TypeTag::IrU16x1 => Layout::new(Input, 1, Little, Kind::U16),
            TypeTag::U16x2 => Layout::new(Holding, 2, Little, Kind::U16),
            TypeTag::R32 => Layout::new(Holding, 2, Little, Kind::Float { round: false }),
            TypeTag::U32 => Layout::new(Holding, 2, Little, Kind::Float { round: false }),
            TypeTag::S16 => Layout::new(Holding, 1, Little, Kind::I16),
        }
    }

    pub const fn bank(self) -> Bank {
        self.layout().bank
    }

    pub const fn registers(self) -> u16 {
        self.layout().registers
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Decoded register value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Float(f64),
    U16(u16),
    I16(i16),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Text(_) => None,
            Value::Float(v) => Some(*v),
            Value::U16(v) => Some(f64::from(*v)),
            Value::I16(v) => Some(f64::from(*v)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Float(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
        }
    }
}

/// One entry of the register table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Start register address
    pub address: u16,
    /// Field name, used as the output key
    pub name: String,
    /// Wire type as written in the device documentation, e.g. "IR_Float"
    #[serde(rename = "type")]
    pub type_tag: String,
}

impl FieldDescriptor {
    pub fn new(address: u16, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Resolve the textual type tag.
    pub fn type_tag(&self) -> Result<TypeTag, ConfigurationError> {
        TypeTag::from_str(&self.type_tag).map_err(|_| ConfigurationError {
            field: self.name.clone(),
            address: self.address,
            tag: self.type_tag.clone(),
        })
    }
}

/// Ordered, immutable catalogue of fields to poll.
///
/// The order is the order registers are requested from the device and the
/// order of the resulting [`ReadingSet`](crate::query::ReadingSet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    fields: Vec<FieldDescriptor>,
}

impl AddressTable {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// The register map of the Innogy eBox Professional.
    pub fn ebox() -> Self {
        const FIELDS: &[(u16, &str, &str)] = &[
            (0, "ChargeBoxID", "IR_Strg25"),
            (25, "SerialNumber", "IR_Strg25"),
            (50, "ActiveProtocol", "IR_Strg25"),
            (100, "Manufacturer", "IR_Strg25"),
            (125, "PlatformType", "IR_Strg25"),
            (150, "ProductType", "IR_Strg25"),
            (175, "ModbusTableVersion", "IR_U16_1"),
            (200, "FirmwareVersion", "IR_Strg25"),
            (225, "NumberOfSockets", "IR_U16_1"),
            (250, "OcppState", "IR_U16_1"),
            (275, "Socket1Mode3State", "IR_Strg25"),
            (300, "Socket1CableState", "IR_U16_1"),
            (1000, "ActualMaxCurrentPhase1", "IR_Float"),
            (1002, "ActualMaxCurrentPhase2", "IR_Float"),
            (1004, "ActualMaxCurrentPhase3", "IR_Float"),
            (1006, "CurrentPhase1", "IR_Float"),
            (1008, "CurrentPhase2", "IR_Float"),
            (1010, "CurrentPhase3", "IR_Float"),
            (1012, "MaxCurrentPhase1", "Float"),
            (1014, "MaxCurrentPhase2", "Float"),
            (1016, "MaxCurrentPhase3", "Float"),
            (1018, "FallbackMaxCurrent1", "Float"),
            (1020, "FallbackMaxCurrent2", "Float"),
            (1022, "FallbackMaxCurrent3", "Float"),
            // Field key kept as the device tooling spells it; existing series depend on it.
            (1024, "RemaningTimeBeforeFallback", "U16_1"),
            (1025, "StationPhaseSetupL1", "U16_1"),
            (1026, "StationPhaseSetupL2", "U16_1"),
            (1027, "StationPhaseSetupL3", "U16_1"),
            (1028, "Availability", "U16_1"),
        ];

        Self::new(
            FIELDS
                .iter()
                .map(|&(address, name, tag)| FieldDescriptor::new(address, name, tag))
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for AddressTable {
    fn default() -> Self {
        Self::ebox()
    }
}

impl<'a> IntoIterator for &'a AddressTable {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
