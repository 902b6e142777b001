//! Register codec
//!
//! Turns raw register words into [`Value`]s according to a [`TypeTag`] layout,
//! and builds the byte payload for the current-limit setpoint write.
//!
//! Byte order inside a register is always big-endian. Word order depends on the
//! tag: the float and string types are big-endian, the integer types plus `R32`
//! and `U32` are little-endian. That is how the device firmware lays them out
//! and it is reproduced as-is.

use crate::error::DecodeError;
use crate::registers::{Bank, Kind, TypeTag, Value, WordOrder};

/// First register of the setpoint block (`MaxCurrentPhase1`).
pub const SETPOINT_ADDRESS: u16 = 1012;

/// Fallback current applied to every phase when the controller goes silent.
pub const FALLBACK_CURRENT_AMPS: f32 = 32.0;

/// Seconds without a new setpoint before the fallback current applies.
pub const FALLBACK_TIMEOUT_SECS: u16 = 3600;

/// Size of the setpoint payload: six floats, one u16 and one zero pad
/// register, 14 registers in total.
pub const SETPOINT_PAYLOAD_LEN: usize = 6 * 4 + 2 + 2;

/// Registers covered by the setpoint payload.
pub const SETPOINT_REGISTERS: u16 = (SETPOINT_PAYLOAD_LEN / 2) as u16;

/// Decode the words read for a field of type `tag` from `bank`.
///
/// Exactly `tag.registers()` words are consumed; anything after them is
/// ignored.
pub fn decode(bank: Bank, tag: TypeTag, words: &[u16]) -> Result<Value, DecodeError> {
    let layout = tag.layout();
    if bank != layout.bank {
        return Err(DecodeError::BankMismatch {
            tag,
            expected: layout.bank,
            actual: bank,
        });
    }

    let count = usize::from(layout.registers);
    let words = words.get(..count).ok_or(DecodeError::ShortRead {
        tag,
        expected: layout.registers,
        actual: words.len(),
    })?;

    let value = match layout.kind {
        Kind::Text => Value::Text(decode_text(words)),
        Kind::Float { round } => {
            let raw = f64::from(f32::from_bits(join_words(words, layout.word_order)));
            Value::Float(if round { round2(raw) } else { raw })
        }
        // 16-bit values only ever look at the first register, so word order
        // has nothing to act on.
        Kind::U16 => Value::U16(words[0]),
        Kind::I16 => Value::I16(words[0] as i16),
    };

    Ok(value)
}

/// Build the 32-bit pattern of a two-register value.
fn join_words(words: &[u16], order: WordOrder) -> u32 {
    let (high, low) = match order {
        WordOrder::Big => (words[0], words[1]),
        WordOrder::Little => (words[1], words[0]),
    };
    (u32::from(high) << 16) | u32::from(low)
}

fn decode_text(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Two decimals, exact halves to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Encode the current-limit setpoint block.
///
/// Layout: the three phase limits, three fallback limits of
/// [`FALLBACK_CURRENT_AMPS`], [`FALLBACK_TIMEOUT_SECS`] as u16, then one zero
/// register. Floats are big-endian bytes in big-endian word order. The pad
/// also clears the register after the timeout (`StationPhaseSetupL1`).
pub fn encode_setpoint(phase1: f32, phase2: f32, phase3: f32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(SETPOINT_PAYLOAD_LEN);
    for amps in [
        phase1,
        phase2,
        phase3,
        FALLBACK_CURRENT_AMPS,
        FALLBACK_CURRENT_AMPS,
        FALLBACK_CURRENT_AMPS,
    ] {
        payload.extend_from_slice(&amps.to_be_bytes());
    }
    payload.extend_from_slice(&FALLBACK_TIMEOUT_SECS.to_be_bytes());
    payload.resize(SETPOINT_PAYLOAD_LEN, 0);
    payload
}

/// Pair payload bytes into big-endian register words.
///
/// An odd trailing byte is padded with zero.
pub fn payload_to_registers(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}
