//! Current-limit setpoint write

use tracing::info;

use crate::codec::{self, SETPOINT_ADDRESS};
use crate::error::WriteError;
use crate::metrics;
use crate::modbus::RegisterTransport;

/// The exact request sent for a setpoint write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub address: u16,
    pub payload: Vec<u8>,
}

impl WriteRequest {
    pub fn registers(&self) -> Vec<u16> {
        codec::payload_to_registers(&self.payload)
    }
}

/// Outcome of a successful setpoint write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteResult {
    pub address: u16,
    pub registers: u16,
    pub phases: [f32; 3],
}

/// Pushes per-phase current limits to the wallbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteEngine;

impl WriteEngine {
    pub fn new() -> Self {
        Self
    }

    /// Build the request for the given phase limits.
    pub fn request(&self, phase1: f32, phase2: f32, phase3: f32) -> WriteRequest {
        WriteRequest {
            address: SETPOINT_ADDRESS,
            payload: codec::encode_setpoint(phase1, phase2, phase3),
        }
    }

    /// Write the phase limits in a single multi-register request. No retry.
    pub async fn run<T: RegisterTransport>(
        &self,
        transport: &mut T,
        phase1: f32,
        phase2: f32,
        phase3: f32,
    ) -> Result<WriteResult, WriteError> {
        let request = self.request(phase1, phase2, phase3);
        let registers = request.registers();

        if let Err(source) = transport
            .write_registers(request.address, &registers)
            .await
        {
            metrics::record_setpoint_write(false);
            return Err(WriteError::Transport {
                address: request.address,
                source,
            });
        }

        metrics::record_setpoint_write(true);
        info!(
            "Wrote setpoint {}/{}/{} A to {} registers at {}",
            phase1,
            phase2,
            phase3,
            registers.len(),
            request.address
        );

        Ok(WriteResult {
            address: request.address,
            registers: registers.len() as u16,
            phases: [phase1, phase2, phase3],
        })
    }
}
