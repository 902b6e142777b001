//! Modbus client context

use tokio_modbus::client::Context as TcpContext;
use tokio_modbus::prelude::*;
use tokio_modbus::ExceptionCode;

/// Error type for Modbus operations
#[derive(Debug, thiserror::Error)]
pub enum ModbusError {
    #[error("Modbus exception: {0:?}")]
    Exception(ExceptionCode),
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_modbus::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connected TCP client
pub struct Context {
    inner: TcpContext,
}

impl Context {
    pub fn new(inner: TcpContext) -> Self {
        Self { inner }
    }

    pub async fn read_holding_registers(
        &mut self,
        addr: u16,
        cnt: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let result = self.inner.read_holding_registers(addr, cnt).await?;
        result.map_err(ModbusError::Exception)
    }

    pub async fn read_input_registers(
        &mut self,
        addr: u16,
        cnt: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let result = self.inner.read_input_registers(addr, cnt).await?;
        result.map_err(ModbusError::Exception)
    }

    pub async fn write_multiple_registers(
        &mut self,
        addr: u16,
        values: &[u16],
    ) -> Result<(), ModbusError> {
        let result = self.inner.write_multiple_registers(addr, values).await?;
        result.map_err(ModbusError::Exception)
    }

    pub async fn disconnect(mut self) -> Result<(), ModbusError> {
        self.inner.disconnect().await?;
        Ok(())
    }
}
