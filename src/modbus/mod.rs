//! Modbus TCP session handling
//!
//! A [`Session`] owns one TCP connection to the wallbox for the duration of a
//! single poll or write. There is no pooling and no reconnect: a failed
//! request is reported and the caller opens a new session next time.

use std::net::SocketAddr;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::TransportError;
use crate::registers::Bank;

pub mod client;

/// Register-level access to a device.
///
/// Implemented by [`Session`] for the real wallbox; the engines only depend on
/// this trait.
#[allow(async_fn_in_trait)]
pub trait RegisterTransport {
    /// Read `count` registers starting at `address` from `bank`.
    async fn read_registers(
        &mut self,
        bank: Bank,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// Write `values` to consecutive holding registers starting at `address`.
    async fn write_registers(&mut self, address: u16, values: &[u16])
        -> Result<(), TransportError>;
}

/// Connection to one device
pub struct Session {
    peer: SocketAddr,
    context: Option<client::Context>,
}

impl Session {
    /// Connect to the device described by `config`.
    pub async fn open(config: &DeviceConfig) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", config.host, config.port);
        let peer: SocketAddr = match addr.parse() {
            Ok(peer) => peer,
            Err(_) => tokio::net::lookup_host(&addr)
                .await
                .map_err(|source| TransportError::Connect {
                    addr: addr.clone(),
                    source,
                })?
                .next()
                .ok_or_else(|| TransportError::InvalidAddress(addr.clone()))?,
        };

        info!("Connecting to Modbus TCP: {} (unit {})", peer, config.unit_id);

        let ctx = tcp::connect_slave(peer, Slave(config.unit_id))
            .await
            .map_err(|source| TransportError::Connect { addr, source })?;

        Ok(Self {
            peer,
            context: Some(client::Context::new(ctx)),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Check if the connection is still held
    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    /// Release the connection. Calling it again is a no-op.
    pub async fn close(&mut self) {
        let Some(ctx) = self.context.take() else {
            return;
        };
        match ctx.disconnect().await {
            Ok(()) => debug!("Disconnected from {}", self.peer),
            Err(e) => warn!("Error while disconnecting from {}: {}", self.peer, e),
        }
    }

    fn context(&mut self) -> Result<&mut client::Context, TransportError> {
        self.context.as_mut().ok_or(TransportError::Closed)
    }
}

impl RegisterTransport for Session {
    async fn read_registers(
        &mut self,
        bank: Bank,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let ctx = self.context()?;
        debug!("Reading {} {} registers from address {}", count, bank, address);

        let words = match bank {
            Bank::Holding => ctx.read_holding_registers(address, count).await?,
            Bank::Input => ctx.read_input_registers(address, count).await?,
        };
        Ok(words)
    }

    async fn write_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        let ctx = self.context()?;
        debug!("Writing {} registers at address {}", values.len(), address);

        ctx.write_multiple_registers(address, values).await?;
        Ok(())
    }
}
