// src/communication/serial.rs - Hardware serial port via serial2-tokio
use async_trait::async_trait;
use serial2_tokio::SerialPort;
use std::io;
use std::sync::Arc;
use winder_shared::{SerialInterface, SerialTransport, TransportError};

/// A named serial device opened at a fixed baud rate.
#[derive(Debug, Clone)]
pub struct SerialPortInterface {
    port_name: String,
    baud_rate: u32,
}

impl SerialPortInterface {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

/// Serial devices present on this machine.
pub fn available_ports() -> Vec<String> {
    match SerialPort::available_ports() {
        Ok(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            vec![]
        }
    }
}

struct SerialLink {
    port: SerialPort,
}

#[async_trait]
impl SerialTransport for SerialLink {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }

    async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf).await
    }
}

#[async_trait]
impl SerialInterface for SerialPortInterface {
    async fn open(&self) -> Result<Arc<dyn SerialTransport>, TransportError> {
        let port = SerialPort::open(&self.port_name, self.baud_rate).map_err(|source| {
            TransportError::Open {
                port: self.port_name.clone(),
                source,
            }
        })?;
        tracing::debug!("Opened {} at {} baud", self.port_name, self.baud_rate);
        let transport: Arc<dyn SerialTransport> = Arc::new(SerialLink { port });
        Ok(transport)
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.port_name, self.baud_rate)
    }
}
