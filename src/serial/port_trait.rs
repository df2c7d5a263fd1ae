//! Byte-level seam under [`MotorLink`](super::MotorLink).
//!
//! The link only ever writes whole frames, flushes them and finally closes
//! the port, so that is all the trait exposes. Tests swap in
//! `mocks::MockSerialPort` to capture frames and inject failures.

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialStream;

/// Write side of the motor controller port.
#[async_trait]
pub trait SerialPortIO: Send {
    /// Queue one encoded frame.
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push queued frames to the controller.
    async fn flush(&mut self) -> io::Result<()>;

    /// Flush, then release the device.
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// The real motor controller port.
pub struct SerialStreamPort {
    stream: SerialStream,
}

impl SerialStreamPort {
    pub fn new(stream: SerialStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl SerialPortIO for SerialStreamPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(&mut self.stream, data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(&mut self.stream).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        AsyncWriteExt::shutdown(&mut self.stream).await
    }
}
