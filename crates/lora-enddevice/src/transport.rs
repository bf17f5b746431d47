//! Serial transport.
//!
//! A [`SerialLink`] is a pair of byte channels plus an open flag. The driver
//! never touches the port directly: [`open`] spawns a reader thread and a
//! writer thread around a `serialport` handle and hands back the channel end,
//! while [`SerialLink::pair`] hands back both ends so a test or simulator can
//! play the radio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{DriverError, DriverResult};

/// Driver end of a byte link to the radio.
#[derive(Debug)]
pub struct SerialLink {
    writer: LinkWriter,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl SerialLink {
    /// Create a connected in-memory link.
    ///
    /// Bytes written by the driver arrive at the [`LinkPeer`], and bytes the
    /// peer sends arrive at the driver.
    pub fn pair() -> (SerialLink, LinkPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let link = SerialLink {
            writer: LinkWriter {
                outbound: out_tx,
                open: open.clone(),
            },
            inbound: in_rx,
        };
        let peer = LinkPeer {
            to_driver: in_tx,
            from_driver: out_rx,
            open,
        };
        (link, peer)
    }

    /// Check whether the link is open.
    pub fn is_open(&self) -> bool {
        self.writer.is_open()
    }

    /// Split into the write half and the inbound byte stream.
    pub fn into_parts(self) -> (LinkWriter, mpsc::UnboundedReceiver<Vec<u8>>) {
        (self.writer, self.inbound)
    }
}

/// Write half of a [`SerialLink`].
#[derive(Debug, Clone)]
pub struct LinkWriter {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    open: Arc<AtomicBool>,
}

impl LinkWriter {
    /// Check whether the link is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queue bytes for transmission.
    ///
    /// Never blocks. Fails with [`DriverError::TransportClosed`] once the
    /// other end has gone away.
    pub fn write(&self, data: Vec<u8>) -> DriverResult<()> {
        if !self.is_open() {
            return Err(DriverError::TransportClosed);
        }
        self.outbound.send(data).map_err(|_| {
            self.mark_closed();
            DriverError::TransportClosed
        })
    }

    /// Flag the link as closed.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Radio end of an in-memory [`SerialLink`].
#[derive(Debug)]
pub struct LinkPeer {
    to_driver: mpsc::UnboundedSender<Vec<u8>>,
    from_driver: mpsc::UnboundedReceiver<Vec<u8>>,
    open: Arc<AtomicBool>,
}

impl LinkPeer {
    /// Send bytes to the driver. Returns `false` if the driver is gone.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        self.to_driver.send(data.into()).is_ok()
    }

    /// Wait for the next chunk written by the driver.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_driver.recv().await
    }

    /// Take the next chunk written by the driver, if one is ready.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_driver.try_recv().ok()
    }

    /// Open or close the link as seen by the driver.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// Check whether the driver still considers the link open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(feature = "serial")]
mod serial {
    use std::io::{ErrorKind, Read, Write};
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    use tracing::{debug, warn};

    use super::{LinkPeer, SerialLink};
    use crate::error::{DriverError, DriverResult};

    /// Read timeout of the port; bounds how long the reader thread takes to
    /// notice the driver has gone away.
    const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Open a serial port and wrap it in a [`SerialLink`].
    pub fn open(port: &str, baud_rate: u32) -> DriverResult<SerialLink> {
        let open_error = |e: serialport::Error| DriverError::Open {
            port: port.to_string(),
            reason: e.to_string(),
        };
        let mut reader = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(open_error)?;
        let mut writer = reader.try_clone().map_err(open_error)?;

        let (link, peer) = SerialLink::pair();
        let LinkPeer {
            to_driver,
            mut from_driver,
            open,
        } = peer;

        let name = port.to_string();
        let reader_open = open.clone();
        thread::Builder::new()
            .name(format!("serial-rx {}", name))
            .spawn(move || {
                let mut buf = [0u8; 1024];
                while reader_open.load(Ordering::Acquire) && !to_driver.is_closed() {
                    match reader.read(&mut buf) {
                        Ok(0) => continue,
                        Ok(n) => {
                            if to_driver.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("serial read failed: {}", e);
                            break;
                        }
                    }
                }
                reader_open.store(false, Ordering::Release);
                debug!("serial reader stopped");
            })
            .map_err(|e| DriverError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        thread::Builder::new()
            .name(format!("serial-tx {}", name))
            .spawn(move || {
                while let Some(chunk) = from_driver.blocking_recv() {
                    if let Err(e) = writer.write_all(&chunk).and_then(|_| writer.flush()) {
                        warn!("serial write failed: {}", e);
                        break;
                    }
                }
                open.store(false, Ordering::Release);
                debug!("serial writer stopped");
            })
            .map_err(|e| DriverError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        debug!(port = %name, baud_rate, "serial port opened");
        Ok(link)
    }
}

#[cfg(feature = "serial")]
pub use serial::open;
