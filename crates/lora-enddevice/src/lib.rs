//! Host-side driver for LoRaWAN end-device radio modules on a serial line.
//!
//! Supports the MultiTech mDot (AT commands) and the Microchip RN2903
//! (`sys`/`mac` commands). The layers, bottom up:
//!
//! - [`transport`]: byte channels to the serial port (or an in-memory peer).
//! - [`demux`]: turns inbound bytes into reply tokens and waits for complete
//!   replies.
//! - [`queue`]: writes commands one at a time, with retries.
//! - [`adapter`]: vendor command sequences for join, send and status.
//! - [`network`]: join/rejoin state machine and uplinks.
//!
//! [`EndDevice`] wires them together from a [`DeviceConfig`].
//!
//! ```rust,no_run
//! use lora_enddevice::{Credentials, DeviceConfig, EndDevice, Message};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let device = EndDevice::connect(DeviceConfig::default())?;
//! device
//!     .network_start(Credentials::new("my-network", "my-passphrase"))
//!     .await?;
//! let downlinks = device.network_send_message(&Message::new("hello")).await?;
//! # let _ = downlinks;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod demux;
pub mod device;
pub mod error;
pub mod metric_defs;
pub mod network;
pub mod queue;
pub mod transport;

pub use adapter::{Credentials, MdotAdapter, Message, RadioAdapter, Rn2903Adapter};
pub use config::{ConfigError, DeviceConfig, NetworkConfig, QueueConfig, RadioType, SerialPortOptions};
pub use device::{EndDevice, Radio};
pub use error::{DriverError, DriverResult, NetworkError, NetworkResult, StateError};
pub use network::{Network, NetworkState};
pub use queue::CommandQueue;
pub use transport::{LinkPeer, SerialLink};

pub use lora_at_protocol as protocol;
