//! Radio adapters.
//!
//! A [`RadioAdapter`] turns the network-level operations (join, send, join
//! status) into vendor command sequences on the shared
//! [`CommandQueue`](crate::queue::CommandQueue) and
//! decodes the replies into [`JoinOutcome`] / [`SendOutcome`].

mod mdot;
mod rn2903;

pub use mdot::MdotAdapter;
pub use rn2903::Rn2903Adapter;

use std::sync::Arc;

use async_trait::async_trait;
use lora_at_protocol::{DeviceIdentity, JoinOutcome, PayloadEncoding, SendOutcome};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::RadioType;
use crate::error::DriverResult;

/// Join credentials, captured at network start and reused by every rejoin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network id / AppEUI.
    pub network_id: String,
    /// Network key / AppKey.
    pub network_key: String,
    /// Join procedure, `otaa` or `abp`. Only the RN2903 uses it.
    pub join_mode: String,
}

impl Credentials {
    pub fn new(network_id: impl Into<String>, network_key: impl Into<String>) -> Self {
        Credentials {
            network_id: network_id.into(),
            network_key: network_key.into(),
            join_mode: "otaa".to_string(),
        }
    }

    pub fn with_join_mode(mut self, join_mode: impl Into<String>) -> Self {
        self.join_mode = join_mode.into();
        self
    }
}

/// An uplink message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    /// Request a network acknowledgement. Only the RN2903 uses it.
    pub confirmed: bool,
    /// LoRaWAN application port. Only the RN2903 uses it.
    pub port: u8,
}

impl Message {
    /// An unconfirmed message on port 1.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Message {
            payload: payload.into(),
            confirmed: false,
            port: 1,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    pub fn on_port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }
}

/// The capability set every radio module provides.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Join the network.
    ///
    /// A refusal by the module or the network is an `Ok` outcome; only
    /// transport and retry failures are errors.
    async fn join_network(&self, credentials: &Credentials) -> DriverResult<JoinOutcome>;

    /// Send an uplink and collect any downlinks received with it.
    async fn send_data(&self, message: &Message) -> DriverResult<SendOutcome>;

    /// Ask the module whether it is joined.
    async fn get_join_status(&self) -> DriverResult<bool>;

    /// Reboot the module.
    async fn reboot(&self) -> DriverResult<()>;

    /// Restore the module's factory defaults.
    async fn factory_reset(&self) -> DriverResult<()>;

    /// Factory identity, once the startup query has completed.
    fn identity(&self) -> Option<DeviceIdentity>;

    fn radio_type(&self) -> RadioType;

    /// How payload bytes appear on the command line and in downlinks.
    fn payload_encoding(&self) -> PayloadEncoding;
}

/// Identity slot filled by a background query at construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdentityCell(Arc<RwLock<Option<DeviceIdentity>>>);

impl IdentityCell {
    pub(crate) fn get(&self) -> Option<DeviceIdentity> {
        self.0.read().clone()
    }

    /// Run `query` in the background and store its result. A failure is
    /// logged and leaves the slot empty.
    pub(crate) fn fill<F>(&self, radio: RadioType, query: F)
    where
        F: std::future::Future<Output = DriverResult<DeviceIdentity>> + Send + 'static,
    {
        let slot = self.0.clone();
        tokio::spawn(async move {
            match query.await {
                Ok(identity) => {
                    info!(%radio, %identity, "device identity");
                    *slot.write() = Some(identity);
                }
                Err(e) => warn!(%radio, "failed to read device identity: {}", e),
            }
        });
    }
}
