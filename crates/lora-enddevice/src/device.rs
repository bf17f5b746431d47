//! End device: wires transport, demultiplexer, queue, adapter and network
//! session together.

use std::sync::Arc;

use lora_at_protocol::{DeviceIdentity, JoinOutcome};
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapter::{Credentials, MdotAdapter, Message, RadioAdapter, Rn2903Adapter};
use crate::config::{DeviceConfig, RadioType};
use crate::demux::ResponseDemultiplexer;
use crate::error::NetworkResult;
use crate::network::{Network, NetworkState};
use crate::queue::CommandQueue;
use crate::transport::SerialLink;

/// The concrete adapter behind an [`EndDevice`], for vendor specific commands.
#[derive(Debug, Clone)]
pub enum Radio {
    Mdot(MdotAdapter),
    Rn2903(Rn2903Adapter),
}

impl Radio {
    fn new(radio: RadioType, queue: CommandQueue) -> Radio {
        match radio {
            RadioType::Mdot => Radio::Mdot(MdotAdapter::new(queue)),
            RadioType::Rn2903 => Radio::Rn2903(Rn2903Adapter::new(queue)),
        }
    }

    fn as_adapter(&self) -> Arc<dyn RadioAdapter> {
        match self {
            Radio::Mdot(adapter) => Arc::new(adapter.clone()),
            Radio::Rn2903(adapter) => Arc::new(adapter.clone()),
        }
    }
}

/// A LoRa end device on a serial link.
///
/// Owns the background tasks; they are aborted by [`EndDevice::shutdown`] or
/// when the device is dropped.
#[derive(Debug)]
pub struct EndDevice {
    config: DeviceConfig,
    queue: CommandQueue,
    radio: Radio,
    network: Network,
    tasks: Vec<JoinHandle<()>>,
}

impl EndDevice {
    /// Open the configured serial port and start the driver.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "serial")]
    pub fn connect(config: DeviceConfig) -> crate::error::DriverResult<EndDevice> {
        let link = crate::transport::open(&config.serial_port.port, config.serial_port.baud_rate)?;
        Ok(EndDevice::with_link(config, link))
    }

    /// Start the driver on an already open link.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_link(config: DeviceConfig, link: SerialLink) -> EndDevice {
        let (demux, pump) = ResponseDemultiplexer::spawn(link);
        let (queue, worker) = CommandQueue::spawn(demux, config.queue);
        let radio = Radio::new(config.radio_type, queue.clone());
        let network = Network::new(radio.as_adapter(), config.network);
        info!(radio = %config.radio_type, port = %config.serial_port.port, "end device started");

        EndDevice {
            config,
            queue,
            radio,
            network,
            tasks: vec![pump, worker],
        }
    }

    /// Join the network and start join status polling.
    pub async fn network_start(&self, credentials: Credentials) -> NetworkResult<JoinOutcome> {
        self.network.network_start(credentials).await
    }

    /// Send an uplink; returns the downlink lines received with it.
    pub async fn network_send_message(&self, message: &Message) -> NetworkResult<Vec<String>> {
        self.network.network_send_message(message).await
    }

    pub fn state(&self) -> NetworkState {
        self.network.state()
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.network.adapter().identity()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn adapter(&self) -> &Arc<dyn RadioAdapter> {
        self.network.adapter()
    }

    pub fn radio(&self) -> &Radio {
        &self.radio
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Stop polling and abort the queue and inbound tasks. Commands still
    /// queued fail with `QueueClosed`.
    pub fn shutdown(&mut self) {
        self.network.stop_polling();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for EndDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
