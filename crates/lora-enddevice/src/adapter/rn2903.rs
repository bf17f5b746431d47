//! Microchip RN2903 adapter.

use async_trait::async_trait;
use lora_at_protocol::rn2903::{self, Activation, Confirmation, Rn2903Command};
use lora_at_protocol::{DeviceIdentity, JoinOutcome, PayloadEncoding, SendOutcome};
use tracing::{debug, info, warn};

use super::{Credentials, IdentityCell, Message, RadioAdapter};
use crate::config::RadioType;
use crate::error::DriverResult;
use crate::queue::CommandQueue;

/// Adapter for the RN2903 `sys`/`mac` command set.
#[derive(Debug, Clone)]
pub struct Rn2903Adapter {
    queue: CommandQueue,
    identity: IdentityCell,
}

impl Rn2903Adapter {
    /// Create the adapter. The identity query is queued ahead of any other
    /// command.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(queue: CommandQueue) -> Self {
        let adapter = Rn2903Adapter {
            queue,
            identity: IdentityCell::default(),
        };
        let command = Rn2903Command::SysGetHweui;
        let reply = adapter
            .queue
            .submit(command.kind(), command.to_command_string(), command.policy());
        adapter.identity.fill(RadioType::Rn2903, async move {
            let reply = reply.await?;
            Ok(DeviceIdentity::from_reply(command.kind(), &reply, rn2903::SHORT_EUI_LEN)?)
        });
        adapter
    }

    /// Run a single command and return its raw reply.
    pub async fn execute(&self, command: &Rn2903Command) -> DriverResult<Vec<String>> {
        self.queue
            .enqueue(command.kind(), command.to_command_string(), command.policy())
            .await
    }

    async fn configure(&self, command: Rn2903Command) -> DriverResult<()> {
        let reply = self.execute(&command).await?;
        if reply.first().map(String::as_str) != Some(rn2903::ACK) {
            warn!(command = command.kind(), ?reply, "RN2903 rejected setting");
        }
        Ok(())
    }
}

#[async_trait]
impl RadioAdapter for Rn2903Adapter {
    async fn join_network(&self, credentials: &Credentials) -> DriverResult<JoinOutcome> {
        let activation = Activation::parse(&credentials.join_mode).unwrap_or_else(|| {
            warn!(join_mode = %credentials.join_mode, "unknown join mode, using otaa");
            Activation::Otaa
        });
        self.configure(Rn2903Command::MacSetAppEui(credentials.network_id.clone()))
            .await?;
        self.configure(Rn2903Command::MacSetAppKey(credentials.network_key.clone()))
            .await?;

        let reply = self.execute(&Rn2903Command::MacJoin { activation }).await?;
        let outcome = rn2903::decode_join(&reply);
        match &outcome {
            JoinOutcome::Joined => info!("RN2903 joined network"),
            JoinOutcome::Refused { reason } => info!(%reason, "RN2903 join refused"),
        }
        Ok(outcome)
    }

    async fn send_data(&self, message: &Message) -> DriverResult<SendOutcome> {
        let hex = self.payload_encoding().encode(&message.payload)?;
        let confirmation = if message.confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Unconfirmed
        };
        let command = Rn2903Command::MacTx {
            confirmation,
            port: message.port,
            hex,
        };
        let reply = self.execute(&command).await?;
        let outcome = rn2903::decode_send(&reply);
        debug!(?outcome, "RN2903 send");
        Ok(outcome)
    }

    async fn get_join_status(&self) -> DriverResult<bool> {
        let reply = self.execute(&Rn2903Command::MacGetStatus).await?;
        Ok(rn2903::decode_join_status(&reply)?)
    }

    async fn reboot(&self) -> DriverResult<()> {
        info!("rebooting RN2903");
        self.execute(&Rn2903Command::SysReset).await.map(|_| ())
    }

    async fn factory_reset(&self) -> DriverResult<()> {
        self.execute(&Rn2903Command::SysFactoryReset).await.map(|_| ())
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.get()
    }

    fn radio_type(&self) -> RadioType {
        RadioType::Rn2903
    }

    fn payload_encoding(&self) -> PayloadEncoding {
        PayloadEncoding::Hex
    }
}
