//! MultiTech mDot adapter.

use async_trait::async_trait;
use lora_at_protocol::mdot::{self, KeyFormat, MdotCommand};
use lora_at_protocol::{DeviceIdentity, JoinOutcome, PayloadEncoding, SendOutcome};
use tracing::{debug, info, warn};

use super::{Credentials, IdentityCell, Message, RadioAdapter};
use crate::config::RadioType;
use crate::error::DriverResult;
use crate::queue::CommandQueue;

/// Adapter for the mDot AT command set.
///
/// Payloads travel as raw text, so they must be UTF-8 without control bytes.
#[derive(Debug, Clone)]
pub struct MdotAdapter {
    queue: CommandQueue,
    identity: IdentityCell,
}

impl MdotAdapter {
    /// Create the adapter. The identity query is queued ahead of any other
    /// command.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(queue: CommandQueue) -> Self {
        let adapter = MdotAdapter {
            queue,
            identity: IdentityCell::default(),
        };
        let command = MdotCommand::GetDeviceId;
        let reply = adapter
            .queue
            .submit(command.kind(), command.to_command_string(), command.policy());
        adapter.identity.fill(RadioType::Mdot, async move {
            let reply = reply.await?;
            Ok(DeviceIdentity::from_reply(command.kind(), &reply, mdot::SHORT_EUI_LEN)?)
        });
        adapter
    }

    /// Run a single command and return its raw reply.
    pub async fn execute(&self, command: &MdotCommand) -> DriverResult<Vec<String>> {
        self.queue
            .enqueue(command.kind(), command.to_command_string(), command.policy())
            .await
    }

    async fn configure(&self, command: MdotCommand) -> DriverResult<()> {
        let reply = self.execute(&command).await?;
        if reply.iter().any(|t| t == mdot::ERROR) {
            warn!(command = command.kind(), ?reply, "mDot rejected setting");
        }
        Ok(())
    }
}

#[async_trait]
impl RadioAdapter for MdotAdapter {
    async fn join_network(&self, credentials: &Credentials) -> DriverResult<JoinOutcome> {
        self.configure(MdotCommand::SetNetworkId {
            format: KeyFormat::Passphrase,
            value: credentials.network_id.clone(),
        })
        .await?;
        self.configure(MdotCommand::SetNetworkKey {
            format: KeyFormat::Passphrase,
            value: credentials.network_key.clone(),
        })
        .await?;

        let reply = self.execute(&MdotCommand::Join).await?;
        let outcome = mdot::decode_join(&reply);
        match &outcome {
            JoinOutcome::Joined => info!("mDot joined network"),
            JoinOutcome::Refused { reason } => info!(%reason, "mDot join refused"),
        }
        Ok(outcome)
    }

    async fn send_data(&self, message: &Message) -> DriverResult<SendOutcome> {
        let payload = self.payload_encoding().encode(&message.payload)?;
        let reply = self.execute(&MdotCommand::Send { payload }).await?;
        let outcome = mdot::decode_send(&reply);
        debug!(?outcome, "mDot send");
        Ok(outcome)
    }

    async fn get_join_status(&self) -> DriverResult<bool> {
        let reply = self.execute(&MdotCommand::GetJoinStatus).await?;
        Ok(mdot::decode_join_status(&reply)?)
    }

    async fn reboot(&self) -> DriverResult<()> {
        info!("rebooting mDot");
        self.execute(&MdotCommand::Reset).await.map(|_| ())
    }

    async fn factory_reset(&self) -> DriverResult<()> {
        self.configure(MdotCommand::FactoryDefaults).await?;
        self.configure(MdotCommand::SaveConfig).await
    }

    fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.get()
    }

    fn radio_type(&self) -> RadioType {
        RadioType::Mdot
    }

    fn payload_encoding(&self) -> PayloadEncoding {
        PayloadEncoding::Text
    }
}
