//! Command catalog for the Multitech mDot AT command set.
//!
//! Commands are free-text `AT` lines. Every command answers with its result
//! lines followed by `OK` or `ERROR`. `AT+JOIN` and `AT+SEND` take seconds to
//! complete and print their result only once the radio exchange is over.

use std::time::Duration;

use crate::codec::TokenCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::policy::{ReplyCondition, WaitPolicy};
use crate::responses::{JoinOutcome, SendOutcome};

/// Final status line of a successful command.
pub const OK: &str = "OK";

/// Final status line of a failed command.
pub const ERROR: &str = "ERROR";

/// Join status value reported by `AT+NJS` when joined.
pub const JOINED: &str = "1";

/// Number of trailing characters of the device EUI used as a short identifier.
pub const SHORT_EUI_LEN: usize = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default policy for mDot commands.
pub const ANY_RESPONSE: WaitPolicy =
    WaitPolicy::new(ReplyCondition::AnyResponse, POLL_INTERVAL, REPLY_TIMEOUT);

/// Policy for commands whose reply ends only after the over-the-air exchange.
pub const UNTIL_STATUS: WaitPolicy = WaitPolicy::new(
    ReplyCondition::UntilTerminal {
        terminals: &[OK, ERROR],
    },
    POLL_INTERVAL,
    REPLY_TIMEOUT,
);

/// Format of the value passed to `AT+NI` / `AT+NK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Colon separated hex bytes.
    Hex,
    /// Passphrase string.
    Passphrase,
}

impl KeyFormat {
    fn as_param(&self) -> u8 {
        match self {
            KeyFormat::Hex => 0,
            KeyFormat::Passphrase => 1,
        }
    }
}

/// Network join mode (`AT+NJM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Manual configuration (ABP).
    Manual,
    /// Over-the-air activation.
    Otaa,
    /// Join automatically on start up.
    AutoOtaa,
    /// Peer-to-peer.
    PeerToPeer,
}

impl JoinMode {
    fn as_param(&self) -> u8 {
        match self {
            JoinMode::Manual => 0,
            JoinMode::Otaa => 1,
            JoinMode::AutoOtaa => 2,
            JoinMode::PeerToPeer => 3,
        }
    }
}

/// Commands understood by the mDot.
#[derive(Debug, Clone, PartialEq)]
pub enum MdotCommand {
    // ========== General ==========
    /// Check that the command channel is alive.
    Attention,
    /// Product and firmware identification.
    RequestId,
    /// Reset the CPU.
    Reset,
    /// Restore factory defaults.
    FactoryDefaults,
    /// Persist the current configuration.
    SaveConfig,
    /// Enable or disable command echo.
    SetEcho {
        /// `true` to echo commands back.
        enabled: bool,
    },
    /// Read the device EUI.
    GetDeviceId,

    // ========== Network ==========
    /// Select the US915 frequency sub-band (0 = all).
    SetFrequencySubBand {
        /// Sub-band, 0-8.
        band: u8,
    },
    /// Select public or private network sync word.
    SetPublicNetwork {
        /// `true` for public network.
        public: bool,
    },
    /// Select the join mode.
    SetJoinMode {
        /// The join mode.
        mode: JoinMode,
    },
    /// Join the network.
    Join,
    /// Set the network id (AppEUI).
    SetNetworkId {
        /// How `value` is interpreted.
        format: KeyFormat,
        /// Network id or passphrase.
        value: String,
    },
    /// Read the network id.
    GetNetworkId,
    /// Set the network key (AppKey).
    SetNetworkKey {
        /// How `value` is interpreted.
        format: KeyFormat,
        /// Network key or passphrase.
        value: String,
    },
    /// Read the network key.
    GetNetworkKey,
    /// Read the last known join state.
    GetJoinStatus,
    /// Enable or disable adaptive data rate.
    SetAdr {
        /// `true` to enable ADR.
        enabled: bool,
    },
    /// Set the transmit data rate.
    SetTxDataRate {
        /// Data rate index.
        rate: u8,
    },
    /// Set the transmit power in dBm.
    SetTxPower {
        /// Power in dBm.
        dbm: u8,
    },
    /// Set the number of acknowledgement retries (0 disables confirmed uplinks).
    SetAck {
        /// Retry count, 0-8.
        retries: u8,
    },

    // ========== Data ==========
    /// Send a text payload and report any received downlink.
    Send {
        /// Payload text.
        payload: String,
    },
    /// Send a hex payload.
    SendBinary {
        /// Hex encoded payload.
        hex: String,
    },
    /// Print the last received payload.
    ReceiveOnce,
    /// Signal strength statistics of the last packet.
    Rssi,
    /// Signal to noise statistics of the last packet.
    Snr,
}

impl MdotCommand {
    /// Encode the command as a line to send to the module.
    /// Returns the bytes to send (including the `\r\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        TokenCodec::encode_command(&self.to_command_string())
    }

    /// Type key of the command: the command prefix without its arguments.
    pub fn kind(&self) -> &'static str {
        match self {
            MdotCommand::Attention => "AT",
            MdotCommand::RequestId => "ATI",
            MdotCommand::Reset => "ATZ",
            MdotCommand::FactoryDefaults => "AT&F",
            MdotCommand::SaveConfig => "AT&W",
            MdotCommand::SetEcho { .. } => "ATE",
            MdotCommand::GetDeviceId => "AT+DI?",
            MdotCommand::SetFrequencySubBand { .. } => "AT+FSB=",
            MdotCommand::SetPublicNetwork { .. } => "AT+PN=",
            MdotCommand::SetJoinMode { .. } => "AT+NJM=",
            MdotCommand::Join => "AT+JOIN",
            MdotCommand::SetNetworkId { .. } => "AT+NI=",
            MdotCommand::GetNetworkId => "AT+NI?",
            MdotCommand::SetNetworkKey { .. } => "AT+NK=",
            MdotCommand::GetNetworkKey => "AT+NK?",
            MdotCommand::GetJoinStatus => "AT+NJS?",
            MdotCommand::SetAdr { .. } => "AT+ADR=",
            MdotCommand::SetTxDataRate { .. } => "AT+TXDR=",
            MdotCommand::SetTxPower { .. } => "AT+TXP=",
            MdotCommand::SetAck { .. } => "AT+ACK=",
            MdotCommand::Send { .. } => "AT+SEND=",
            MdotCommand::SendBinary { .. } => "AT+SENDB=",
            MdotCommand::ReceiveOnce => "AT+RECV",
            MdotCommand::Rssi => "AT+RSSI",
            MdotCommand::Snr => "AT+SNR",
        }
    }

    /// Reply policy for the command.
    pub fn policy(&self) -> WaitPolicy {
        match self {
            MdotCommand::Join | MdotCommand::Send { .. } | MdotCommand::SendBinary { .. } => {
                UNTIL_STATUS
            }
            _ => ANY_RESPONSE,
        }
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        let kind = self.kind();
        match self {
            MdotCommand::SetEcho { enabled } => format!("{}{}", kind, u8::from(*enabled)),
            MdotCommand::SetFrequencySubBand { band } => format!("{}{}", kind, band),
            MdotCommand::SetPublicNetwork { public } => format!("{}{}", kind, u8::from(*public)),
            MdotCommand::SetJoinMode { mode } => format!("{}{}", kind, mode.as_param()),
            MdotCommand::SetNetworkId { format, value }
            | MdotCommand::SetNetworkKey { format, value } => {
                format!("{}{},{}", kind, format.as_param(), value)
            }
            MdotCommand::SetAdr { enabled } => format!("{}{}", kind, u8::from(*enabled)),
            MdotCommand::SetTxDataRate { rate } => format!("{}{}", kind, rate),
            MdotCommand::SetTxPower { dbm } => format!("{}{}", kind, dbm),
            MdotCommand::SetAck { retries } => format!("{}{}", kind, retries),
            MdotCommand::Send { payload } => format!("{}{}", kind, payload),
            MdotCommand::SendBinary { hex } => format!("{}{}", kind, hex),
            _ => kind.to_string(),
        }
    }
}

/// Line preceding the `ERROR` status, or the status itself.
fn error_reason(reply: &[String]) -> Option<String> {
    let pos = reply.iter().position(|t| t == ERROR)?;
    let reason = pos
        .checked_sub(1)
        .map(|i| reply[i].clone())
        .unwrap_or_else(|| ERROR.to_string());
    Some(reason)
}

/// Decode the reply to [`MdotCommand::Join`].
pub fn decode_join(reply: &[String]) -> JoinOutcome {
    if let Some(reason) = error_reason(reply) {
        return JoinOutcome::Refused { reason };
    }
    if reply.iter().any(|t| t == OK) {
        JoinOutcome::Joined
    } else {
        JoinOutcome::Refused {
            reason: reply.first().cloned().unwrap_or_default(),
        }
    }
}

/// Decode the reply to [`MdotCommand::Send`].
///
/// Every line before the final `OK` is downlink data.
pub fn decode_send(reply: &[String]) -> SendOutcome {
    if let Some(reason) = error_reason(reply) {
        return SendOutcome::Rejected { reason };
    }
    let downlinks = reply.iter().take_while(|t| *t != OK).cloned().collect();
    SendOutcome::Sent { downlinks }
}

/// Decode the reply to [`MdotCommand::GetJoinStatus`].
pub fn decode_join_status(reply: &[String]) -> ProtocolResult<bool> {
    reply
        .iter()
        .find_map(|t| match t.trim() {
            JOINED => Some(true),
            "0" => Some(false),
            _ => None,
        })
        .ok_or_else(|| ProtocolError::UnexpectedReply {
            command: MdotCommand::GetJoinStatus.kind(),
            reply: reply.to_vec(),
        })
}
