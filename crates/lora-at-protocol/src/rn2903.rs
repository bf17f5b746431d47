//! Command catalog for the Microchip RN2903 command set.
//!
//! Commands are space-delimited words (`mac set appeui 0011...`). Most commands
//! answer with a single line. `mac join` and `mac tx` answer `ok` immediately and
//! print a second line once the over-the-air exchange is done; when they are
//! refused they answer a single error line instead.

use std::time::Duration;

use crate::codec::TokenCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::policy::{ReplyCondition, WaitPolicy};
use crate::responses::{JoinOutcome, SendOutcome};

/// Immediate acknowledgement of a two-phase command.
pub const ACK: &str = "ok";

/// Second-phase reply of a successful join.
pub const JOIN_ACCEPTED: &str = "accepted";

/// Prefix of a downlink line reported after `mac tx`.
pub const MAC_RX: &str = "mac_rx";

/// Error tokens that make a transmission fail.
pub const TX_ERRORS: &[&str] = &[
    "mac_err",
    "invalid_data_len",
    "invalid_param",
    "not_joined",
    "no_free_ch",
    "silent",
    "frame_counter_err_rejoin_needed",
    "busy",
    "mac_paused",
];

/// Number of trailing characters of the hardware EUI used as a short identifier.
pub const SHORT_EUI_LEN: usize = 4;

/// Bit of the `mac get status` word that reports the join state.
pub const STATUS_JOINED_BIT: u32 = 0x01;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Policy for single-line replies.
pub const ANY_RESPONSE: WaitPolicy = WaitPolicy::new(
    ReplyCondition::AnyResponse,
    POLL_INTERVAL,
    Duration::from_secs(5),
);

/// Policy for two-phase replies.
pub const TWO_PHASE: WaitPolicy = WaitPolicy::new(
    ReplyCondition::LengthMatches { ack: ACK },
    POLL_INTERVAL,
    Duration::from_secs(60),
);

/// Activation method for `mac join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Over-the-air activation.
    Otaa,
    /// Activation by personalization.
    Abp,
}

impl Activation {
    /// Word used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Otaa => "otaa",
            Activation::Abp => "abp",
        }
    }

    /// Parse an activation method, case-insensitively.
    pub fn parse(s: &str) -> Option<Activation> {
        match s.to_ascii_lowercase().as_str() {
            "otaa" => Some(Activation::Otaa),
            "abp" => Some(Activation::Abp),
            _ => None,
        }
    }
}

/// Uplink message type for `mac tx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Confirmed uplink.
    Confirmed,
    /// Unconfirmed uplink.
    Unconfirmed,
}

impl Confirmation {
    fn as_str(&self) -> &'static str {
        match self {
            Confirmation::Confirmed => "cnf",
            Confirmation::Unconfirmed => "uncnf",
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Commands understood by the RN2903.
#[derive(Debug, Clone, PartialEq)]
pub enum Rn2903Command {
    // ========== System ==========
    /// Reboot the module.
    SysReset,
    /// Reset to factory defaults and reboot.
    SysFactoryReset,
    /// Erase the application firmware. No reply is expected.
    SysEraseFw,
    /// Firmware version.
    SysGetVer,
    /// Preprogrammed hardware EUI.
    SysGetHweui,

    // ========== MAC control ==========
    /// Reset the LoRaWAN stack to defaults for a band.
    MacReset {
        /// Frequency band in MHz (e.g. 915).
        band: Option<u16>,
    },
    /// Transmit an uplink.
    MacTx {
        /// Confirmed or unconfirmed uplink.
        confirmation: Confirmation,
        /// Application port, 1-223.
        port: u8,
        /// Hex encoded payload.
        hex: String,
    },
    /// Join the network.
    MacJoin {
        /// Activation method.
        activation: Activation,
    },
    /// Persist the MAC configuration.
    MacSave,
    /// Pause the LoRaWAN stack.
    MacPause,
    /// Resume the LoRaWAN stack.
    MacResume,

    // ========== MAC set ==========
    /// Device address (ABP).
    MacSetDevAddr(String),
    /// Device EUI.
    MacSetDevEui(String),
    /// Application EUI.
    MacSetAppEui(String),
    /// Network session key (ABP).
    MacSetNwkSKey(String),
    /// Application session key (ABP).
    MacSetAppSKey(String),
    /// Application key (OTAA).
    MacSetAppKey(String),
    /// Output power index.
    MacSetPowerIndex(u8),
    /// Data rate.
    MacSetDataRate(u8),
    /// Adaptive data rate.
    MacSetAdr(bool),
    /// Retransmissions for confirmed uplinks.
    MacSetRetx(u8),
    /// Link check interval in seconds, 0 disables.
    MacSetLinkCheck(u16),
    /// First receive window delay in milliseconds.
    MacSetRxDelay1(u16),
    /// Second receive window parameters.
    MacSetRx2 {
        /// Data rate.
        data_rate: u8,
        /// Frequency in Hz.
        frequency: u32,
    },
    /// Sync word (hex).
    MacSetSyncWord(String),
    /// Enable or disable an uplink channel.
    MacSetChannelStatus {
        /// Channel number, 0-71.
        channel: u8,
        /// `true` to enable.
        enabled: bool,
    },

    // ========== MAC get ==========
    /// Device EUI.
    MacGetDevEui,
    /// Device address.
    MacGetDevAddr,
    /// MAC status word.
    MacGetStatus,

    // ========== Raw ==========
    /// A raw command line.
    Raw(String),
}

impl Rn2903Command {
    /// Encode the command as a line to send to the module.
    /// Returns the bytes to send (including the `\r\n` terminator).
    pub fn encode(&self) -> Vec<u8> {
        TokenCodec::encode_command(&self.to_command_string())
    }

    /// Type key of the command: the command words without arguments.
    pub fn kind(&self) -> &'static str {
        match self {
            Rn2903Command::SysReset => "sys reset",
            Rn2903Command::SysFactoryReset => "sys factoryRESET",
            Rn2903Command::SysEraseFw => "sys eraseFW",
            Rn2903Command::SysGetVer => "sys get ver",
            Rn2903Command::SysGetHweui => "sys get hweui",
            Rn2903Command::MacReset { .. } => "mac reset",
            Rn2903Command::MacTx { .. } => "mac tx",
            Rn2903Command::MacJoin { .. } => "mac join",
            Rn2903Command::MacSave => "mac save",
            Rn2903Command::MacPause => "mac pause",
            Rn2903Command::MacResume => "mac resume",
            Rn2903Command::MacSetDevAddr(_) => "mac set devaddr",
            Rn2903Command::MacSetDevEui(_) => "mac set deveui",
            Rn2903Command::MacSetAppEui(_) => "mac set appeui",
            Rn2903Command::MacSetNwkSKey(_) => "mac set nwkskey",
            Rn2903Command::MacSetAppSKey(_) => "mac set appskey",
            Rn2903Command::MacSetAppKey(_) => "mac set appkey",
            Rn2903Command::MacSetPowerIndex(_) => "mac set pwridx",
            Rn2903Command::MacSetDataRate(_) => "mac set dr",
            Rn2903Command::MacSetAdr(_) => "mac set adr",
            Rn2903Command::MacSetRetx(_) => "mac set retx",
            Rn2903Command::MacSetLinkCheck(_) => "mac set linkchk",
            Rn2903Command::MacSetRxDelay1(_) => "mac set rxdelay1",
            Rn2903Command::MacSetRx2 { .. } => "mac set rx2",
            Rn2903Command::MacSetSyncWord(_) => "mac set sync",
            Rn2903Command::MacSetChannelStatus { .. } => "mac set ch status",
            Rn2903Command::MacGetDevEui => "mac get deveui",
            Rn2903Command::MacGetDevAddr => "mac get devaddr",
            Rn2903Command::MacGetStatus => "mac get status",
            Rn2903Command::Raw(_) => "other",
        }
    }

    /// Reply policy for the command.
    pub fn policy(&self) -> WaitPolicy {
        match self {
            Rn2903Command::MacTx { .. } | Rn2903Command::MacJoin { .. } => TWO_PHASE,
            Rn2903Command::SysEraseFw => WaitPolicy::immediate(),
            _ => ANY_RESPONSE,
        }
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        let kind = self.kind();
        match self {
            Rn2903Command::MacReset { band: Some(band) } => format!("{} {}", kind, band),
            Rn2903Command::MacTx {
                confirmation,
                port,
                hex,
            } => format!("{} {} {} {}", kind, confirmation.as_str(), port, hex),
            Rn2903Command::MacJoin { activation } => format!("{} {}", kind, activation.as_str()),
            Rn2903Command::MacSetDevAddr(v)
            | Rn2903Command::MacSetDevEui(v)
            | Rn2903Command::MacSetAppEui(v)
            | Rn2903Command::MacSetNwkSKey(v)
            | Rn2903Command::MacSetAppSKey(v)
            | Rn2903Command::MacSetAppKey(v)
            | Rn2903Command::MacSetSyncWord(v) => format!("{} {}", kind, v),
            Rn2903Command::MacSetPowerIndex(v)
            | Rn2903Command::MacSetDataRate(v)
            | Rn2903Command::MacSetRetx(v) => format!("{} {}", kind, v),
            Rn2903Command::MacSetAdr(enabled) => format!("{} {}", kind, on_off(*enabled)),
            Rn2903Command::MacSetLinkCheck(v) | Rn2903Command::MacSetRxDelay1(v) => {
                format!("{} {}", kind, v)
            }
            Rn2903Command::MacSetRx2 {
                data_rate,
                frequency,
            } => format!("{} {} {}", kind, data_rate, frequency),
            Rn2903Command::MacSetChannelStatus { channel, enabled } => {
                format!("{} {} {}", kind, channel, on_off(*enabled))
            }
            Rn2903Command::Raw(line) => line.clone(),
            _ => kind.to_string(),
        }
    }
}

/// Decode the reply to [`Rn2903Command::MacJoin`].
///
/// A two-line reply carries the verdict on its second line; a single line is
/// an immediate refusal (`invalid_param`, `keys_not_init`, `no_free_ch`, ...).
pub fn decode_join(reply: &[String]) -> JoinOutcome {
    match reply {
        [_, verdict, ..] if verdict == JOIN_ACCEPTED => JoinOutcome::Joined,
        [_, verdict, ..] => JoinOutcome::Refused {
            reason: verdict.clone(),
        },
        [only] => JoinOutcome::Refused {
            reason: only.clone(),
        },
        [] => JoinOutcome::Refused {
            reason: String::new(),
        },
    }
}

/// Strip the `mac_rx <port> ` prefix from a downlink line.
pub fn downlink_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(MAC_RX)?.strip_prefix(' ')?;
    let (port, data) = rest.split_once(' ')?;
    port.parse::<u8>().ok()?;
    Some(data)
}

/// Decode the reply to [`Rn2903Command::MacTx`].
pub fn decode_send(reply: &[String]) -> SendOutcome {
    if reply.len() < 2 {
        return SendOutcome::Rejected {
            reason: reply.first().cloned().unwrap_or_default(),
        };
    }
    if let Some(err) = reply.iter().find(|t| TX_ERRORS.contains(&t.as_str())) {
        return SendOutcome::Rejected { reason: err.clone() };
    }
    let downlinks = reply[1..]
        .iter()
        .filter_map(|line| downlink_payload(line))
        .map(str::to_string)
        .collect();
    SendOutcome::Sent { downlinks }
}

/// Decode the reply to [`Rn2903Command::MacGetStatus`].
///
/// The status is a hex word; bit 0 is set while the module is joined.
pub fn decode_join_status(reply: &[String]) -> ProtocolResult<bool> {
    let unexpected = || ProtocolError::UnexpectedReply {
        command: Rn2903Command::MacGetStatus.kind(),
        reply: reply.to_vec(),
    };
    let word = reply.first().ok_or_else(unexpected)?;
    let status = u32::from_str_radix(word.trim(), 16).map_err(|_| unexpected())?;
    Ok(status & STATUS_JOINED_BIT != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_join() {
        let cmd = Rn2903Command::MacJoin {
            activation: Activation::Otaa,
        };
        assert_eq!(cmd.encode(), b"mac join otaa\r\n");
    }

    #[test]
    fn test_encode_tx() {
        let cmd = Rn2903Command::MacTx {
            confirmation: Confirmation::Unconfirmed,
            port: 1,
            hex: "48656c6c6f".to_string(),
        };
        assert_eq!(cmd.to_command_string(), "mac tx uncnf 1 48656c6c6f");
        assert_eq!(cmd.kind(), "mac tx");
    }

    #[test]
    fn test_encode_set_commands() {
        assert_eq!(
            Rn2903Command::MacSetAppEui("000CC68FFFE1609B".into()).to_command_string(),
            "mac set appeui 000CC68FFFE1609B"
        );
        assert_eq!(Rn2903Command::MacSetAdr(true).to_command_string(), "mac set adr on");
        assert_eq!(
            Rn2903Command::MacSetRx2 {
                data_rate: 8,
                frequency: 923_300_000
            }
            .to_command_string(),
            "mac set rx2 8 923300000"
        );
        assert_eq!(
            Rn2903Command::MacSetChannelStatus {
                channel: 12,
                enabled: false
            }
            .to_command_string(),
            "mac set ch status 12 off"
        );
    }

    #[test]
    fn test_mac_reset_band_optional() {
        assert_eq!(Rn2903Command::MacReset { band: None }.to_command_string(), "mac reset");
        assert_eq!(
            Rn2903Command::MacReset { band: Some(915) }.to_command_string(),
            "mac reset 915"
        );
    }

    #[test]
    fn test_raw_passthrough() {
        let cmd = Rn2903Command::Raw("radio get sf".to_string());
        assert_eq!(cmd.to_command_string(), "radio get sf");
        assert_eq!(cmd.kind(), "other");
        assert_eq!(cmd.policy(), ANY_RESPONSE);
    }

    #[test]
    fn test_policy_table() {
        let tx = Rn2903Command::MacTx {
            confirmation: Confirmation::Confirmed,
            port: 1,
            hex: String::new(),
        };
        assert_eq!(tx.policy(), TWO_PHASE);
        assert_eq!(
            Rn2903Command::MacJoin { activation: Activation::Abp }.policy(),
            TWO_PHASE
        );
        assert_eq!(Rn2903Command::SysEraseFw.policy().condition, ReplyCondition::AlwaysTrue);
        assert_eq!(Rn2903Command::MacGetStatus.policy().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!(Activation::parse("OTAA"), Some(Activation::Otaa));
        assert_eq!(Activation::parse("abp"), Some(Activation::Abp));
        assert_eq!(Activation::parse("p2p"), None);
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_join() {
        assert_eq!(decode_join(&lines(&["ok", "accepted"])), JoinOutcome::Joined);
        assert_eq!(
            decode_join(&lines(&["ok", "denied"])),
            JoinOutcome::Refused {
                reason: "denied".to_string()
            }
        );
        assert_eq!(
            decode_join(&lines(&["keys_not_init"])),
            JoinOutcome::Refused {
                reason: "keys_not_init".to_string()
            }
        );
    }

    #[test]
    fn test_decode_send_without_downlink() {
        assert_eq!(
            decode_send(&lines(&["ok", "mac_tx_ok"])),
            SendOutcome::Sent { downlinks: vec![] }
        );
    }

    #[test]
    fn test_decode_send_with_downlink() {
        assert_eq!(
            decode_send(&lines(&["ok", "mac_rx 1 48656c6c6f"])),
            SendOutcome::Sent {
                downlinks: lines(&["48656c6c6f"])
            }
        );
        assert_eq!(
            decode_send(&lines(&["ok", "mac_rx 42 00ff"])),
            SendOutcome::Sent {
                downlinks: lines(&["00ff"])
            }
        );
    }

    #[test]
    fn test_decode_send_errors() {
        assert_eq!(
            decode_send(&lines(&["ok", "mac_err"])),
            SendOutcome::Rejected {
                reason: "mac_err".to_string()
            }
        );
        assert_eq!(
            decode_send(&lines(&["not_joined"])),
            SendOutcome::Rejected {
                reason: "not_joined".to_string()
            }
        );
    }

    #[test]
    fn test_downlink_payload_requires_port() {
        assert_eq!(downlink_payload("mac_rx 1 AB"), Some("AB"));
        assert_eq!(downlink_payload("mac_rx AB"), None);
        assert_eq!(downlink_payload("mac_tx_ok"), None);
    }

    #[test]
    fn test_decode_join_status() {
        assert!(decode_join_status(&lines(&["00000001"])).unwrap());
        assert!(decode_join_status(&lines(&["0000000B"])).unwrap());
        assert!(!decode_join_status(&lines(&["00000000"])).unwrap());
        assert!(!decode_join_status(&lines(&["00000402"])).unwrap());
        assert!(decode_join_status(&lines(&["invalid_param"])).is_err());
    }
}
