//! LoRa module AT protocol
//!
//! This crate provides the command catalogs, reply decoding and byte-level codec
//! for driving LoRaWAN radio modules over a serial line. Two module families are
//! supported:
//!
//! - **Multitech mDot** ([`mdot`]): free-text `AT` commands, replies terminated by
//!   `OK` or `ERROR`.
//! - **Microchip RN2903** ([`rn2903`]): space-delimited `sys`/`mac` commands,
//!   single-line replies plus two-phase `ok` / result replies for join and send.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → module): one text line terminated with `\r\n`
//! - **Replies** (module → host): text tokens separated by control characters,
//!   see [`TokenCodec`]
//! - **Completion**: every command kind carries a [`WaitPolicy`] deciding when the
//!   tokens received since the write form a complete reply
//!
//! # Example
//!
//! ```rust
//! use lora_at_protocol::{rn2903, Rn2903Command, TokenCodec};
//!
//! let cmd = Rn2903Command::MacGetStatus;
//! assert_eq!(cmd.encode(), b"mac get status\r\n");
//!
//! let mut codec = TokenCodec::new();
//! let mut reply = Vec::new();
//! codec.push(b"00000001\r\n", &mut reply);
//! assert!(cmd.policy().condition.is_satisfied(&reply));
//! assert!(rn2903::decode_join_status(&reply).unwrap());
//! ```

mod codec;
mod error;
mod payload;
mod policy;
mod responses;

pub mod mdot;
pub mod rn2903;

pub use codec::*;
pub use error::*;
pub use mdot::MdotCommand;
pub use payload::*;
pub use policy::*;
pub use responses::*;
pub use rn2903::Rn2903Command;
