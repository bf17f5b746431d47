//! Simulated radio modules for the integration tests.
//!
//! A simulated radio sits on the peer end of an in-memory [`SerialLink`],
//! records every command line the driver writes and answers through a
//! scripted responder.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lora_enddevice::{DeviceConfig, EndDevice, LinkPeer, RadioType, SerialLink};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One reply line, sent `after` the previous one.
#[derive(Debug, Clone)]
pub struct Reply {
    pub after: Duration,
    pub line: String,
}

/// A reply line sent right away.
pub fn now(line: &str) -> Reply {
    Reply {
        after: Duration::ZERO,
        line: line.to_string(),
    }
}

/// A reply line sent after `secs` seconds.
pub fn later(secs: u64, line: &str) -> Reply {
    Reply {
        after: Duration::from_secs(secs),
        line: line.to_string(),
    }
}

/// Handle to a running simulated radio.
#[derive(Clone)]
pub struct SimulatedRadio {
    log: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl SimulatedRadio {
    /// Start answering on `peer`.
    pub fn spawn<F>(mut peer: LinkPeer, mut respond: F) -> (SimulatedRadio, JoinHandle<()>)
    where
        F: FnMut(&str) -> Vec<Reply> + Send + 'static,
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let radio = SimulatedRadio { log: log.clone() };
        let task = tokio::spawn(async move {
            while let Some(chunk) = peer.recv().await {
                let text = String::from_utf8_lossy(&chunk).to_string();
                for line in text.split("\r\n").filter(|l| !l.is_empty()) {
                    log.lock().push((Instant::now(), line.to_string()));
                    for reply in respond(line) {
                        if !reply.after.is_zero() {
                            tokio::time::sleep(reply.after).await;
                        }
                        let mut bytes = reply.line.into_bytes();
                        bytes.extend_from_slice(b"\r\n");
                        peer.send(bytes);
                    }
                }
            }
        });
        (radio, task)
    }

    /// Every line written so far.
    pub fn writes(&self) -> Vec<String> {
        self.log.lock().iter().map(|(_, line)| line.clone()).collect()
    }

    /// Write times of lines starting with `prefix`.
    pub fn times_of(&self, prefix: &str) -> Vec<Instant> {
        self.log
            .lock()
            .iter()
            .filter(|(_, line)| line.starts_with(prefix))
            .map(|(at, _)| *at)
            .collect()
    }

    /// Number of lines written that start with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.times_of(prefix).len()
    }
}

/// Start a device of the given type against a simulated radio.
pub fn device_with<F>(radio: RadioType, respond: F) -> (EndDevice, SimulatedRadio)
where
    F: FnMut(&str) -> Vec<Reply> + Send + 'static,
{
    let (link, peer) = SerialLink::pair();
    let (sim, _task) = SimulatedRadio::spawn(peer, respond);
    let config = DeviceConfig {
        radio_type: radio,
        ..DeviceConfig::default()
    };
    (EndDevice::with_link(config, link), sim)
}

/// Responder for an RN2903 that accepts joins and reports `status_word`
/// to `mac get status`.
pub fn rn2903_accepting(status_word: &'static str) -> impl FnMut(&str) -> Vec<Reply> + Send {
    move |line: &str| match line {
        "sys get hweui" => vec![now("0004A30B001A2B3C")],
        "mac get status" => vec![now(status_word)],
        l if l.starts_with("mac set ") => vec![now("ok")],
        l if l.starts_with("mac join ") => vec![now("ok"), later(5, "accepted")],
        l if l.starts_with("mac tx ") => vec![now("ok"), later(2, "mac_tx_ok")],
        _ => vec![now("invalid_param")],
    }
}

/// Responder for an mDot that accepts joins and reports `status` to
/// `AT+NJS?`.
pub fn mdot_accepting(status: &'static str) -> impl FnMut(&str) -> Vec<Reply> + Send {
    move |line: &str| match line {
        "AT+DI?" => vec![now("00-80-00-00-04-00-12-34"), now("OK")],
        "AT+NJS?" => vec![now(status), now("OK")],
        "AT+JOIN" => vec![later(3, "Successfully joined network"), now("OK")],
        l if l.starts_with("AT+SEND=") => vec![later(2, "OK")],
        _ => vec![now("OK")],
    }
}

/// Let the driver settle: background tasks run and paused time advances.
pub async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
