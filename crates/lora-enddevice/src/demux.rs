//! Response demultiplexer.
//!
//! A pump task turns inbound bytes into tokens and appends them to the pending
//! response buffer. The queue worker clears the buffer, writes a command and
//! then polls the buffer until the command's reply condition holds.

use std::sync::Arc;
use std::time::Duration;

use lora_at_protocol::{TokenCodec, WaitPolicy};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{DriverError, DriverResult};
use crate::transport::{LinkWriter, SerialLink};

#[derive(Debug, Default)]
struct Pending {
    tokens: Vec<String>,
    codec: TokenCodec,
}

/// Shared view of the reply stream.
#[derive(Debug, Clone)]
pub struct ResponseDemultiplexer {
    pending: Arc<Mutex<Pending>>,
    writer: LinkWriter,
}

impl ResponseDemultiplexer {
    /// Start pumping the link's inbound bytes.
    ///
    /// The returned task ends when the link's inbound side closes, after
    /// marking the link closed.
    pub fn spawn(link: SerialLink) -> (ResponseDemultiplexer, JoinHandle<()>) {
        let (writer, inbound) = link.into_parts();
        let demux = ResponseDemultiplexer {
            pending: Arc::new(Mutex::new(Pending {
                tokens: Vec::new(),
                codec: TokenCodec::new(),
            })),
            writer,
        };
        let pump = tokio::spawn(pump(demux.pending.clone(), demux.writer.clone(), inbound));
        (demux, pump)
    }

    /// Check whether the transport is open.
    pub fn is_open(&self) -> bool {
        self.writer.is_open()
    }

    /// Clear the pending buffer and write a command.
    ///
    /// Both happen under the buffer lock, so no inbound token can land between
    /// the clear and the write.
    pub fn clear_and_write(&self, command: &str) -> DriverResult<()> {
        let mut pending = self.pending.lock();
        if !self.writer.is_open() {
            return Err(DriverError::TransportClosed);
        }
        pending.tokens.clear();
        trace!(command, "write");
        self.writer.write(TokenCodec::encode_command(command))
    }

    /// Wait until the buffer satisfies the policy's condition.
    ///
    /// Returns a snapshot of the buffer, or `None` if the policy's timeout
    /// elapsed first.
    pub async fn await_reply(&self, policy: &WaitPolicy) -> Option<Vec<String>> {
        if !policy.condition.needs_reply() {
            return Some(Vec::new());
        }
        let poll_interval = policy.poll_interval.max(Duration::from_millis(1));
        let poll = async {
            loop {
                tokio::time::sleep(poll_interval).await;
                let pending = self.pending.lock();
                if policy.condition.is_satisfied(&pending.tokens) {
                    return pending.tokens.clone();
                }
            }
        };
        tokio::time::timeout(policy.timeout, poll).await.ok()
    }

    /// Current contents of the pending buffer.
    pub fn snapshot(&self) -> Vec<String> {
        self.pending.lock().tokens.clone()
    }
}

async fn pump(
    pending: Arc<Mutex<Pending>>,
    writer: LinkWriter,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(chunk) = inbound.recv().await {
        let mut guard = pending.lock();
        let Pending { tokens, codec } = &mut *guard;
        let start = tokens.len();
        if codec.push(&chunk, tokens) > 0 {
            for token in &tokens[start..] {
                trace!(token = %token, "read");
            }
        }
    }
    writer.mark_closed();
    debug!("inbound stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_at_protocol::ReplyCondition;

    const ANY: WaitPolicy = WaitPolicy::new(
        ReplyCondition::AnyResponse,
        Duration::from_millis(100),
        Duration::from_secs(1),
    );

    #[tokio::test(start_paused = true)]
    async fn test_reply_is_tokenised() {
        let (link, mut peer) = SerialLink::pair();
        let (demux, _pump) = ResponseDemultiplexer::spawn(link);

        demux.clear_and_write("AT+DI?").unwrap();
        assert_eq!(peer.recv().await.unwrap(), b"AT+DI?\r\n");
        peer.send(&b"00-80-00-00-00-00-aa-bb\r\n\r\nOK\r\n"[..]);

        let reply = demux.await_reply(&ANY).await.unwrap();
        assert_eq!(reply, vec!["00-80-00-00-00-00-aa-bb", "OK"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_clears_stale_tokens() {
        let (link, peer) = SerialLink::pair();
        let (demux, _pump) = ResponseDemultiplexer::spawn(link);

        peer.send(&b"stale\r\n"[..]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(demux.snapshot(), vec!["stale"]);

        demux.clear_and_write("AT").unwrap();
        assert!(demux.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_times_out() {
        let (link, _peer) = SerialLink::pair();
        let (demux, _pump) = ResponseDemultiplexer::spawn(link);

        demux.clear_and_write("AT").unwrap();
        assert!(demux.await_reply(&ANY).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_true_skips_wait() {
        let (link, _peer) = SerialLink::pair();
        let (demux, _pump) = ResponseDemultiplexer::spawn(link);

        let reply = demux.await_reply(&WaitPolicy::immediate()).await;
        assert_eq!(reply, Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_inbound_marks_link_closed() {
        let (link, peer) = SerialLink::pair();
        let (demux, pump) = ResponseDemultiplexer::spawn(link);

        drop(peer);
        pump.await.unwrap();
        assert!(!demux.is_open());
        assert_eq!(demux.clear_and_write("AT"), Err(DriverError::TransportClosed));
    }
}
