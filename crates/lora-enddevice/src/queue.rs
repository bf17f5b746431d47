//! Command queue engine.
//!
//! Commands are written to the radio one at a time, in submission order. A
//! single worker task owns the queue: on every tick it attempts the head
//! command, resolving it on a satisfying reply, dropping it when the
//! transport is closed and retrying it until the attempt ceiling is reached.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use lora_at_protocol::WaitPolicy;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::QueueConfig;
use crate::demux::ResponseDemultiplexer;
use crate::error::{DriverError, DriverResult};
use crate::metric_defs;

struct QueuedCommand {
    seq: u64,
    kind: &'static str,
    line: String,
    policy: WaitPolicy,
    tries: u32,
    reply: oneshot::Sender<DriverResult<Vec<String>>>,
}

#[derive(Debug, Default)]
struct Counters {
    next_seq: AtomicU64,
    pending: AtomicUsize,
    failed: AtomicU64,
}

/// Handle to the command queue worker.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for QueuedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedCommand")
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .field("tries", &self.tries)
            .finish()
    }
}

impl CommandQueue {
    /// Start the worker task.
    pub fn spawn(demux: ResponseDemultiplexer, config: QueueConfig) -> (CommandQueue, JoinHandle<()>) {
        let (sender, incoming) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker = Worker {
            demux,
            config,
            incoming,
            queue: VecDeque::new(),
            counters: counters.clone(),
        };
        let handle = tokio::spawn(worker.run());
        (CommandQueue { sender, counters }, handle)
    }

    /// Submit a command line and wait for its reply.
    ///
    /// `kind` is the command's type key, used in logs and errors. The line is
    /// written without its terminator.
    pub async fn enqueue(
        &self,
        kind: &'static str,
        line: impl Into<String>,
        policy: WaitPolicy,
    ) -> DriverResult<Vec<String>> {
        self.submit(kind, line.into(), policy).await
    }

    /// Queue a command now and return a future for its reply.
    ///
    /// Unlike [`CommandQueue::enqueue`] the command takes its place in the
    /// queue before the returned future is first polled.
    pub fn submit(
        &self,
        kind: &'static str,
        line: String,
        policy: WaitPolicy,
    ) -> impl Future<Output = DriverResult<Vec<String>>> + Send + 'static {
        let (reply, settled) = oneshot::channel();
        let command = QueuedCommand {
            seq: self.counters.next_seq.fetch_add(1, Ordering::Relaxed),
            kind,
            line,
            policy,
            tries: 0,
            reply,
        };
        self.counters.pending.fetch_add(1, Ordering::Relaxed);
        let queued = self.sender.send(command).map_err(|_| {
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            DriverError::QueueClosed
        });
        async move {
            queued?;
            settled.await.map_err(|_| DriverError::QueueClosed)?
        }
    }

    /// Commands dropped after exhausting their attempts, since start.
    pub fn failed_count(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Commands submitted and not yet settled.
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Relaxed)
    }
}

enum Attempt {
    Reply(Vec<String>),
    Closed,
    NoReply,
}

struct Worker {
    demux: ResponseDemultiplexer,
    config: QueueConfig,
    incoming: mpsc::UnboundedReceiver<QueuedCommand>,
    queue: VecDeque<QueuedCommand>,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        let tick = self.config.tick();
        loop {
            if self.queue.is_empty() {
                match self.incoming.recv().await {
                    Some(command) => self.queue.push_back(command),
                    None => break,
                }
            }
            tokio::time::sleep(tick).await;
            while let Ok(command) = self.incoming.try_recv() {
                self.queue.push_back(command);
            }
            metrics::gauge!(metric_defs::QUEUE_DEPTH.name).set(self.queue.len() as f64);
            self.cycle().await;
        }
        debug!("command queue stopped");
    }

    /// One write+await cycle for the head command.
    async fn cycle(&mut self) {
        let max_attempts = self.config.max_attempts.max(1);
        let Some(head) = self.queue.front_mut() else {
            return;
        };
        head.tries += 1;
        let started = Instant::now();
        let attempt = attempt(&self.demux, head).await;

        let (seq, kind, tries) = (head.seq, head.kind, head.tries);
        let result = match attempt {
            Attempt::Reply(reply) => {
                trace!(seq, command = kind, ?reply, "reply");
                metrics::histogram!(metric_defs::QUEUE_REPLY_LATENCY.name, "command" => kind)
                    .record(started.elapsed().as_secs_f64());
                Ok(reply)
            }
            Attempt::Closed => {
                warn!(seq, command = kind, "serial port not open, dropping command");
                metrics::counter!(metric_defs::QUEUE_TRANSPORT_CLOSED.name).increment(1);
                Err(DriverError::TransportClosed)
            }
            Attempt::NoReply if tries < max_attempts => {
                debug!(seq, command = kind, attempt = tries, "no valid reply, retrying");
                metrics::counter!(metric_defs::QUEUE_RETRIES.name, "command" => kind).increment(1);
                return;
            }
            Attempt::NoReply => {
                warn!(seq, command = kind, attempts = tries, "retry limit reached");
                metrics::counter!(metric_defs::QUEUE_RETRIES.name, "command" => kind).increment(1);
                metrics::counter!(metric_defs::QUEUE_COMMANDS_FAILED.name, "command" => kind)
                    .increment(1);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Err(DriverError::RetryLimitExceeded {
                    command: kind,
                    attempts: tries,
                })
            }
        };

        if let Some(done) = self.queue.pop_front() {
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            // The caller may have stopped waiting.
            let _ = done.reply.send(result);
        }
    }
}

async fn attempt(demux: &ResponseDemultiplexer, command: &QueuedCommand) -> Attempt {
    if !demux.is_open() {
        return Attempt::Closed;
    }
    debug!(seq = command.seq, command = command.kind, attempt = command.tries, "writing command");
    if demux.clear_and_write(&command.line).is_err() {
        return Attempt::Closed;
    }
    metrics::counter!(metric_defs::QUEUE_COMMANDS_WRITTEN.name, "command" => command.kind)
        .increment(1);
    match demux.await_reply(&command.policy).await {
        Some(reply) => Attempt::Reply(reply),
        None => Attempt::NoReply,
    }
}
