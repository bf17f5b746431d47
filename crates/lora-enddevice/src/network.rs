//! Network session: join, rejoin and uplink state machine.
//!
//! The session tracks three flags (joined, joining, sending) and derives a
//! [`NetworkState`] from them. After [`Network::network_start`] a poll task
//! checks the module's join status on a fixed cadence and rejoins with the
//! stored credentials whenever the module reports it has dropped off the
//! network:
//!
//! 1. Joined: poll again after the healthy interval.
//! 2. Not joined: rejoin. Poll again immediately if the rejoin succeeded,
//!    otherwise after the degraded interval.
//! 3. Status query failed: leave the flags alone, poll after the degraded
//!    interval.

use std::sync::Arc;
use std::time::Duration;

use lora_at_protocol::{JoinOutcome, SendOutcome};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::{Credentials, Message, RadioAdapter};
use crate::config::NetworkConfig;
use crate::error::{DriverResult, NetworkError, NetworkResult, StateError};
use crate::metric_defs;

/// Observable state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Unjoined,
    /// A join or rejoin is in flight.
    Joining,
    Joined,
    /// An uplink is in flight.
    SendingMessage,
}

#[derive(Debug, Default)]
struct Session {
    joined: bool,
    joining: bool,
    sending: bool,
    messages_sent: u64,
    credentials: Option<Credentials>,
    next_poll_delay: Option<Duration>,
}

impl Session {
    fn state(&self) -> NetworkState {
        if self.sending {
            NetworkState::SendingMessage
        } else if self.joining {
            NetworkState::Joining
        } else if self.joined {
            NetworkState::Joined
        } else {
            NetworkState::Unjoined
        }
    }

    fn set_joined(&mut self, joined: bool) {
        if self.joined != joined {
            debug!(joined, "join flag changed");
        }
        self.joined = joined;
        metrics::gauge!(metric_defs::NETWORK_JOINED.name).set(if joined { 1.0 } else { 0.0 });
    }
}

/// Clears a busy flag when dropped, so an aborted join or send cannot leave
/// the session stuck.
struct FlagGuard<'a> {
    session: &'a Mutex<Session>,
    flag: fn(&mut Session) -> &mut bool,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        *(self.flag)(&mut *session) = false;
    }
}

fn joining(session: &mut Session) -> &mut bool {
    &mut session.joining
}

fn sending(session: &mut Session) -> &mut bool {
    &mut session.sending
}

struct Inner {
    adapter: Arc<dyn RadioAdapter>,
    config: NetworkConfig,
    session: Mutex<Session>,
}

impl Inner {
    /// Mark a join as started. `None` if one is already running.
    fn begin_join(&self, credentials: Option<&Credentials>) -> Option<(FlagGuard<'_>, Credentials)> {
        let mut session = self.session.lock();
        if session.joining {
            return None;
        }
        if let Some(credentials) = credentials {
            session.credentials = Some(credentials.clone());
        }
        let credentials = session.credentials.clone()?;
        session.joining = true;
        session.set_joined(false);
        Some((
            FlagGuard {
                session: &self.session,
                flag: joining,
            },
            credentials,
        ))
    }

    async fn join(&self, guard: FlagGuard<'_>, credentials: &Credentials) -> DriverResult<JoinOutcome> {
        let result = self.adapter.join_network(credentials).await;
        let label = match &result {
            Ok(JoinOutcome::Joined) => "joined",
            Ok(JoinOutcome::Refused { .. }) => "refused",
            Err(_) => "error",
        };
        metrics::counter!(metric_defs::NETWORK_JOIN_ATTEMPTS.name, "outcome" => label).increment(1);
        if let Ok(JoinOutcome::Joined) = result {
            self.session.lock().set_joined(true);
        }
        drop(guard);
        result
    }

    /// Delay before the next poll after a join attempt.
    fn delay_after_join(&self, result: &DriverResult<JoinOutcome>) -> Duration {
        match result {
            Ok(JoinOutcome::Joined) => Duration::ZERO,
            _ => self.config.degraded_poll(),
        }
    }

    /// One status check, rejoining if needed. Returns the delay before the
    /// next check.
    async fn poll_once(&self) -> Duration {
        match self.adapter.get_join_status().await {
            Ok(true) => {
                self.session.lock().set_joined(true);
                debug!("join status: joined");
                self.config.healthy_poll()
            }
            Ok(false) => {
                info!("device not joined, rejoining");
                let Some((guard, credentials)) = self.begin_join(None) else {
                    debug!("join already in progress, skipping rejoin");
                    return self.config.degraded_poll();
                };
                let result = self.join(guard, &credentials).await;
                if let Err(e) = &result {
                    warn!("rejoin failed: {}", e);
                }
                self.delay_after_join(&result)
            }
            Err(e) => {
                warn!("join status query failed: {}", e);
                self.config.degraded_poll()
            }
        }
    }
}

async fn poll_loop(inner: Arc<Inner>, mut delay: Duration) {
    loop {
        tokio::time::sleep(delay).await;
        delay = inner.poll_once().await;
        inner.session.lock().next_poll_delay = Some(delay);
        debug!(?delay, "next join status poll");
    }
}

/// Network session over a radio adapter.
pub struct Network {
    inner: Arc<Inner>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Network {
    pub fn new(adapter: Arc<dyn RadioAdapter>, config: NetworkConfig) -> Self {
        Network {
            inner: Arc::new(Inner {
                adapter,
                config,
                session: Mutex::new(Session::default()),
            }),
            poll_task: Mutex::new(None),
        }
    }

    /// Join the network and start the status poll loop.
    ///
    /// The credentials are kept for later rejoins. A refusal is returned as
    /// an `Ok` outcome. Either way the poll loop runs afterwards, replacing
    /// any loop started by an earlier call.
    pub async fn network_start(&self, credentials: Credentials) -> NetworkResult<JoinOutcome> {
        let (guard, credentials) = self
            .inner
            .begin_join(Some(&credentials))
            .ok_or(StateError::JoinInProgress)?;
        self.stop_polling();

        info!(network_id = %credentials.network_id, "joining network");
        let result = self.inner.join(guard, &credentials).await;
        if let Err(e) = &result {
            warn!("join failed: {}", e);
        }

        let delay = self.inner.delay_after_join(&result);
        self.inner.session.lock().next_poll_delay = Some(delay);
        let task = tokio::spawn(poll_loop(self.inner.clone(), delay));
        if let Some(previous) = self.poll_task.lock().replace(task) {
            previous.abort();
        }

        Ok(result?)
    }

    /// Send an uplink and return the downlink lines received with it.
    ///
    /// Fails without touching the radio if the device is not joined or
    /// another uplink is in flight.
    pub async fn network_send_message(&self, message: &Message) -> NetworkResult<Vec<String>> {
        let guard = {
            let mut session = self.inner.session.lock();
            if !session.joined {
                return Err(StateError::NotJoined.into());
            }
            if session.sending {
                return Err(StateError::SendInProgress.into());
            }
            session.sending = true;
            FlagGuard {
                session: &self.inner.session,
                flag: sending,
            }
        };

        let result = self.inner.adapter.send_data(message).await;
        drop(guard);

        match result? {
            SendOutcome::Sent { downlinks } => {
                let count = {
                    let mut session = self.inner.session.lock();
                    session.messages_sent += 1;
                    session.messages_sent
                };
                metrics::counter!(metric_defs::NETWORK_MESSAGES_SENT.name).increment(1);
                metrics::counter!(metric_defs::NETWORK_DOWNLINKS.name)
                    .increment(downlinks.len() as u64);
                info!(count, downlinks = downlinks.len(), "message sent");
                Ok(downlinks)
            }
            SendOutcome::Rejected { reason } => {
                metrics::counter!(metric_defs::NETWORK_SEND_REJECTED.name).increment(1);
                warn!(%reason, "message rejected");
                Err(NetworkError::SendRejected(reason))
            }
        }
    }

    /// Decode a downlink line returned by [`Network::network_send_message`].
    pub fn decode_downlink(&self, line: &str) -> NetworkResult<Vec<u8>> {
        Ok(self.inner.adapter.payload_encoding().decode(line)?)
    }

    pub fn state(&self) -> NetworkState {
        self.inner.session.lock().state()
    }

    pub fn is_joined(&self) -> bool {
        self.inner.session.lock().joined
    }

    /// Uplinks accepted since start.
    pub fn messages_sent(&self) -> u64 {
        self.inner.session.lock().messages_sent
    }

    /// Delay chosen by the most recent poll scheduling decision.
    pub fn next_poll_delay(&self) -> Option<Duration> {
        self.inner.session.lock().next_poll_delay
    }

    /// Credentials used by the last join.
    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.session.lock().credentials.clone()
    }

    pub fn adapter(&self) -> &Arc<dyn RadioAdapter> {
        &self.inner.adapter
    }

    /// Stop the poll loop, if running.
    pub fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("radio", &self.inner.adapter.radio_type())
            .field("session", &*self.inner.session.lock())
            .finish()
    }
}
