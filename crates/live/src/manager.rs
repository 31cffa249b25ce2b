//! Single-connection subscription manager.
//!
//! Every subscription shares one combined-stream connection. A supervisor
//! task owns the socket; `subscribe`/`unsubscribe` only touch the routing
//! table and post a command, so callers never wait on network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use meridian_core::Interval;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::backoff::Backoff;
use crate::config::LiveConfig;
use crate::error::{LiveError, LiveResult};
use crate::stream::{KlineUpdate, combined_stream_url, parse_message, stream_id};
use crate::transport::{Connector, Transport};

pub type SubscriptionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Local close in progress; never followed by a backoff wait
    Closing,
}

#[derive(Debug)]
enum Command {
    /// The set of stream ids changed
    Resubscribe,
    Shutdown,
}

/// How a connection ended
enum Outcome {
    /// Closed locally after a subscription change
    Resubscribe,
    /// Remote close, transport failure or failed connect
    Dropped,
    Shutdown,
}

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<KlineUpdate>,
}

struct Shared {
    config: LiveConfig,
    routes: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
    state: watch::Sender<ConnectionState>,
    connects: AtomicU64,
}

impl Shared {
    fn streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        streams.sort();
        streams
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }
}

/// Receiving end of one subscription. Dropping it unsubscribes on the
/// next update routed to its stream.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    stream: String,
    receiver: mpsc::Receiver<KlineUpdate>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Next update; `None` after unsubscribe or shutdown
    pub async fn recv(&mut self) -> Option<KlineUpdate> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<KlineUpdate, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Handle to the connection manager. Clones share the same connection.
#[derive(Clone)]
pub struct LiveManager {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    supervisor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LiveManager {
    /// Validate `config` and spawn the supervisor. Nothing connects until
    /// the first subscription. Must be called inside a tokio runtime.
    pub fn start(config: LiveConfig, connector: Arc<dyn Connector>) -> LiveResult<Self> {
        config.validate()?;

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            config,
            routes: DashMap::new(),
            next_id: AtomicU64::new(1),
            state,
            connects: AtomicU64::new(0),
        });
        let (commands, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(supervise(Arc::clone(&shared), connector, command_rx));

        info!(endpoint = %shared.config.endpoint, "Live manager started");
        Ok(Self {
            shared,
            commands,
            supervisor: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Register interest in `symbol` klines at `interval`. The first
    /// subscriber for a stream triggers a reconnect with the new list.
    pub fn subscribe(&self, symbol: &str, interval: &Interval) -> LiveResult<Subscription> {
        if self.commands.is_closed() {
            return Err(LiveError::Shutdown);
        }

        let stream = stream_id(symbol, interval);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel(self.shared.config.channel_capacity);

        let first = {
            let mut subscribers = self.shared.routes.entry(stream.clone()).or_default();
            subscribers.push(Subscriber { id, tx });
            subscribers.len() == 1
        };
        debug!(stream = %stream, subscription = id, "Subscribed");

        if first {
            self.request(Command::Resubscribe);
        }
        Ok(Subscription {
            id,
            stream,
            receiver,
        })
    }

    /// Remove a subscription. Returns false for unknown ids. Removing the
    /// last subscriber of a stream triggers a reconnect without it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut found = None;
        for mut entry in self.shared.routes.iter_mut() {
            if let Some(pos) = entry.value().iter().position(|s| s.id == id) {
                entry.value_mut().remove(pos);
                found = Some(entry.key().clone());
                break;
            }
        }
        let Some(stream) = found else {
            return false;
        };
        debug!(stream = %stream, subscription = id, "Unsubscribed");

        let emptied = self
            .shared
            .routes
            .remove_if(&stream, |_, subscribers| subscribers.is_empty())
            .is_some();
        if emptied {
            self.request(Command::Resubscribe);
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Successful connects since start
    pub fn connection_count(&self) -> u64 {
        self.shared.connects.load(Ordering::Relaxed)
    }

    /// Stream ids with at least one subscriber, sorted
    pub fn active_streams(&self) -> Vec<String> {
        self.shared.streams()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.routes.iter().map(|e| e.value().len()).sum()
    }

    /// Close the connection, stop the supervisor and end every subscription
    pub async fn shutdown(&self) {
        self.request(Command::Shutdown);
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Live supervisor ended abnormally");
        }
        self.shared.routes.clear();
        info!("Live manager stopped");
    }

    fn request(&self, command: Command) {
        if self.commands.send(command).is_err() {
            trace!("Supervisor already stopped");
        }
    }
}

async fn supervise(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut backoff = Backoff::new(shared.config.initial_backoff(), shared.config.max_backoff());

    loop {
        // Queued changes are all covered by the snapshot below
        if drain_commands(&mut commands) {
            break;
        }
        let streams = shared.streams();

        if streams.is_empty() {
            shared.set_state(ConnectionState::Disconnected);
            match commands.recv().await {
                Some(Command::Resubscribe) => continue,
                Some(Command::Shutdown) | None => break,
            }
        }

        shared.set_state(ConnectionState::Connecting);
        let outcome = match combined_stream_url(&shared.config.endpoint, &streams) {
            Ok(url) => match connect(connector.as_ref(), &url, &mut commands).await {
                None => {
                    info!(url = %url, "Shutdown while connecting");
                    Outcome::Shutdown
                }
                Some((Ok(mut transport), changed)) => {
                    backoff.reset();
                    shared.connects.fetch_add(1, Ordering::Relaxed);
                    shared.set_state(ConnectionState::Connected);
                    info!(url = %url, streams = streams.len(), "Live stream connected");
                    if changed {
                        close_locally(&shared, transport.as_mut()).await;
                        Outcome::Resubscribe
                    } else {
                        pump(&shared, transport.as_mut(), &mut commands).await
                    }
                }
                Some((Err(e), _)) => {
                    error!(url = %url, error = %e, "Connect failed");
                    Outcome::Dropped
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to build stream URL");
                Outcome::Dropped
            }
        };

        match outcome {
            Outcome::Shutdown => break,
            Outcome::Resubscribe => continue,
            Outcome::Dropped => {
                if shared.routes.is_empty() {
                    continue;
                }
                shared.set_state(ConnectionState::Disconnected);
                let delay = backoff.next_delay();
                info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");
                if !wait_backoff(delay, &mut commands).await {
                    break;
                }
            }
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    debug!("Live supervisor exited");
}

/// Run one connect attempt. Only shutdown interrupts it (`None`); the flag
/// reports subscription changes seen while it was in flight.
async fn connect(
    connector: &dyn Connector,
    url: &Url,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<(LiveResult<Box<dyn Transport>>, bool)> {
    let attempt = connector.connect(url);
    tokio::pin!(attempt);
    let mut changed = false;
    loop {
        tokio::select! {
            result = &mut attempt => return Some((result, changed)),
            command = commands.recv() => match command {
                Some(Command::Resubscribe) => changed = true,
                Some(Command::Shutdown) | None => return None,
            }
        }
    }
}

async fn pump(
    shared: &Shared,
    transport: &mut dyn Transport,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Outcome {
    loop {
        tokio::select! {
            command = commands.recv() => {
                let shutdown = match command {
                    Some(Command::Resubscribe) => drain_commands(commands),
                    Some(Command::Shutdown) | None => true,
                };
                close_locally(shared, transport).await;
                return if shutdown { Outcome::Shutdown } else { Outcome::Resubscribe };
            }

            message = transport.next_message() => match message {
                Some(Ok(text)) => {
                    if route(shared, &text) {
                        let shutdown = drain_commands(commands);
                        close_locally(shared, transport).await;
                        return if shutdown { Outcome::Shutdown } else { Outcome::Resubscribe };
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "Transport error");
                    return Outcome::Dropped;
                }
                None => {
                    info!("Remote closed the connection");
                    return Outcome::Dropped;
                }
            }
        }
    }
}

async fn close_locally(shared: &Shared, transport: &mut dyn Transport) {
    shared.set_state(ConnectionState::Closing);
    if let Err(e) = transport.close().await {
        debug!(error = %e, "Error while closing connection");
    }
}

/// Consume queued resubscribe requests; true when shutdown was requested
fn drain_commands(commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    loop {
        match commands.try_recv() {
            Ok(Command::Resubscribe) => {}
            Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return true,
            Err(TryRecvError::Empty) => return false,
        }
    }
}

/// Sleep out a backoff delay. Subscription changes do not cut it short;
/// returns false on shutdown.
async fn wait_backoff(delay: Duration, commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(Command::Resubscribe) => trace!("Subscription change during backoff"),
                Some(Command::Shutdown) | None => return false,
            }
        }
    }
}

/// Deliver one frame to its subscribers. Returns true when pruning closed
/// receivers left the stream without subscribers.
fn route(shared: &Shared, text: &str) -> bool {
    let update = match parse_message(text) {
        Ok(Some(update)) => update,
        Ok(None) => {
            trace!("Ignoring non-kline event");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "Dropping malformed message");
            return false;
        }
    };

    let Some(mut subscribers) = shared.routes.get_mut(&update.stream) else {
        debug!(stream = %update.stream, "No subscribers for stream");
        return false;
    };
    subscribers.retain(|sub| match sub.tx.try_send(update.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(
                stream = %update.stream,
                subscription = sub.id,
                "Subscriber queue full, dropping update"
            );
            true
        }
        Err(TrySendError::Closed(_)) => {
            debug!(stream = %update.stream, subscription = sub.id, "Pruning closed subscription");
            false
        }
    });
    let emptied = subscribers.is_empty();
    drop(subscribers);

    emptied
        && shared
            .routes
            .remove_if(&update.stream, |_, subscribers| subscribers.is_empty())
            .is_some()
}
