//! Auto-reconnecting client stream.
//!
//! A [`ClientStream`] is a cheap handle onto a single actor task. The task owns
//! the socket, the status and every timer, and it is the only place any of
//! them change. Socket callbacks, timer expiries and caller requests all reach
//! it as commands on one channel and are handled strictly one at a time.
//!
//! Every connection attempt gets a new epoch number. Socket callbacks and
//! timers capture the epoch they were created in, and the task drops anything
//! that arrives tagged with an older epoch.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::backoff::BackoffPolicy;
use super::identity::ServerIdentity;
use super::state::{ConnectionState, StreamStatus};
use super::watchdog::HeartbeatWatchdog;
use crate::endpoint;
use crate::error::{Result, StreamError};
use crate::events::{EventDispatcher, EventKind, StreamEvent};
use crate::options::{Config, StreamOptions};
use crate::protocol::Handshake;
use crate::transports::{Transport, TransportFactory};
use crate::utils::CancellableTimer;

/// Options for [`ClientStream::reconnect`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Drop a live or pending connection, skip the backoff and reset the retry count
    pub force_immediate: bool,
    /// Point the stream at a new endpoint
    pub url: Option<String>,
}

impl ReconnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: force an immediate reconnect
    pub fn force_immediate(mut self) -> Self {
        self.force_immediate = true;
        self
    }

    /// Builder pattern: switch to a new endpoint
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Options for [`ClientStream::disconnect_with`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectOptions {
    /// Enter `failed` instead of `offline`; the stream never connects again
    pub permanent: bool,
    /// Reported in the status of a permanently failed stream
    pub reason: Option<String>,
}

impl DisconnectOptions {
    /// Permanent disconnect with a reason
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            permanent: true,
            reason: Some(reason.into()),
        }
    }
}

/// Commands processed by the stream task
#[derive(Debug)]
enum Command {
    Send(String),
    Reconnect(ReconnectOptions),
    Disconnect(DisconnectOptions),
    Transport { epoch: u64, event: TransportEvent },
    TimerFired { epoch: u64, timer: TimerKind },
    Shutdown,
}

/// Socket callbacks, forwarded to the stream task
#[derive(Debug)]
enum TransportEvent {
    Message(String),
    Heartbeat,
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Connect,
    Heartbeat,
    Retry,
}

/// Builder for a [`ClientStream`]
pub struct StreamBuilder {
    url: String,
    options: StreamOptions,
    factory: Option<TransportFactory>,
    backoff: Option<Arc<dyn BackoffPolicy>>,
}

impl StreamBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: StreamOptions::default(),
            factory: None,
            backoff: None,
        }
    }

    /// Set stream options
    pub fn options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom transport factory
    pub fn transport_factory(mut self, factory: TransportFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use a custom transport constructor
    pub fn transport<F>(self, create: F) -> Self
    where
        F: Fn() -> Box<dyn Transport> + Send + Sync + 'static,
    {
        self.transport_factory(Arc::new(create))
    }

    /// Replace the backoff derived from the options
    pub fn backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    /// Create the stream and start connecting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<ClientStream> {
        let config = Config::try_from(self.options)?;
        let factory = match self.factory {
            Some(factory) => factory,
            None => default_factory()?,
        };
        let backoff: Arc<dyn BackoffPolicy> = match self.backoff {
            Some(backoff) => backoff,
            None => Arc::new(config.backoff.clone()),
        };

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            StreamError::invalid_state("a client stream must be created inside a tokio runtime")
        })?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StreamStatus::connecting(0));
        let dispatcher = EventDispatcher::new();
        let url = Arc::new(RwLock::new(self.url));

        info!("Creating client stream for '{}'", url.read());

        let task = StreamTask {
            heartbeat: HeartbeatWatchdog::new(config.heartbeat_timeout),
            identity: ServerIdentity::new(config.site.server_id.clone()),
            config,
            url: url.clone(),
            factory,
            backoff,
            dispatcher: dispatcher.clone(),
            status_tx,
            command_tx: command_tx.clone(),
            socket: None,
            epoch: 0,
            connection_timer: None,
            retry_timer: None,
        };
        runtime.spawn(task.run(command_rx));

        Ok(ClientStream {
            inner: Arc::new(StreamHandle {
                command_tx,
                status_rx,
                dispatcher,
                url,
            }),
        })
    }
}

#[cfg(feature = "native")]
fn default_factory() -> Result<TransportFactory> {
    Ok(crate::transports::default_transport_factory())
}

#[cfg(not(feature = "native"))]
fn default_factory() -> Result<TransportFactory> {
    Err(StreamError::config(
        "no transport factory configured and the native transport is disabled",
    ))
}

/// Handle onto an auto-reconnecting message stream.
///
/// Cloning is cheap; all clones drive the same stream. The stream shuts down
/// and closes its socket when the last handle is dropped. A callback that
/// captures a handle keeps the stream alive.
#[derive(Clone)]
pub struct ClientStream {
    inner: Arc<StreamHandle>,
}

struct StreamHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<StreamStatus>,
    dispatcher: EventDispatcher,
    url: Arc<RwLock<String>>,
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

impl ClientStream {
    /// Create a stream using the default transport and start connecting
    pub fn new(url: impl Into<String>, options: StreamOptions) -> Result<Self> {
        StreamBuilder::new(url).options(options).build()
    }

    pub fn builder(url: impl Into<String>) -> StreamBuilder {
        StreamBuilder::new(url)
    }

    /// Send a payload.
    ///
    /// Payloads sent while not connected are dropped. Resend whatever is
    /// needed from a `reset` callback.
    pub fn send(&self, payload: impl Into<String>) {
        if !self.inner.status_rx.borrow().connected {
            trace!("Dropping payload while disconnected");
            return;
        }
        let _ = self.inner.command_tx.send(Command::Send(payload.into()));
    }

    /// Current connection status
    pub fn status(&self) -> StreamStatus {
        self.inner.status_rx.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn subscribe_status(&self) -> watch::Receiver<StreamStatus> {
        self.inner.status_rx.clone()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.inner.status_rx.borrow().connected
    }

    /// Raw endpoint address the stream connects to
    pub fn url(&self) -> String {
        self.inner.url.read().clone()
    }

    /// Request a reconnect. Ignored once the stream was disconnected.
    pub fn reconnect(&self, options: ReconnectOptions) {
        let _ = self.inner.command_tx.send(Command::Reconnect(options));
    }

    /// Go offline for good. Timers stop, the socket closes and no further
    /// events fire.
    pub fn disconnect(&self) {
        self.disconnect_with(DisconnectOptions::default());
    }

    pub fn disconnect_with(&self, options: DisconnectOptions) {
        let _ = self.inner.command_tx.send(Command::Disconnect(options));
    }

    /// Bind a callback to an event kind.
    ///
    /// Callbacks run on the stream task in binding order and must not block.
    /// A panicking callback does not stop the others.
    pub fn on(&self, kind: EventKind, callback: impl Fn(&StreamEvent) + Send + Sync + 'static) {
        self.inner.dispatcher.bind(kind, callback);
    }

    /// Bind to inbound message payloads
    pub fn on_message(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.on(EventKind::Message, move |event| {
            if let StreamEvent::Message(payload) = event {
                callback(payload);
            }
        })
    }

    /// Bind to resets, fired each time a new connection becomes live
    pub fn on_reset(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.on(EventKind::Reset, move |_| callback())
    }

    /// Bind to server identity changes; receives the new server id
    pub fn on_update_available(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.on(EventKind::UpdateAvailable, move |event| {
            if let StreamEvent::UpdateAvailable { server_id } = event {
                callback(server_id);
            }
        })
    }
}

impl std::fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStream")
            .field("url", &self.url())
            .field("status", &self.status())
            .finish()
    }
}

/// The actor owning all mutable stream state
struct StreamTask {
    config: Config,
    url: Arc<RwLock<String>>,
    factory: TransportFactory,
    backoff: Arc<dyn BackoffPolicy>,
    dispatcher: EventDispatcher,
    status_tx: watch::Sender<StreamStatus>,
    command_tx: mpsc::UnboundedSender<Command>,
    socket: Option<Box<dyn Transport>>,
    epoch: u64,
    connection_timer: Option<CancellableTimer>,
    heartbeat: HeartbeatWatchdog,
    retry_timer: Option<CancellableTimer>,
    identity: ServerIdentity,
}

impl StreamTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.launch_connection().await;

        while let Some(command) = commands.recv().await {
            match command {
                Command::Send(payload) => self.send(payload).await,
                Command::Reconnect(options) => self.reconnect(options).await,
                Command::Disconnect(options) => self.disconnect(options).await,
                Command::Transport { epoch, event } => {
                    self.handle_transport_event(epoch, event).await
                }
                Command::TimerFired { epoch, timer } => self.handle_timer(epoch, timer).await,
                Command::Shutdown => break,
            }
        }

        self.retry_timer = None;
        self.cleanup().await;
        debug!("Stream task ended");
    }

    fn state(&self) -> ConnectionState {
        self.status_tx.borrow().status
    }

    fn set_status(&self, status: StreamStatus) {
        let previous = self.status_tx.send_replace(status);
        let current = self.status_tx.borrow().status;
        if previous.status != current {
            debug!("State changed: {} -> {}", previous.status, current);
        }
    }

    /// Callback posting a timer expiry tagged with the current epoch
    fn timer_callback(&self, timer: TimerKind) -> impl FnOnce() + Send + 'static {
        let tx = self.command_tx.clone();
        let epoch = self.epoch;
        move || {
            let _ = tx.send(Command::TimerFired { epoch, timer });
        }
    }

    fn arm_timer(&self, timer: TimerKind, delay: Duration) -> CancellableTimer {
        CancellableTimer::new(delay, self.timer_callback(timer))
    }

    /// Route every socket callback into the command channel, tagged with the
    /// current epoch.
    fn wire_callbacks(&self, socket: &mut dyn Transport) {
        let epoch = self.epoch;
        let post = {
            let tx = self.command_tx.clone();
            move |event: TransportEvent| {
                let _ = tx.send(Command::Transport { epoch, event });
            }
        };

        let p = post.clone();
        socket.on_message(Box::new(move |data| {
            p(TransportEvent::Message(data.to_string()))
        }));
        let p = post.clone();
        socket.on_close(Box::new(move |code, reason| {
            p(TransportEvent::Close { code, reason })
        }));
        let p = post.clone();
        socket.on_error(Box::new(move |error| p(TransportEvent::Error(error))));
        socket.on_heartbeat(Box::new(move || post(TransportEvent::Heartbeat)));
    }

    async fn launch_connection(&mut self) {
        self.cleanup().await;
        self.epoch += 1;

        // Normalized on every attempt so wildcard hosts rotate.
        let url = endpoint::to_sockjs_url(&self.url.read(), &self.config.site);
        info!(epoch = self.epoch, url = %url, "Opening transport");

        let mut socket = (self.factory)();
        self.wire_callbacks(socket.as_mut());
        self.connection_timer = Some(self.arm_timer(TimerKind::Connect, self.config.connect_timeout));

        match socket.open(&url, &self.config.transport_options()).await {
            Ok(()) => self.socket = Some(socket),
            Err(e) => {
                warn!(epoch = self.epoch, "Failed to open transport: {}", e);
                socket.clear_callbacks();
                socket.close().await;
                self.lost_connection().await;
            }
        }
    }

    /// Cancel connection timers and tear down the socket, if any
    async fn cleanup(&mut self) {
        self.connection_timer = None;
        self.heartbeat.clear();

        if let Some(mut socket) = self.socket.take() {
            socket.clear_callbacks();
            socket.close().await;
            debug!(epoch = self.epoch, "Transport released");
        }
    }

    async fn handle_transport_event(&mut self, epoch: u64, event: TransportEvent) {
        if epoch != self.epoch || self.socket.is_none() {
            trace!(epoch, current = self.epoch, "Ignoring event from a retired socket");
            return;
        }

        match event {
            TransportEvent::Message(data) => {
                self.heartbeat_received();
                match self.state() {
                    ConnectionState::Connecting => self.connected(&data),
                    ConnectionState::Connected => {
                        self.dispatcher.emit(&StreamEvent::Message(data));
                    }
                    _ => {}
                }
            }
            TransportEvent::Heartbeat => self.heartbeat_received(),
            TransportEvent::Close { code, reason } => {
                info!(epoch, ?code, ?reason, "Transport closed");
                self.lost_connection().await;
            }
            TransportEvent::Error(error) => {
                warn!(epoch, "Transport error: {}", error);
                self.lost_connection().await;
            }
        }
    }

    fn heartbeat_received(&mut self) {
        if self.state().is_disconnected() {
            return;
        }
        let on_expiry = self.timer_callback(TimerKind::Heartbeat);
        self.heartbeat.rearm(on_expiry);
    }

    /// First message of the epoch: inspect the handshake and go live
    fn connected(&mut self, handshake: &str) {
        self.connection_timer = None;

        if self.state().is_connected() {
            return;
        }

        match Handshake::parse(handshake) {
            Ok(parsed) => match parsed.server_id {
                Some(server_id) => {
                    if self.identity.observe(&server_id) {
                        info!(server_id = %server_id, "Server identity changed, update available");
                        self.dispatcher
                            .emit(&StreamEvent::UpdateAvailable { server_id });
                    }
                }
                None => warn!(epoch = self.epoch, "Handshake without server_id: {}", handshake),
            },
            Err(e) => warn!(epoch = self.epoch, "{}: {:?}", e, handshake),
        }

        self.set_status(StreamStatus {
            status: ConnectionState::Connected,
            connected: true,
            retry_count: 0,
            retry_time: None,
            reason: None,
        });
        info!(epoch = self.epoch, "Connected");

        // After the status change so reset callbacks can send.
        self.dispatcher.emit(&StreamEvent::Reset);
    }

    async fn lost_connection(&mut self) {
        self.cleanup().await;
        self.retry_later();
    }

    fn retry_later(&mut self) {
        let current = self.status_tx.borrow().clone();
        if current.status.is_disconnected() {
            return;
        }

        let delay = self.backoff.delay(current.retry_count);
        let retry_count = current.retry_count.saturating_add(1);
        let retry_time = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));

        self.retry_timer = Some(self.arm_timer(TimerKind::Retry, delay));
        self.set_status(StreamStatus {
            status: ConnectionState::Waiting,
            connected: false,
            retry_count,
            retry_time,
            reason: None,
        });

        info!(
            epoch = self.epoch,
            retry_count,
            delay_ms = delay.as_millis() as u64,
            "Connection lost, retry scheduled"
        );
    }

    async fn retry_now(&mut self) {
        self.retry_timer = None;
        let retry_count = self.status_tx.borrow().retry_count;
        self.set_status(StreamStatus::connecting(retry_count));
        self.launch_connection().await;
    }

    async fn handle_timer(&mut self, epoch: u64, timer: TimerKind) {
        if epoch != self.epoch {
            trace!(epoch, current = self.epoch, ?timer, "Ignoring timer from a retired epoch");
            return;
        }

        match (timer, self.state()) {
            (TimerKind::Connect, ConnectionState::Connecting) => {
                warn!(epoch, "Connection attempt timed out");
                self.lost_connection().await;
            }
            (TimerKind::Heartbeat, ConnectionState::Connecting | ConnectionState::Connected) => {
                warn!(epoch, "Connection timeout. No heartbeat received.");
                self.lost_connection().await;
            }
            (TimerKind::Retry, ConnectionState::Waiting) => self.retry_now().await,
            (timer, state) => trace!(?timer, %state, "Ignoring timer"),
        }
    }

    async fn send(&mut self, payload: String) {
        let connected = self.status_tx.borrow().connected;
        if !connected {
            trace!("Dropping payload while disconnected");
            return;
        }

        if let Some(socket) = &self.socket {
            if !socket.is_open() {
                debug!(epoch = self.epoch, "Socket already closed, dropping payload");
                return;
            }
            if let Err(e) = socket.send(&payload).await {
                warn!(epoch = self.epoch, "Send failed: {}", e);
            }
        }
    }

    async fn reconnect(&mut self, options: ReconnectOptions) {
        let state = self.state();
        if state.is_disconnected() {
            warn!("Ignoring reconnect on a stream that was switched off ({})", state);
            return;
        }

        let url_changed = match options.url {
            Some(url) => {
                let mut current = self.url.write();
                if *current != url {
                    info!(url = %url, "Changing endpoint");
                    *current = url;
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if state.is_active() && !(options.force_immediate || url_changed) {
            debug!("Reconnect ignored, already {}", state);
            return;
        }

        let retry_count = if options.force_immediate {
            0
        } else {
            self.status_tx.borrow().retry_count
        };

        self.retry_timer = None;
        self.set_status(StreamStatus::connecting(retry_count));
        self.launch_connection().await;
    }

    async fn disconnect(&mut self, options: DisconnectOptions) {
        if self.state().is_disconnected() {
            return;
        }

        self.retry_timer = None;
        self.cleanup().await;

        let (status, reason) = if options.permanent {
            (ConnectionState::Failed, options.reason)
        } else {
            (ConnectionState::Offline, None)
        };
        self.set_status(StreamStatus {
            status,
            connected: false,
            retry_count: 0,
            retry_time: None,
            reason,
        });
        info!("Disconnected ({})", status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConstantBackoff;
    use crate::transports::TransportOptions;
    use async_trait::async_trait;

    /// Socket that opens successfully and never delivers anything
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn open(&mut self, _url: &str, _options: &TransportOptions) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) {}
        async fn send(&self, _data: &str) -> Result<()> {
            Ok(())
        }
        fn is_open(&self) -> bool {
            true
        }
        fn on_message(&mut self, _callback: crate::transports::MessageCallback) {}
        fn on_close(&mut self, _callback: crate::transports::CloseCallback) {}
        fn on_error(&mut self, _callback: crate::transports::ErrorCallback) {}
        fn clear_callbacks(&mut self) {}
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = ClientStream::builder("example.com")
            .transport(|| Box::new(SilentTransport))
            .build();
        assert!(matches!(result, Err(StreamError::InvalidState { .. })));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let options = StreamOptions {
            retry_exponent: Some(0.1),
            ..Default::default()
        };
        let result = ClientStream::builder("example.com")
            .options(options)
            .transport(|| Box::new(SilentTransport))
            .build();
        assert!(matches!(result, Err(StreamError::ConfigurationError { .. })));
    }

    #[tokio::test]
    async fn test_starts_connecting() {
        let stream = ClientStream::builder("example.com")
            .transport(|| Box::new(SilentTransport))
            .backoff(ConstantBackoff(Duration::from_secs(60)))
            .build()
            .unwrap();

        let status = stream.status();
        assert_eq!(status.status, ConnectionState::Connecting);
        assert!(!status.connected);
        assert_eq!(status.retry_count, 0);
        assert_eq!(stream.url(), "example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_hits_connect_timeout() {
        let stream = ClientStream::builder("example.com")
            .options(StreamOptions::new().connect_timeout(Duration::from_secs(5)))
            .transport(|| Box::new(SilentTransport))
            .backoff(ConstantBackoff(Duration::from_secs(3600)))
            .build()
            .unwrap();

        let mut status_rx = stream.subscribe_status();
        let status = status_rx
            .wait_for(|s| s.status == ConnectionState::Waiting)
            .await
            .unwrap()
            .clone();

        assert_eq!(status.retry_count, 1);
        assert!(status.retry_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_from_an_older_epoch_are_dropped() {
        let opened = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = opened.clone();
        let stream = ClientStream::builder("example.com")
            .options(StreamOptions::new().connect_timeout(Duration::from_secs(10)))
            .transport(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Box::new(SilentTransport)
            })
            .backoff(ConstantBackoff(Duration::from_secs(3600)))
            .build()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        stream.reconnect(ReconnectOptions::new().force_immediate());
        for timer in [TimerKind::Connect, TimerKind::Heartbeat, TimerKind::Retry] {
            let _ = stream
                .inner
                .command_tx
                .send(Command::TimerFired { epoch: 1, timer });
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        let status = stream.status();
        assert_eq!(status.status, ConnectionState::Connecting);
        assert_eq!(status.retry_count, 0);
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
