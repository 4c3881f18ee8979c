//! In-memory transport used to drive a stream from tests.
//!
//! Every socket the stream opens is handed to the test through
//! [`MockNetwork::next_socket`], where it can play the server side.

#![allow(dead_code)]

use async_trait::async_trait;
use ddp_stream::{
    CloseCallback, ErrorCallback, HeartbeatCallback, MessageCallback, Result, StreamError,
    Transport, TransportCallbacks, TransportFactory, TransportOptions,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Server side of one opened socket
#[derive(Clone)]
pub struct MockSocket {
    url: Arc<Mutex<String>>,
    options: Arc<Mutex<Option<TransportOptions>>>,
    sent: Arc<Mutex<Vec<String>>>,
    send_calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    callbacks: TransportCallbacks,
}

impl MockSocket {
    fn new() -> Self {
        Self {
            url: Arc::new(Mutex::new(String::new())),
            options: Arc::new(Mutex::new(None)),
            sent: Arc::new(Mutex::new(Vec::new())),
            send_calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            callbacks: TransportCallbacks::new(),
        }
    }

    /// URL the stream opened this socket with
    pub fn url(&self) -> String {
        self.url.lock().clone()
    }

    pub fn options(&self) -> Option<TransportOptions> {
        self.options.lock().clone()
    }

    /// Payloads the stream wrote to this socket
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Number of `send` calls the stream made, including rejected ones
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Push an inbound message to the stream
    pub fn deliver(&self, data: &str) {
        self.callbacks.message(data);
    }

    pub fn handshake(&self, server_id: &str) {
        self.deliver(&format!(r#"{{"server_id":"{}"}}"#, server_id));
    }

    pub fn heartbeat(&self) {
        self.callbacks.heartbeat();
    }

    /// Close the socket from the server side
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.callbacks.close(Some(1000), Some("Normal closure".to_string()));
    }

    /// Drop the link without telling the stream yet
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn error(&self, message: &str) {
        self.callbacks.error(message.to_string());
    }
}

struct MockTransport {
    socket: MockSocket,
    opened_tx: mpsc::UnboundedSender<MockSocket>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self, url: &str, options: &TransportOptions) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.socket.url.lock() = url.to_string();
        *self.socket.options.lock() = Some(options.clone());

        if self.refuse.load(Ordering::SeqCst) {
            return Err(StreamError::connection("connection refused"));
        }

        let _ = self.opened_tx.send(self.socket.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.socket.closed.store(true, Ordering::SeqCst);
    }

    async fn send(&self, data: &str) -> Result<()> {
        self.socket.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.socket.is_closed() {
            return Err(StreamError::transport("socket is closed"));
        }
        self.socket.sent.lock().push(data.to_string());
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.socket.is_closed()
    }

    fn on_message(&mut self, callback: MessageCallback) {
        self.socket.callbacks.set_message(callback);
    }

    fn on_close(&mut self, callback: CloseCallback) {
        self.socket.callbacks.set_close(callback);
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        self.socket.callbacks.set_error(callback);
    }

    fn on_heartbeat(&mut self, callback: HeartbeatCallback) {
        self.socket.callbacks.set_heartbeat(callback);
    }

    fn clear_callbacks(&mut self) {
        self.socket.callbacks.clear();
    }
}

/// Test side of the mock transport
pub struct MockNetwork {
    opened_rx: mpsc::UnboundedReceiver<MockSocket>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MockNetwork {
    pub fn new() -> (TransportFactory, Self) {
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicUsize::new(0));

        let factory_refuse = refuse.clone();
        let factory_attempts = attempts.clone();
        let factory: TransportFactory = Arc::new(move || {
            Box::new(MockTransport {
                socket: MockSocket::new(),
                opened_tx: opened_tx.clone(),
                refuse: factory_refuse.clone(),
                attempts: factory_attempts.clone(),
            }) as Box<dyn Transport>
        });

        (
            factory,
            Self {
                opened_rx,
                refuse,
                attempts,
            },
        )
    }

    /// Wait for the stream to open its next socket
    pub async fn next_socket(&mut self) -> MockSocket {
        self.opened_rx
            .recv()
            .await
            .expect("stream dropped its transport factory")
    }

    /// Socket opened since the last call, if any
    pub fn try_next_socket(&mut self) -> Option<MockSocket> {
        self.opened_rx.try_recv().ok()
    }

    /// Make subsequent `open` calls fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `open` calls so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Let the stream task drain its queue
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Event log shared with callbacks
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }
}
