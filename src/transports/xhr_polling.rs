//! SockJS xhr-polling driver using reqwest.
//!
//! One task long-polls `POST <session>/xhr` and feeds every returned frame to
//! the callbacks. A second task drains the outbound queue through
//! `POST <session>/xhr_send`, one request at a time, so payload order holds.

use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;

use super::transport::TransportCallbacks;
use crate::error::{Result, StreamError};
use crate::protocol::SockJsFrame;

/// A running xhr-polling session
pub(crate) struct XhrPollingLink {
    send_tx: mpsc::UnboundedSender<String>,
    finished: Arc<AtomicBool>,
    poller: JoinHandle<()>,
    sender: JoinHandle<()>,
}

impl XhrPollingLink {
    /// Spawn the polling and sending tasks. Returns immediately.
    pub(crate) fn spawn(session_url: &str, callbacks: TransportCallbacks) -> Result<Self> {
        let base = session_url.trim_end_matches('/');
        let poll_url = Url::parse(&format!("{}/xhr", base))?;
        let send_url = Url::parse(&format!("{}/xhr_send", base))?;
        if !matches!(poll_url.scheme(), "http" | "https") {
            return Err(StreamError::config(format!(
                "xhr-polling needs an http(s) URL, got {}",
                poll_url
            )));
        }

        let client = Client::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (send_tx, send_rx) = mpsc::unbounded_channel();

        let poller = tokio::spawn(poll_loop(
            client.clone(),
            poll_url,
            callbacks.clone(),
            finished.clone(),
        ));
        let sender = tokio::spawn(send_loop(client, send_url, send_rx, callbacks));

        Ok(Self {
            send_tx,
            finished,
            poller,
            sender,
        })
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn send(&self, data: &str) -> Result<()> {
        let body = SockJsFrame::encode_messages(&[data])?;
        self.send_tx
            .send(body)
            .map_err(|_| StreamError::invalid_state("xhr session has ended"))
    }

    pub(crate) fn close(self) {
        self.finished.store(true, Ordering::SeqCst);
        self.poller.abort();
        self.sender.abort();
    }
}

async fn poll_once(client: &Client, url: &Url) -> Result<String> {
    let response = client.post(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::http(format!("poll returned {}", status)));
    }
    Ok(response.text().await?)
}

async fn poll_loop(
    client: Client,
    url: Url,
    callbacks: TransportCallbacks,
    finished: Arc<AtomicBool>,
) {
    'session: loop {
        let body = match poll_once(&client, &url).await {
            Ok(body) => body,
            Err(e) => {
                error!("xhr poll of {} failed: {}", url, e);
                finished.store(true, Ordering::SeqCst);
                callbacks.error(e.to_string());
                callbacks.close(None, Some("poll failed".to_string()));
                return;
            }
        };

        for line in body.lines().filter(|line| !line.is_empty()) {
            match SockJsFrame::decode(line) {
                Ok(frame) => {
                    if !callbacks.deliver(frame) {
                        break 'session;
                    }
                }
                Err(e) => warn!("Ignoring undecodable frame {:?}: {}", line, e),
            }
        }
    }

    finished.store(true, Ordering::SeqCst);
    debug!("xhr poll task ended");
}

async fn send_loop(
    client: Client,
    url: Url,
    mut send_rx: mpsc::UnboundedReceiver<String>,
    callbacks: TransportCallbacks,
) {
    while let Some(body) = send_rx.recv().await {
        debug!("Sending frame: {}", body);
        let result = client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!("xhr_send returned {}", response.status());
                callbacks.error(format!("xhr_send returned {}", response.status()));
                break;
            }
            Err(e) => {
                warn!("xhr_send failed: {}", e);
                callbacks.error(format!("xhr_send failed: {}", e));
                break;
            }
        }
    }
    debug!("xhr send task ended");
}
