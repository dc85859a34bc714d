//! Cooperative stop signalling between the executor and a running scanner

use std::time::Duration;
use tokio::sync::watch;

/// What a stop request asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopRequest {
    #[default]
    None,
    /// Stop as soon as convenient, within the optional grace period
    Requested { grace: Option<Duration> },
}

/// Sending half, owned by the executor
#[derive(Debug)]
pub struct StopSender {
    tx: watch::Sender<StopRequest>,
}

impl StopSender {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StopRequest::None);
        Self { tx }
    }

    /// Record a stop request; listeners created later still observe it
    pub fn request(&self, grace: Option<Duration>) {
        self.tx.send_replace(StopRequest::Requested { grace });
    }

    pub fn is_requested(&self) -> bool {
        matches!(*self.tx.borrow(), StopRequest::Requested { .. })
    }

    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StopSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half, handed to a scanner for the duration of one scan
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<StopRequest>,
}

impl StopListener {
    /// Listener that never fires, for scans driven outside an executor
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(StopRequest::None);
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(*self.rx.borrow(), StopRequest::Requested { .. })
    }

    /// Grace period attached to the stop request, if one was given
    pub fn grace(&self) -> Option<Duration> {
        match *self.rx.borrow() {
            StopRequest::Requested { grace } => grace,
            StopRequest::None => None,
        }
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&mut self) {
        if self
            .rx
            .wait_for(|req| matches!(req, StopRequest::Requested { .. }))
            .await
            .is_err()
        {
            // Sender gone: no stop can ever arrive
            std::future::pending::<()>().await;
        }
    }
}
