use std::path::PathBuf;

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::domain::{AppError, DownloadEvent};

/// Backlog allowed between two UI ticks before the worker waits
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// One channel per run: the worker holds the sender, the UI the receiver.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (EventSender { tx }, EventReceiver { rx })
}

/// Worker side. Must not be used from inside an async context.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<DownloadEvent>,
}

impl EventSender {
    pub fn send(&self, event: DownloadEvent) {
        if self.tx.blocking_send(event).is_err() {
            tracing::debug!("UI is gone, dropping download event");
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(DownloadEvent::Status(message.into()));
    }

    pub fn progress(&self, percent: f32) {
        self.send(DownloadEvent::Progress(percent.clamp(0.0, 100.0)));
    }

    pub fn completed(&self, path: PathBuf) {
        self.send(DownloadEvent::Completed(path));
    }

    pub fn failed(&self, error: AppError) {
        self.send(DownloadEvent::Failed(error));
    }
}

/// UI side, drained on every tick.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<DownloadEvent>,
}

impl EventReceiver {
    /// Everything queued so far, in send order. Never blocks.
    pub fn drain(&mut self) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}
