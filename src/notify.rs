//! One-shot user-visible notices, the engine-side replacement for the
//! portals' toast hook. Core operations report failures here instead of
//! throwing past the user-action boundary; the presentation layer drains
//! the receiver.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// Cloneable sending half handed to the scheduler and the action layer.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Notifier, UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx }, rx)
    }

    fn push(&self, level: Level, message: impl Into<String>) {
        // A closed receiver means the view is gone; dropping the notice is
        // the correct outcome then.
        let _ = self.tx.send(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Level::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }
}
