// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! User-facing notices posted by the broker
//!
//! Posting is fire-and-forget: the broker never waits for a notice to be
//! displayed, and a notice that cannot be delivered does not change the
//! result of the operation that raised it.

use tokio::sync::mpsc;

/// Notices the broker can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    /// An enrollment was requested while an identity is already present
    OnlyOneIdentitySupported,
}

impl Notice {
    /// Stable key for localized lookups
    pub fn message_key(&self) -> &'static str {
        match self {
            Notice::OnlyOneIdentitySupported => "only_one_account_supported",
        }
    }

    /// Default English text
    pub fn message(&self) -> &'static str {
        match self {
            Notice::OnlyOneIdentitySupported => "Only one identity is supported.",
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Sink for notices; implementations must not block the caller
pub trait Notifier: Send + Sync {
    fn post(&self, notice: Notice);
}

/// Notifier that hands notices to the primary context over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier for ChannelNotifier {
    fn post(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!(
                key = notice.message_key(),
                "Notice receiver is gone; dropping notice"
            );
        }
    }
}

/// Receiving end drained by the primary/UI context
#[derive(Debug)]
pub struct NoticeReceiver {
    rx: mpsc::UnboundedReceiver<Notice>,
}

impl NoticeReceiver {
    /// Wait for the next notice; `None` once every notifier is dropped
    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }

    /// Take a pending notice without waiting
    pub fn try_recv(&mut self) -> Option<Notice> {
        self.rx.try_recv().ok()
    }

    /// Take every notice that is already queued
    pub fn drain(&mut self) -> Vec<Notice> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Create a connected notifier/receiver pair
pub fn notice_channel() -> (ChannelNotifier, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotifier { tx }, NoticeReceiver { rx })
}
