//! User-visible notices raised at operation boundaries.
//!
//! SYSTEM CONTEXT
//! ==============
//! The auth context and dashboard catch service errors and report them here
//! instead of printing directly, so the presentation layer (CLI, tests) picks
//! how a notice is shown.

/// A single success or error notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Error(message) => message,
        }
    }
}

/// Sink for user-visible notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn success(&self, message: &str) {
        self.notify(Notice::Success(message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.notify(Notice::Error(message.to_owned()));
    }
}

/// Writes notices to stderr, keeping stdout free for command output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Success(message) => {
                tracing::debug!(%message, "notice");
                eprintln!("ok: {message}");
            }
            Notice::Error(message) => {
                tracing::debug!(%message, "error notice");
                eprintln!("error: {message}");
            }
        }
    }
}

/// Discards every notice.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, notice: Notice) {
        tracing::trace!(message = notice.message(), "notice suppressed");
    }
}
