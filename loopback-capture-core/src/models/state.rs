use std::fmt;

/// Capture session lifecycle.
///
/// State transitions:
/// ```text
/// uninitialized → initialized → capturing → stopping → stopped
///                      ↑                                  │
///                      └──────────── start ───────────────┘
/// any state ── close ──→ closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Uninitialized,
    Initialized,
    Capturing,
    Stopping,
    Stopped,
    Closed,
}

impl CaptureState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether `start` is allowed from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    /// Whether the native engine handle is held in this state.
    pub fn holds_engine(&self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Capturing => "capturing",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
