/// Recording session state machine.
///
/// Transitions:
/// ```text
/// idle → starting → running → pausing → paused → resuming → running
///           ↓          ↓                   ↓
///         idle      stopping ←─────────────┘
///  (start failed)      ↓
///                    idle
/// ```
///
/// `Starting`, `Pausing`, `Resuming` and `Stopping` are transient: they
/// are only observable while the corresponding control call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Pausing,
    Paused,
    Resuming,
    Stopping,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Whether a recording is in flight (running or paused).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Lower-case name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Pausing => "pausing",
            Self::Paused => "paused",
            Self::Resuming => "resuming",
            Self::Stopping => "stopping",
        }
    }
}
