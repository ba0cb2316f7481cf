use std::fmt;

/// Opaque handle naming one viewer attached to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(pub u32);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Progress of one enumeration cycle, sent from the background source to
/// the engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The pool went from empty to non-empty. At most once per cycle.
    FirstAvailable { cycle: u64 },
    /// Enumeration reached the end of the tree or the last result page.
    Complete { cycle: u64, total: usize },
    /// Enumeration gave up early; items found so far stay in the pool.
    Failed { cycle: u64, message: String },
}

impl SourceEvent {
    pub fn cycle(&self) -> u64 {
        match self {
            Self::FirstAvailable { cycle }
            | Self::Complete { cycle, .. }
            | Self::Failed { cycle, .. } => *cycle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Playing,
    Paused,
    Stopped,
}

/// Requests delivered to the engine task.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
    Next(ConsumerId),
    Previous(ConsumerId),
    /// The presenter finished playing a clip.
    VideoEnded(ConsumerId),
    /// The presenter's layout changed; re-read its slot count.
    SlotsChanged(ConsumerId),
    /// Add to the slide duration override, in seconds.
    AdjustDuration(f64),
}
