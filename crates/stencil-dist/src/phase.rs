/// The stages a worker goes through during one run.
///
/// Phases only move forward; [`Phase::Done`] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Phase {
    /// Not started. The coordinator loads the image here.
    #[default]
    Idle,
    /// The coordinator sends the image dimensions to every worker.
    BroadcastDimensions,
    /// The coordinator sends the image pixels to every worker.
    BroadcastPixels,
    /// Every worker assembles its halo buffer and convolves its rows.
    ComputeLocal,
    /// The coordinator collects the local outputs.
    GatherResults,
    /// The run completed.
    Done,
}

impl Phase {
    /// The phase following this one, `None` once done.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::BroadcastDimensions),
            Phase::BroadcastDimensions => Some(Phase::BroadcastPixels),
            Phase::BroadcastPixels => Some(Phase::ComputeLocal),
            Phase::ComputeLocal => Some(Phase::GatherResults),
            Phase::GatherResults => Some(Phase::Done),
            Phase::Done => None,
        }
    }

    /// Name of the phase as shown in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::BroadcastDimensions => "broadcast dimensions",
            Phase::BroadcastPixels => "broadcast pixels",
            Phase::ComputeLocal => "compute local",
            Phase::GatherResults => "gather results",
            Phase::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
