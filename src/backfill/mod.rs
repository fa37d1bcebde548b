mod chunks;
mod executor;
mod orchestrator;
mod progress;
mod range;

pub use chunks::{chunk_count, plan};
pub use executor::{execute_chunk, ChunkOutcome, ChunkResult};
pub use orchestrator::{
    Orchestrator, RunOptions, RunSummary, TableReport, TableStatus, DEFAULT_STEP_SIZE,
};
pub use progress::{format_duration, BackfillEvent, ConsoleReporter, NullSink, ProgressSink};
pub use range::{resolve_range, BlockRange, ResolvedRange};
