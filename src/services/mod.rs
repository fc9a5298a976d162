//! Services separating I/O and progress concerns from pipeline logic

pub mod io;
pub mod progress;

pub use io::{DirectorySink, MemorySink, NullSink, OutputSink, StdoutSink};
pub use progress::{ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
