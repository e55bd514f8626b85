//! Queue backend: analysis processes send encoded facts to the filler
//! daemon, which is the corpus's only writer.

pub mod daemon;
pub mod message;
pub mod queue;
pub mod writer;

pub use daemon::{Daemon, DaemonReport, StopHandle};
pub use message::{Message, Value};
pub use queue::{QueueReceiver, QueueSender};
pub use writer::{FactWriter, WriterCommand, WriterOptions, WriterStats};
