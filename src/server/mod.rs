//! Accepting connections and running requests through the pipeline.

pub mod listener;
pub mod pipeline;
pub mod timer;

pub use listener::Server;
pub use pipeline::Pipeline;
pub use timer::IdleTimer;
