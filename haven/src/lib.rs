pub mod bucket;
pub mod chain;
pub mod context;
pub mod context_builder;
pub mod error;
pub mod progress;
pub mod registry;
pub mod retrieval;
mod rpc;
pub mod session;
pub mod tracing;
pub mod upload;
pub mod utils;
pub mod wallet;

pub use context::Context;
pub use context_builder::ContextBuilder;
pub use error::{HavenError, WaitStage};
pub use progress::{Progress, ProgressEvent};
pub use upload::{UploadError, UploadOutcome, UploadStage};

#[cfg(test)]
mod tests;
