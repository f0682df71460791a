pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{Config, PipelineConfig, Venue};
pub use error::DealscoutError;
pub use events::{EventSink, Phase, ProgressEvent, ProgressKind};
pub use types::*;
