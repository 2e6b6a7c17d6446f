//! Focus-window preload scheduling, deduplication and cancellation.

mod loaders;
mod pipeline;
mod scheduler;
mod task;

pub use loaders::{ImageLoader, LoadTarget, ThumbnailLoader, Upscaler};
pub use pipeline::{PreloadCaches, PreloadPipeline};
pub use scheduler::Scheduler;
pub use task::{CancelHandle, Fingerprint, PreloadTask, TaskStatus};
