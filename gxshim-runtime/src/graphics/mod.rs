pub mod backend;
pub mod gx;

pub use backend::{RecordingBackend, RenderBackend};
pub use gx::GxProcessor;
