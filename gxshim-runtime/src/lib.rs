//! GameCube GX fixed-function GPU emulation.
//!
//! [`GxProcessor`] owns the GX register file and turns GX API calls and
//! recorded display lists into draws on a shader-based [`RenderBackend`].
//! Texture bytes come from an [`ImageSource`]; display lists refer to them
//! through a [`TokenTable`].

pub mod config;
pub mod error;
pub mod graphics;
pub mod runtime;
pub mod texture;

pub use config::ShimConfig;
pub use error::{BackendError, ReplayFault, TextureError};
pub use graphics::backend::{RecordingBackend, RenderBackend};
pub use graphics::gx::displaylist::{Anomaly, ReplayReport};
#[cfg(feature = "wgpu")]
pub use graphics::gx::pipeline::WgpuBackend;
pub use graphics::gx::GxProcessor;
pub use runtime::telemetry::{FrameStats, GxTelemetry};
pub use texture::loader::{ImageKey, ImageSource, ImageStore, TokenTable};
