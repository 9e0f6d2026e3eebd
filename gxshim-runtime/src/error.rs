//! Error types for the GX shim
//!
//! Only a narrow set of conditions are surfaced as errors. Register writes are
//! total and never fail, so the types here cover:
//! - **Replay faults**: a display list that cannot be interpreted further
//! - **Texture errors**: a binding that cannot be resolved or decoded
//! - **Backend errors**: resource creation failures inside a render backend

use serde::Serialize;
use thiserror::Error;

/// Reason a display list stopped before its end.
///
/// A fault halts only the remainder of the list that raised it; every
/// command before `offset` has already been applied.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayFault {
    /// An opcode outside the command catalogue was encountered.
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    /// A command or its vertex payload runs past the end of the list.
    #[error("truncated command at offset {offset}: needs {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl ReplayFault {
    /// Byte offset of the command that raised the fault.
    pub fn offset(&self) -> usize {
        match self {
            Self::UnknownOpcode { offset, .. } | Self::Truncated { offset, .. } => *offset,
        }
    }
}

/// Failure to turn a texture binding into decoded pixels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// The texture map index is outside 0..8 or the binding was never made valid.
    #[error("texture map {0} is not bound")]
    Unbound(u8),

    /// The image source has no bytes for this key.
    #[error("image {0:#010X} not found in image source")]
    MissingImage(u32),

    /// The binding has a zero dimension.
    #[error("texture has degenerate size {width}x{height}")]
    EmptyImage { width: u16, height: u16 },

    /// The backend refused to create the resource.
    #[error("backend rejected texture upload: {0}")]
    Upload(#[from] BackendError),
}

/// Errors raised inside a render backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Texture dimensions exceed what the backend supports.
    #[error("texture {width}x{height} exceeds backend limit {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },

    /// Pixel buffer length does not match the texture dimensions.
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },

    /// Device or adapter setup failed.
    #[error("graphics device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Reading the render target back to the host failed.
    #[error("frame readback failed: {0}")]
    Readback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_offset_is_reported() {
        let fault = ReplayFault::UnknownOpcode {
            offset: 12,
            opcode: 0x7F,
        };
        assert_eq!(fault.offset(), 12);
        assert_eq!(fault.to_string(), "unknown opcode 0x7F at offset 12");
    }

    #[test]
    fn backend_error_converts_into_texture_error() {
        let err: TextureError = BackendError::PixelSizeMismatch {
            expected: 16,
            actual: 8,
        }
        .into();
        assert!(matches!(err, TextureError::Upload(_)));
    }
}
