//! GX telemetry
//!
//! Counts draws, vertices and feature usage per frame and over the lifetime
//! of a processor. The counters are observational only; nothing in the
//! pipeline reads them back.

use std::collections::{HashMap, HashSet};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::graphics::gx::tev::ShaderProgram;
use crate::graphics::gx::vertex::GxPrimitive;
use crate::texture::ImageKey;

/// Counters for one frame, or for the lifetime of a processor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub draw_calls: u64,
    pub vertices: u64,
    /// Bit per `ShaderProgram` used.
    pub shader_mask: u32,
    /// Bit per `GxPrimitive` used.
    pub primitive_mask: u32,
    pub textured_draws: u64,
    pub untextured_draws: u64,
    pub depth_draws: u64,
    pub blend_draws: u64,
    pub unique_textures: u64,
    pub unimplemented_hits: u64,
}

impl FrameStats {
    /// A frame is valid when it drew something and hit nothing unimplemented.
    pub fn is_valid(&self) -> bool {
        self.unimplemented_hits == 0 && self.draw_calls > 0 && self.vertices > 0
    }

    pub fn shaders_used(&self) -> impl Iterator<Item = ShaderProgram> + '_ {
        ShaderProgram::ALL
            .into_iter()
            .filter(|p| self.shader_mask & p.mask_bit() != 0)
    }
}

/// What one submitted draw contributes to the counters.
#[derive(Debug, Clone, Copy)]
pub struct DrawRecord {
    pub program: ShaderProgram,
    pub primitive: GxPrimitive,
    pub vertices: u32,
    pub texture: Option<ImageKey>,
    pub depth: bool,
    pub blend: bool,
}

/// Receiver for finished frame statistics.
pub trait TelemetrySink {
    fn frame_finished(&mut self, frame: u64, stats: &FrameStats);
}

/// Sink that writes a one-line summary per frame through `log`.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn frame_finished(&mut self, frame: u64, stats: &FrameStats) {
        info!(
            "frame {}: {} draws, {} vertices, {} textures{}",
            frame,
            stats.draw_calls,
            stats.vertices,
            stats.unique_textures,
            if stats.is_valid() { "" } else { " (invalid)" },
        );
    }
}

/// Lifetime and per-frame GX counters.
pub struct GxTelemetry {
    lifetime: FrameStats,
    frame: FrameStats,
    frame_number: u64,
    frame_textures: HashSet<ImageKey>,
    lifetime_textures: HashSet<ImageKey>,
    unimplemented: HashMap<&'static str, u64>,
    sink: Option<Box<dyn TelemetrySink>>,
}

impl GxTelemetry {
    pub fn new() -> Self {
        Self {
            lifetime: FrameStats::default(),
            frame: FrameStats::default(),
            frame_number: 0,
            frame_textures: HashSet::new(),
            lifetime_textures: HashSet::new(),
            unimplemented: HashMap::new(),
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sink = Some(sink);
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn begin_frame(&mut self) {
        self.frame = FrameStats::default();
        self.frame_textures.clear();
    }

    /// Close the current frame, hand it to the sink and return it.
    pub fn end_frame(&mut self) -> FrameStats {
        let stats = std::mem::take(&mut self.frame);
        self.frame_textures.clear();
        if let Some(sink) = self.sink.as_mut() {
            sink.frame_finished(self.frame_number, &stats);
        }
        self.frame_number += 1;
        stats
    }

    pub fn record_draw(&mut self, draw: &DrawRecord) {
        let new_in_frame = draw
            .texture
            .is_some_and(|key| self.frame_textures.insert(key));
        let new_in_lifetime = draw
            .texture
            .is_some_and(|key| self.lifetime_textures.insert(key));

        for (stats, new_texture) in [
            (&mut self.frame, new_in_frame),
            (&mut self.lifetime, new_in_lifetime),
        ] {
            stats.draw_calls += 1;
            stats.vertices += u64::from(draw.vertices);
            stats.shader_mask |= draw.program.mask_bit();
            stats.primitive_mask |= draw.primitive.mask_bit();
            if draw.texture.is_some() {
                stats.textured_draws += 1;
            } else {
                stats.untextured_draws += 1;
            }
            stats.depth_draws += u64::from(draw.depth);
            stats.blend_draws += u64::from(draw.blend);
            stats.unique_textures += u64::from(new_texture);
        }
    }

    /// Count a hit on a feature the shim does not implement. The first hit
    /// of each name is logged.
    pub fn record_unimplemented(&mut self, name: &'static str) {
        let hits = self.unimplemented.entry(name).or_insert(0);
        if *hits == 0 {
            warn!("GX feature not implemented: {}", name);
        }
        *hits += 1;
        self.frame.unimplemented_hits += 1;
        self.lifetime.unimplemented_hits += 1;
    }

    pub fn frame(&self) -> &FrameStats {
        &self.frame
    }

    pub fn lifetime(&self) -> &FrameStats {
        &self.lifetime
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Hits per unimplemented feature name.
    pub fn unimplemented(&self) -> &HashMap<&'static str, u64> {
        &self.unimplemented
    }

    pub fn reset(&mut self) {
        let sink = self.sink.take();
        *self = Self::new();
        self.sink = sink;
    }
}

impl Default for GxTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
