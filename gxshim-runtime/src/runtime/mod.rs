pub mod telemetry;

pub use telemetry::{DrawRecord, FrameStats, GxTelemetry, LogSink, TelemetrySink};
