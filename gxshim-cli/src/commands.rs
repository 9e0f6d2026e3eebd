// CLI command handlers
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;

use gxshim_runtime::runtime::LogSink;
use gxshim_runtime::texture::loader::save_rgba_png;
use gxshim_runtime::texture::{decode, size, Palette, TextureFormat, TlutFormat};
use gxshim_runtime::{
    FrameStats, GxProcessor, ImageStore, RecordingBackend, RenderBackend, ReplayReport, ShimConfig,
};

/// Image bytes registered under a display-list texture token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenImage {
    pub token: u32,
    pub path: PathBuf,
}

/// Everything a replay produced.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub report: ReplayReport,
    pub frame: FrameStats,
    /// Digest of the recorded draw stream, when replaying without a GPU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<u32>,
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

/// Parse a texture format by name (`RGB5A3`) or by GX code (`5`, `0xE`).
pub fn parse_format(s: &str) -> Result<u8, String> {
    if let Some(format) = TextureFormat::ALL
        .iter()
        .find(|f| f.name().eq_ignore_ascii_case(s))
    {
        return Ok(*format as u8);
    }
    let code = parse_number(s)?;
    u8::try_from(code)
        .ok()
        .and_then(TextureFormat::from_gx)
        .map(|f| f as u8)
        .ok_or_else(|| format!("unknown texture format '{s}'"))
}

/// Parse `TOKEN=PATH`.
pub fn parse_token_image(s: &str) -> Result<TokenImage, String> {
    let (token, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TOKEN=PATH, got '{s}'"))?;
    if path.is_empty() {
        return Err(format!("missing path in '{s}'"));
    }
    Ok(TokenImage {
        token: parse_number(token)?,
        path: PathBuf::from(path),
    })
}

fn register_images<B: RenderBackend>(
    gx: &mut GxProcessor<B>,
    images: &[TokenImage],
) -> Result<()> {
    for image in images {
        let bytes = fs::read(&image.path)
            .with_context(|| format!("Failed to read texture {}", image.path.display()))?;
        info!(
            "token {:#X} -> {} ({} bytes)",
            image.token,
            image.path.display(),
            bytes.len()
        );
        let key = gx.images_mut().insert(bytes);
        gx.tokens_mut().register(image.token, key);
    }
    Ok(())
}

/// Processor for a CLI replay, with per-frame summaries going to the log.
fn replay_processor<B: RenderBackend>(backend: B, config: ShimConfig) -> GxProcessor<B> {
    let mut gx = replay_processor(backend, config);
    gx.telemetry_mut().set_sink(Box::new(LogSink));
    gx
}

fn replay_frame<B: RenderBackend>(gx: &mut GxProcessor<B>, list: &[u8]) -> (ReplayReport, FrameStats) {
    gx.begin_frame();
    let report = gx.call_display_list(list);
    let frame = gx.end_frame();
    (report, frame)
}

fn read_list(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read display list {}", path.display()))
}

/// Replay `path` against a recording backend.
pub fn replay_file(path: &Path, images: &[TokenImage], config: ShimConfig) -> Result<ReplaySummary> {
    let list = read_list(path)?;
    let mut gx = replay_processor(RecordingBackend::new(), config);
    register_images(&mut gx, images)?;
    let (report, frame) = replay_frame(&mut gx, &list);
    Ok(ReplaySummary {
        report,
        frame,
        digest: Some(gx.backend().digest()),
    })
}

/// Replay `path` on the offscreen GPU backend and save the frame to `png`.
#[cfg(feature = "wgpu")]
pub fn replay_to_png(
    path: &Path,
    images: &[TokenImage],
    config: ShimConfig,
    png: &Path,
) -> Result<ReplaySummary> {
    use gxshim_runtime::WgpuBackend;

    let list = read_list(path)?;
    let backend = WgpuBackend::from_config(&config).context("Failed to create GPU backend")?;
    let mut gx = GxProcessor::with_config(backend, ImageStore::new(), config);
    register_images(&mut gx, images)?;
    let (report, frame) = replay_frame(&mut gx, &list);

    let (width, height) = gx.backend().size();
    let pixels = gx
        .backend_mut()
        .read_frame()
        .context("Failed to read back frame")?;
    save_rgba_png(png, width, height, &pixels)?;
    Ok(ReplaySummary {
        report,
        frame,
        digest: None,
    })
}

pub fn print_summary(summary: &ReplaySummary) {
    let report = &summary.report;
    println!(
        "Replayed {} commands ({} bytes), {} draws",
        report.commands, report.bytes_consumed, report.draws
    );
    println!(
        "  vertices: {}, textured: {}, untextured: {}",
        summary.frame.vertices, summary.frame.textured_draws, summary.frame.untextured_draws
    );
    let shaders: Vec<_> = summary.frame.shaders_used().map(|p| p.name()).collect();
    if !shaders.is_empty() {
        println!("  shaders: {}", shaders.join(", "));
    }
    for anomaly in &report.anomalies {
        println!("  anomaly: {anomaly:?}");
    }
    if let Some(digest) = summary.digest {
        println!("  digest: {digest:08X}");
    }
    if let Some(fault) = &report.fault {
        println!("  stopped: {fault}");
    }
}

/// Decode an encoded texture file and write it as PNG.
pub fn decode_file(
    path: &Path,
    width: u32,
    height: u32,
    format: u8,
    tlut: Option<&Path>,
    tlut_format: u32,
    output: &Path,
) -> Result<()> {
    if width == 0 || height == 0 {
        bail!("texture has degenerate size {width}x{height}");
    }
    let data = fs::read(path).with_context(|| format!("Failed to read texture {}", path.display()))?;
    let expected = size(width, height, format);
    if data.len() < expected {
        warn!(
            "{} holds {} bytes, a {}x{} texture needs {}",
            path.display(),
            data.len(),
            width,
            height,
            expected
        );
    }

    let tlut_bytes = match tlut {
        Some(tlut) => Some(
            fs::read(tlut).with_context(|| format!("Failed to read palette {}", tlut.display()))?,
        ),
        None => None,
    };
    let tlut_format = u8::try_from(tlut_format)
        .ok()
        .and_then(TlutFormat::from_gx)
        .with_context(|| format!("unknown palette format {tlut_format}"))?;
    let palette = tlut_bytes
        .as_deref()
        .map(|entries| Palette::new(tlut_format, entries));

    if TextureFormat::from_gx(format).is_some_and(TextureFormat::is_indexed) && palette.is_none() {
        warn!("palette format without --tlut; output will be a fill color");
    }

    let rgba = decode(&data, width, height, format, palette.as_ref());
    save_rgba_png(output, width, height, &rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Ok(42));
        assert_eq!(parse_number("0x1F"), Ok(31));
        assert!(parse_number("zz").is_err());
    }

    #[test]
    fn test_parse_format_by_name_and_code() {
        assert_eq!(parse_format("rgb5a3"), Ok(TextureFormat::RGB5A3 as u8));
        assert_eq!(parse_format("CMPR"), Ok(0xE));
        assert_eq!(parse_format("0x9"), Ok(0x9));
        assert!(parse_format("7").is_err());
        assert!(parse_format("300").is_err());
    }

    #[test]
    fn test_parse_token_image() {
        let image = parse_token_image("0x100=tex/a.bin").unwrap();
        assert_eq!(image.token, 0x100);
        assert_eq!(image.path, PathBuf::from("tex/a.bin"));
        assert!(parse_token_image("0x100").is_err());
        assert!(parse_token_image("0x100=").is_err());
    }

    #[test]
    fn test_replay_file_reports_draws() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("list.dl");
        // Position direct F32, one triangle.
        let mut list = vec![0x08, 0x50, 0x00, 0x00, 0x02, 0x00];
        list.extend_from_slice(&[0x08, 0x70, 0x00, 0x00, 0x00, 0x09]);
        list.extend_from_slice(&[0x90, 0x00, 0x03]);
        for i in 0..9 {
            list.extend_from_slice(&(i as f32).to_be_bytes());
        }
        fs::write(&list_path, &list).unwrap();

        let summary = replay_file(&list_path, &[], ShimConfig::default()).unwrap();
        assert!(summary.report.is_complete());
        assert_eq!(summary.report.draws, 1);
        assert_eq!(summary.frame.vertices, 3);
        assert!(summary.digest.is_some());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["report"]["draws"], 1);
        assert!(json["report"]["fault"].is_null());
    }

    #[test]
    fn test_replay_processor_logs_frames() {
        let mut gx = replay_processor(RecordingBackend::new(), ShimConfig::default());
        assert!(gx.telemetry().has_sink());
        let (report, frame) = replay_frame(&mut gx, &[0x00]);
        assert!(report.is_complete());
        assert_eq!(frame.draw_calls, 0);
        assert_eq!(gx.telemetry().frame_number(), 1);
    }

    #[test]
    fn test_replay_file_registers_token_images() {
        let dir = tempfile::tempdir().unwrap();
        let texture = dir.path().join("tex.bin");
        fs::write(&texture, [0u8; 32]).unwrap();
        let list_path = dir.path().join("list.dl");
        // BP 0x94: texture map 0 image token 0x100.
        fs::write(&list_path, [0x61, 0x94, 0x00, 0x01, 0x00]).unwrap();

        let images = [TokenImage {
            token: 0x100,
            path: texture,
        }];
        let summary = replay_file(&list_path, &images, ShimConfig::default()).unwrap();
        assert!(summary.report.anomalies.is_empty());

        let summary = replay_file(&list_path, &[], ShimConfig::default()).unwrap();
        assert_eq!(summary.report.anomalies.len(), 1);
    }

    #[test]
    fn test_replay_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = replay_file(&dir.path().join("absent.dl"), &[], ShimConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("absent.dl"));
    }

    #[test]
    fn test_decode_file_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tex.bin");
        let output = dir.path().join("tex.png");
        fs::write(&input, vec![0xFFu8; size(8, 8, TextureFormat::I4 as u8)]).unwrap();

        decode_file(&input, 8, 8, TextureFormat::I4 as u8, None, 2, &output).unwrap();
        let png = image::open(&output).unwrap().to_rgba8();
        assert_eq!(png.dimensions(), (8, 8));
        assert_eq!(png.get_pixel(3, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_decode_file_rejects_bad_palette_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tex.bin");
        fs::write(&input, [0u8; 32]).unwrap();
        let result = decode_file(&input, 8, 8, 0x8, None, 7, &dir.path().join("out.png"));
        assert!(result.is_err());
    }
}
