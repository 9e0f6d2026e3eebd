// Shim settings persistence
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunables for a `GxProcessor` instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Capacity in bytes of the per-draw vertex capture buffer.
    pub vertex_buffer_capacity: usize,
    /// Number of slots in the decoded texture ring.
    pub texture_cache_capacity: usize,
    /// Largest synthesized index list a single draw may use.
    pub max_indices: usize,
    /// Embedded framebuffer size, used by offscreen backends.
    pub efb_width: u32,
    pub efb_height: u32,
    /// When set, freshly decoded textures are written here as PNG.
    pub dump_textures: Option<PathBuf>,
    /// Log a warning for combiner setups that fall back to a default program.
    pub warn_unhandled_tev: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_capacity: 256 * 1024,
            texture_cache_capacity: 256,
            max_indices: 65535,
            efb_width: 640,
            efb_height: 480,
            dump_textures: None,
            warn_unhandled_tev: true,
        }
    }
}

impl ShimConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: ShimConfig =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}
