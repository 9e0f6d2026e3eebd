// CLI application
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use gxshim_runtime::ShimConfig;
use indicatif::{ProgressBar, ProgressStyle};

mod commands;

use commands::{parse_format, parse_number, parse_token_image, TokenImage};

#[derive(Parser)]
#[command(name = "gxshim")]
#[command(about = "GameCube GX display-list and texture tool")]
#[command(version)]
struct Cli {
    /// Log at debug level (otherwise RUST_LOG decides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Shim configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Replay a raw display list and report what it did
    Replay {
        /// Path to the display-list bytes
        file: PathBuf,

        /// Register image bytes under a texture token, as TOKEN=PATH
        #[arg(short, long = "texture", value_parser = parse_token_image)]
        textures: Vec<TokenImage>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Render offscreen and write the frame as PNG
        #[cfg(feature = "wgpu")]
        #[arg(long)]
        png: Option<PathBuf>,
    },
    /// Decode a GX texture to PNG
    Decode {
        /// Path to the encoded texture bytes
        file: PathBuf,

        #[arg(short = 'W', long, value_parser = parse_number)]
        width: u32,

        #[arg(short = 'H', long, value_parser = parse_number)]
        height: u32,

        /// Format name (I4, RGB5A3, CMPR, ...) or GX code
        #[arg(short, long, value_parser = parse_format)]
        format: u8,

        /// Palette bytes for C4, C8 and C14X2 textures
        #[arg(long)]
        tlut: Option<PathBuf>,

        /// Palette entry encoding: 0 = IA8, 1 = RGB565, 2 = RGB5A3
        #[arg(long, default_value = "2", value_parser = parse_number)]
        tlut_format: u32,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the storage size of a texture
    Size {
        #[arg(value_parser = parse_number)]
        width: u32,

        #[arg(value_parser = parse_number)]
        height: u32,

        /// Format name or GX code
        #[arg(value_parser = parse_format)]
        format: u8,
    },
    /// Write the effective configuration (defaults unless --config is given)
    Config {
        /// Destination file
        #[arg(default_value = "gxshim.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let config = match &cli.config {
        Some(path) => ShimConfig::load(path)?,
        None => ShimConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            file,
            textures,
            json,
            #[cfg(feature = "wgpu")]
            png,
        } => {
            let pb = create_progress_bar("Replaying display list...");
            #[cfg(feature = "wgpu")]
            let summary = match png {
                Some(png) => commands::replay_to_png(&file, &textures, config, &png)?,
                None => commands::replay_file(&file, &textures, config)?,
            };
            #[cfg(not(feature = "wgpu"))]
            let summary = commands::replay_file(&file, &textures, config)?;
            pb.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                commands::print_summary(&summary);
            }
            if let Some(fault) = &summary.report.fault {
                bail!("replay of {} stopped: {}", file.display(), fault);
            }
        }
        Commands::Decode {
            file,
            width,
            height,
            format,
            tlut,
            tlut_format,
            output,
        } => {
            commands::decode_file(
                &file,
                width,
                height,
                format,
                tlut.as_deref(),
                tlut_format,
                &output,
            )?;
            println!("Wrote {}x{} texture to {}", width, height, output.display());
        }
        Commands::Size {
            width,
            height,
            format,
        } => {
            println!("{}", gxshim_runtime::texture::size(width, height, format));
        }
        Commands::Config { output } => {
            config.save(&output)?;
            println!("Wrote configuration to {}", output.display());
        }
    }

    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb
}
