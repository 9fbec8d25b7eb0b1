use anyhow::Context;
use clap::{Parser, Subcommand};
use floorplan_analyzer::{AnalysisRequest, AnalyzerConfig, Capabilities, FloorplanAnalyzer};
use room_segmentation::{DevicePreference, ModelCache};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Detect rooms in floor-plan images and export gbXML/OBJ geometry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segmentation weights (safetensors)
    #[arg(long, global = true, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Square input resolution of the network (multiple of 32)
    #[arg(long, global = true, value_name = "PIXELS")]
    image_size: Option<u32>,

    /// auto, cpu or cuda
    #[arg(long, global = true, value_name = "DEVICE")]
    device: Option<DevicePreference>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one or more floor-plan images
    Analyze {
        #[arg(required = true, value_name = "IMAGES")]
        images: Vec<PathBuf>,

        /// Known scale; skips scale detection
        #[arg(long, value_name = "PX_PER_M")]
        ppm: Option<f64>,

        /// Extrusion height in metres
        #[arg(long, value_name = "METRES")]
        floor_height: Option<f64>,

        #[arg(long, default_value = "Building")]
        building_name: String,

        /// Disable gap sealing in the fallback detector
        #[arg(long)]
        no_enhanced: bool,

        /// Parent directory for job artifacts
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Minimum room area in px²
        #[arg(long, value_name = "PX2")]
        min_area: Option<f64>,
    },
    /// Probe the runtime and load the model, then exit
    Preload,
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalyzerConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(model) = &cli.model {
        config.model.weights_path = Some(model.clone());
    }
    if let Some(size) = cli.image_size {
        config.model.image_size = size;
    }
    if let Some(device) = cli.device {
        config.model.device = device;
    }
    if let Command::Analyze {
        output_dir, min_area, ..
    } = &cli.command
    {
        if let Some(dir) = output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(area) = min_area {
            config.min_room_area = *area;
        }
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!("Starting floor-plan analyzer");

    let cache = Arc::new(ModelCache::new());
    let capabilities = {
        let cache = Arc::clone(&cache);
        let model = config.model.clone();
        tokio::task::spawn_blocking(move || Capabilities::probe(&cache, &model)).await?
    };

    match cli.command {
        Command::Preload => {
            println!("{}", serde_json::to_string_pretty(&capabilities)?);
            Ok(())
        }
        Command::Analyze {
            images,
            ppm,
            floor_height,
            building_name,
            no_enhanced,
            ..
        } => {
            let analyzer = Arc::new(FloorplanAnalyzer::new(config, cache, capabilities)?);
            if !analyzer.capabilities().segmentation {
                warn!("Segmentation model unavailable, analysing with the hybrid detector only");
            }

            let mut handles = Vec::with_capacity(images.len());
            for path in images {
                let analyzer = Arc::clone(&analyzer);
                let request_template = AnalysisRequest {
                    image_bytes: Vec::new(),
                    pixels_per_metre: ppm,
                    floor_height,
                    enhanced_segmentation: Some(!no_enhanced),
                    building_name: Some(building_name.clone()),
                };
                let handle = tokio::task::spawn_blocking(move || {
                    let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                    let request = AnalysisRequest {
                        image_bytes: bytes,
                        ..request_template
                    };
                    analyzer
                        .analyze(&request)
                        .map_err(|e| anyhow::anyhow!("{} [{}]", e, e.code()))
                        .with_context(|| format!("analysing {}", path.display()))
                });
                handles.push(handle);
            }

            let total = handles.len();
            let mut failed = 0;
            for handle in handles {
                match handle.await? {
                    Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    Err(e) => {
                        error!("{:#}", e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} analyses failed", failed, total);
            }
            Ok(())
        }
    }
}
