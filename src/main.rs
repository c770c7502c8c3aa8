use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use upscale4k::handler::{HandlerError, Service, Storage, UploadResponse};
use upscale4k::retention::{self, RetentionPolicy};
use upscale4k::upscale::ArtifactResult;
use upscale4k::{config, output};

#[derive(Parser)]
#[command(name = "upscale4k")]
#[command(about = "Upscale images to a 3840px long edge")]
#[command(long_about = "\
Upscale images to a 3840px long edge

The longer side of every image becomes exactly 3840 pixels and the shorter
side follows the aspect ratio. A Real-ESRGAN engine is used when its
executable and model files are installed; otherwise (or when it fails) a
Lanczos3 resample produces the same dimensions.

Storage layout (paths set in config.toml):

  uploads/     # Received images: {unix_ts}_{token}_{name}
  processed/   # Artifacts: upscaled_{unix_ts}_{token}_{name}
  weights/     # realesrgan-x4plus.param / .bin (and optionally the executable)

Uploads and artifacts are deleted 10 minutes after they were written.

Run 'upscale4k gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply when missing)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload images and write their 4K artifacts to the processed directory
    Upscale {
        /// Images to upscale
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Skip the AI engine and use the Lanczos3 fallback only
        #[arg(long)]
        no_ai: bool,
        /// Print JSON response bodies instead of a readable report
        #[arg(long)]
        json: bool,
    },
    /// Copy an artifact out of the processed directory
    Fetch {
        /// Artifact filename as returned by `upscale`
        artifact: String,
        /// Destination directory
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },
    /// Delete uploads and artifacts older than 10 minutes
    Sweep {
        /// Run a single pass and report, instead of sweeping forever
        #[arg(long)]
        once: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Upscale {
            images,
            no_ai,
            json,
        } => {
            let service_config = config::load_config(&cli.config)?;
            let service = Service::start(&service_config, !no_ai)?;
            let _sweeper = retention::spawn_sweeper(
                service.storage().swept_dirs(),
                RetentionPolicy::default(),
            )?;
            if !json {
                output::print_capability(service.upscaler().capability());
            }

            let results: Vec<_> = images
                .par_iter()
                .map(|path| (path, upload_file(&service, path)))
                .collect();

            let mut succeeded = 0;
            for (path, result) in &results {
                let source = path.display().to_string();
                match result {
                    Ok(artifact) => {
                        succeeded += 1;
                        if json {
                            let response = UploadResponse::from(artifact);
                            println!("{}", output::format_response_json(&response));
                        } else {
                            output::print_upscale_success(&source, artifact);
                        }
                    }
                    Err(e) if json => {
                        println!("{}", output::format_error_json(&e.to_response()));
                    }
                    Err(e) => output::print_upscale_failure(&source, e),
                }
            }
            if !json {
                println!();
                println!("{}", output::format_upscale_summary(succeeded, results.len()));
            }
            if succeeded < results.len() {
                let failed = results.len() - succeeded;
                return Err(format!("{failed} of {} images failed", results.len()).into());
            }
        }
        Command::Fetch { artifact, dest } => {
            let service_config = config::load_config(&cli.config)?;
            let storage = Storage::from_config(&service_config.storage);
            let source = storage.resolve_artifact(&artifact)?;
            std::fs::create_dir_all(&dest)?;
            let target = dest.join(&artifact);
            std::fs::copy(&source, &target)?;
            println!("{} → {}", artifact, target.display());
        }
        Command::Sweep { once } => {
            let service_config = config::load_config(&cli.config)?;
            let storage = Storage::from_config(&service_config.storage);
            let dirs = storage.swept_dirs();
            let policy = RetentionPolicy::default();
            if once {
                let report = retention::sweep_once(&dirs, &policy, std::time::SystemTime::now());
                output::print_sweep_report(dirs.len(), &report);
            } else {
                retention::run_sweeper(&dirs, &policy);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run one local file through the upload boundary.
fn upload_file(service: &Service, path: &Path) -> Result<ArtifactResult, HandlerError> {
    let bytes = std::fs::read(path)?;
    let name = path.file_name().map(|n| n.to_string_lossy());
    service.process_upload(name.as_deref(), &bytes)
}
