use anyhow::Result;
use clap::{Parser, Subcommand};
use illustra_acquire::ImageHandler;
use illustra_model::ImageConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "illustra")]
#[command(about = "Blog illustration image acquisition tool")]
#[command(version)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    /// TOML configuration file (defaults apply for anything it omits)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for and download images for a blog topic
    Search {
        /// Post topic (e.g., "electric cars")
        #[arg(short, long)]
        topic: String,

        /// Extra keywords appended to the topic
        #[arg(short, long, default_value = "")]
        keywords: String,

        /// Maximum number of images to return (config default_count if omitted)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Root directory for per-query image directories
        #[arg(long)]
        temp_root: Option<PathBuf>,

        /// Directory of fallback images
        #[arg(long)]
        defaults_dir: Option<PathBuf>,

        /// Skip the browser strategy and go straight to the HTTP scrape
        #[arg(long)]
        no_browser: bool,

        /// Print the result as JSON instead of one path per line
        #[arg(long)]
        json: bool,
    },

    /// Resolve a reported driver path to the actual executable
    Locate {
        /// Path reported by the driver installer
        #[arg(short, long)]
        path: PathBuf,

        /// Operating system to resolve for. "macos" or "darwin" (any case)
        /// enables candidate probing; any other value returns the path unchanged
        #[arg(long, default_value = std::env::consts::OS)]
        os: String,

        /// CPU architecture to resolve for ("arm"/"aarch64" pick the arm64 build, else x64)
        #[arg(long, default_value = std::env::consts::ARCH)]
        arch: String,

        /// Executable file name (config browser.executable_name if omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete everything under the image temp root
    Cleanup {
        /// Root directory to clean (config temp_root if omitted)
        #[arg(long)]
        temp_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Map log level, suppressing chatty CDP and HTTP crates at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,chromiumoxide=warn,tungstenite=warn,hyper=warn,hyper_util=warn",
        LogLevel::Trace => "trace,chromiumoxide=warn,tungstenite=warn,hyper=warn,hyper_util=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    let mut config = ImageConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            topic,
            keywords,
            count,
            temp_root,
            defaults_dir,
            no_browser,
            json,
        } => {
            if let Some(root) = temp_root {
                config.temp_root = root;
            }
            if let Some(dir) = defaults_dir {
                config.default_images_dir = dir;
            }
            if no_browser {
                config.browser.enabled = false;
            }
            let count = count.unwrap_or(config.default_count);

            tracing::info!(topic = %topic, keywords = %keywords, count, "Acquiring images");
            let handler = ImageHandler::from_config(&config).await?;
            let images = handler.search_and_download_images(&topic, &keywords, count).await;
            let featured = handler.select_featured_image(&images);

            if json {
                let output = serde_json::json!({
                    "images": images,
                    "featured": featured,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for path in &images {
                    println!("{}", path.display());
                }
                if let Some(path) = featured {
                    println!("featured: {}", path.display());
                }
            }

            match featured {
                Some(path) => tracing::info!(
                    images = images.len(),
                    featured = %path.display(),
                    "Image acquisition complete"
                ),
                None => tracing::warn!("No images acquired; continue without an illustration"),
            }
        }
        Commands::Locate { path, os, arch, name } => {
            let name = name.unwrap_or(config.browser.executable_name);
            let resolved = illustra_acquire::resolve_driver_path(&path, &os, &arch, &name);
            tracing::info!(
                reported = %path.display(),
                resolved = %resolved.display(),
                os = %os,
                arch = %arch,
                "Resolved driver path"
            );
            println!("{}", resolved.display());
        }
        Commands::Cleanup { temp_root } => {
            let root = temp_root.unwrap_or(config.temp_root);
            let removed = illustra_acquire::output::clean_root(&root);
            tracing::info!(root = %root.display(), removed, "Cleanup complete");
            println!("{removed}");
        }
    }

    Ok(())
}
