use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_dubber::cli::{Cli, Commands};
use video_dubber::config::{Config, LoggingConfig};
use video_dubber::pipeline::{DubPipeline, DubRequest, PipelineState};
use video_dubber::synthesize::{VoiceMap, VoicePolicy};
use video_dubber::{output, server, utils};

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_filter = if verbose {
        "video_dubber=debug,tower_http=debug".to_string()
    } else {
        logging.level.clone()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_voices() {
    println!("Supported languages:");
    for (language, voice) in VoiceMap::entries() {
        println!("  • {:<10} {}", language, voice);
    }
}

async fn warn_missing_dependencies(config: &Config) {
    let missing_deps = utils::check_dependencies(&config.tools.yt_dlp, &config.tools.edge_tts).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Voices needs no configuration at all
    if matches!(cli.command, Commands::Voices) {
        print_voices();
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            warn_missing_dependencies(&config).await;
            server::serve(&config).await?;
        }
        Commands::Dub {
            url,
            language,
            output,
            lenient,
        } => {
            if lenient {
                config.pipeline.voice_policy = VoicePolicy::Lenient;
            }

            warn_missing_dependencies(&config).await;
            let pipeline = DubPipeline::from_config(&config)?;

            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            progress.enable_steady_tick(Duration::from_millis(120));

            let observer = {
                let progress = progress.clone();
                move |state: &PipelineState| progress.set_message(state.describe())
            };

            let request = DubRequest::new(url, &language);
            let result = pipeline.run_with_observer(&request, &observer).await;

            match result {
                Ok(dubbed) => {
                    progress.finish_with_message("Dub complete");
                    let bytes = output::save_to_file(&dubbed, &output).await?;

                    if cli.verbose {
                        println!("{}", style("Transcript:").bold());
                        println!("{}\n", dubbed.transcript().text);
                        println!("{}", style("Translation:").bold());
                        println!("{}\n", dubbed.translation());
                    }

                    println!(
                        "{} Dubbed audio ({} bytes, voice {}) saved to: {}",
                        style("✔").green(),
                        bytes,
                        dubbed.voice(),
                        output.display()
                    );
                }
                Err(err) => {
                    progress.abandon_with_message("Dub failed");
                    let stage = err.stage().map(|s| s.as_str()).unwrap_or("request");
                    eprintln!("{} [{}] {}", style("✘").red(), stage, err);
                    std::process::exit(1);
                }
            }
        }
        Commands::Config { init: true, .. } => {
            let path = Config::default_path()?;
            if path.exists() {
                anyhow::bail!("Config file already exists: {}", path.display());
            }
            Config::default().save(&path)?;
            println!("Wrote default configuration to: {}", path.display());
        }
        Commands::Config { .. } => config.display(),
        Commands::Voices => print_voices(),
    }

    Ok(())
}
