mod cli;

use vidforge::{config, pipeline, server};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use vidforge_av::AudioProber;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over file and environment
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting vidforge server");
    tracing::info!(
        "Input dir {:?}, output dir {:?}",
        config.storage.input_dir,
        config.storage.output_dir
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidforge=trace,vidforge_av=trace,tower_http=debug".to_string()
        } else {
            "vidforge=debug,vidforge_av=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Run {
            input,
            actions,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(
                &input,
                &actions,
                output.as_deref(),
                cli.config.as_deref(),
            ))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config } => validate_config(config.as_deref()),
        Commands::Version => {
            println!("vidforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `--actions` takes inline JSON or `@path`.
fn read_actions(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read action file: {}", path)),
        None => Ok(arg.to_string()),
    }
}

fn default_output(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("Input has no file name: {:?}", input))?;
    Ok(output_dir.join(format!("edited_{}", name.to_string_lossy())))
}

async fn run_file(
    input: &Path,
    actions: &str,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let list: pipeline::ActionList = read_actions(actions)?
        .parse()
        .context("Invalid action list")?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => default_output(input, &config.storage.output_dir)?,
    };

    tracing::info!("Processing {:?} -> {:?}", input, output);

    let executor = pipeline::PipelineExecutor::new(config.tools.registry());
    let report = executor.execute(input, &output, &list).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(serde::Serialize)]
struct ProbeSummary {
    file: PathBuf,
    has_audio: bool,
    audio_codec: Option<String>,
    duration: Option<f64>,
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let prober = AudioProber::new(config.tools.registry());

    let audio_codec = prober
        .first_audio_codec(file)
        .await
        .with_context(|| format!("Failed to probe {:?}", file))?;
    let summary = ProbeSummary {
        file: file.to_path_buf(),
        has_audio: audio_codec.is_some(),
        audio_codec,
        duration: prober.duration(file).await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("File: {}", summary.file.display());
        match summary.audio_codec {
            Some(ref codec) => println!("Audio: {}", codec),
            None => println!("Audio: none"),
        }
        match summary.duration {
            Some(secs) => {
                let whole = secs as u64;
                println!(
                    "Duration: {:02}:{:02}:{:02} ({:.3}s)",
                    whole / 3600,
                    (whole / 60) % 60,
                    whole % 60,
                    secs
                );
            }
            None => println!("Duration: unknown"),
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = config.tools.registry().check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install FFmpeg or set tools.ffmpeg_path/ffprobe_path.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Auth enabled: {}", config.auth.enabled());
            println!("  Max upload: {} MB", config.server.max_upload_mb);
            println!("  Input dir: {}", config.storage.input_dir.display());
            println!("  Output dir: {}", config.storage.output_dir.display());
            println!("  Tool timeout: {}s", config.tools.timeout_secs);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
