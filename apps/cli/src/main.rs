use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_settings, CandidateFile, FormController, FormSnapshot, HttpGenerationBackend,
    ImagePolicy, Settings,
};
use shared::domain::{AspectRatio, MAX_PROMPT_CHARS};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "imagegen",
    about = "Generate an image from a prompt and an optional reference image"
)]
struct Args {
    /// Text describing the image to generate (up to 1000 characters)
    #[arg(long, short)]
    prompt: String,
    /// Reference image (jpeg, png, gif or webp, at most 10MB)
    #[arg(long, short)]
    image: Option<PathBuf>,
    /// One of 1:1, 16:9, 3:2, 2:3, 4:5, 5:4, 9:16, 3:4, 4:3
    #[arg(long, short, default_value = "1:1")]
    aspect_ratio: AspectRatio,
    /// Generation service base URL; overrides imagegen.toml and the environment
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Refuse to submit without a reference image
    #[arg(long)]
    require_image: bool,
    /// Save the result as generated.png
    #[arg(long)]
    download: bool,
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    check_prompt_length(&args.prompt)?;
    let settings = apply_args(load_settings().context("failed to load settings")?, &args)?;
    let backend = Arc::new(HttpGenerationBackend::new(&settings));
    let form = FormController::new(backend, settings);

    if let Some(path) = &args.image {
        let candidate = CandidateFile::from_path(path).await?;
        form.accept_file(candidate).await?;
    }
    form.set_prompt(args.prompt.as_str()).await;
    form.set_aspect_ratio(args.aspect_ratio).await;

    render(&form.snapshot().await);
    println!("Generating...");
    let url = form.submit().await?;
    println!("Generated image: {url}");

    if args.download {
        let path = form.download().await?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn apply_args(mut settings: Settings, args: &Args) -> Result<Settings> {
    if let Some(url) = &args.api_base_url {
        settings = settings
            .with_base_url(url)
            .context("invalid --api-base-url")?;
    }
    if let Some(ms) = args.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be greater than zero");
        settings.request_timeout = Duration::from_millis(ms);
    }
    if args.require_image {
        settings.image_policy = ImagePolicy::Required;
    }
    if let Some(dir) = &args.output_dir {
        settings.download_dir = dir.clone();
    }
    Ok(settings)
}

/// The whole `--prompt` value is one edit, so an over-long prompt ends the run.
fn check_prompt_length(prompt: &str) -> Result<()> {
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        anyhow::bail!("prompt is {chars} characters; the limit is {MAX_PROMPT_CHARS}");
    }
    Ok(())
}

fn render(snapshot: &FormSnapshot) {
    if let Some(name) = &snapshot.file_name {
        println!("Selected file: {name}");
    }
    println!("Prompt: {}", snapshot.prompt_counter());
    println!("Aspect ratio: {}", snapshot.aspect_ratio);
}
