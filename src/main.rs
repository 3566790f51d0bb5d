use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use recipe_imager::models::{Config, GeneratedImageMap, ImageProvider};
use recipe_imager::registry::GENERATE_IMAGES;
use recipe_imager::{
    html, server, AcquisitionHooks, AcquisitionOutcome, AcquisitionRegistry, AcquisitionRequest,
    ImageAcquirer,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "recipe-imager")]
#[command(about = "Generate WebP images for recipe articles")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Derive prompts from an article and generate one image per slot.
    Acquire {
        /// Article text file, or `-` to read from stdin.
        #[arg(long, value_name = "FILE")]
        article: PathBuf,

        /// Prompt model override.
        #[arg(long)]
        model: Option<String>,

        /// Image provider (stability or leonardo). Defaults to the configured preference.
        #[arg(long, value_parser = parse_provider_arg)]
        provider: Option<ImageProvider>,

        /// Print HTML image blocks instead of JSON.
        #[arg(long)]
        html: bool,

        /// Focus keyword used in alt text with --html.
        #[arg(long, default_value = "recipe")]
        keyword: String,
    },
    /// Run the WebP conversion service.
    Serve {
        #[arg(long)]
        port: Option<u16>,

        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
}

fn parse_provider_arg(input: &str) -> std::result::Result<ImageProvider, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid provider '{}'. Expected stability or leonardo", input))
}

struct LoggingHooks;

impl AcquisitionHooks for LoggingHooks {
    fn on_started(&self) {
        info!("Generating images...");
    }

    fn on_completed(&self) {
        info!("Image generation finished");
    }

    fn on_images_ready(&self, images: &GeneratedImageMap) {
        info!("{} image(s) ready", images.len());
    }

    fn on_error(&self, message: &str) {
        error!("Image generation failed: {}", message);
    }
}

fn read_article(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut article = String::new();
        std::io::stdin()
            .read_to_string(&mut article)
            .context("Failed to read article from stdin")?;
        return Ok(article);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read article from {}", path.display()))
}

async fn acquire(
    article: PathBuf,
    model: Option<String>,
    provider: Option<ImageProvider>,
    as_html: bool,
    keyword: String,
) -> Result<()> {
    let config = Config::from_env()?;
    let provider = match provider {
        Some(provider) => provider,
        None => config.resolve_image_provider()?,
    };

    let article = read_article(&article)?;
    let mut request = AcquisitionRequest::new(article, provider);
    if let Some(model) = model {
        request = request.with_model(model);
    }

    let registry = AcquisitionRegistry::global();
    let acquirer = Arc::new(ImageAcquirer::from_config(&config, Arc::new(LoggingHooks)));
    let _registration = registry.register(GENERATE_IMAGES, acquirer);

    let outcome = registry
        .trigger(GENERATE_IMAGES, request)
        .await
        .ok_or_else(|| anyhow!("No image acquirer registered"))?;

    match outcome {
        AcquisitionOutcome::Completed(images) => {
            if as_html {
                print!("{}", html::image_blocks(&images, &keyword));
            } else {
                println!("{}", serde_json::to_string_pretty(&images)?);
            }
            Ok(())
        }
        AcquisitionOutcome::Rejected => Err(anyhow!("Article text is empty")),
        AcquisitionOutcome::Busy => Err(anyhow!("Image acquisition already in progress")),
        AcquisitionOutcome::Failed(message) => Err(anyhow!(message)),
    }
}

async fn serve(port: Option<u16>, output_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::from_env()?;
    let port = port.unwrap_or(config.converter_port);
    let output_dir = output_dir.unwrap_or(config.converter_output_dir);

    server::run(port, output_dir).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_imager=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let result = match args.command {
        Command::Acquire {
            article,
            model,
            provider,
            html,
            keyword,
        } => acquire(article, model, provider, html, keyword).await,
        Command::Serve { port, output_dir } => serve(port, output_dir).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_arg_valid() {
        assert_eq!(parse_provider_arg("leonardo").unwrap(), ImageProvider::Leonardo);
    }

    #[test]
    fn test_parse_provider_arg_invalid() {
        let err = parse_provider_arg("dalle").unwrap_err();
        assert!(err.contains("Expected stability or leonardo"));
    }

    #[test]
    fn test_cli_parses_acquire() {
        let args = CliArgs::try_parse_from([
            "recipe-imager",
            "acquire",
            "--article",
            "-",
            "--provider",
            "stability",
            "--html",
        ])
        .unwrap();

        match args.command {
            Command::Acquire {
                article,
                provider,
                html,
                keyword,
                ..
            } => {
                assert_eq!(article, PathBuf::from("-"));
                assert_eq!(provider, Some(ImageProvider::Stability));
                assert!(html);
                assert_eq!(keyword, "recipe");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
