use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use reaction_finder::config::AppConfig;
use reaction_finder::llm::GeminiClient;
use reaction_finder::observability;
use reaction_finder::ocr::{TesseractRecognizer, TextExtractor};
use reaction_finder::pipeline::{ReactionPipeline, RecommendationReport};
use reaction_finder::preprocessing::{ImageNormalizer, ImageSource};
use reaction_finder::recommendation::RecommendationResult;
use reaction_finder::segmentation::LineSegmenter;

#[derive(Parser, Debug)]
#[command(
    name = "reaction-finder",
    version,
    about = "Recommend reaction images for a chat screenshot"
)]
struct Cli {
    /// OCR language codes, e.g. chi_sim+eng
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Print machine readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the chat lines recognized in a screenshot
    Lines { image: PathBuf },
    /// Recommend reaction images for a screenshot
    Recommend { image: PathBuf },
    /// Recommend reaction images for chat text given directly
    Text { text: String },
    /// Check that the language model credential works
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(lang) = &cli.lang {
        config.ocr.languages = lang.clone();
    }

    // Logs go to stderr, stdout carries the command output
    let _metrics_handle = observability::init_observability_with_config(config.observability.clone())?;
    info!("{}", config.summary());

    let outcome = match cli.command {
        Command::Lines { image } => print_lines(&config, image, cli.json).await,
        Command::Recommend { image } => {
            let pipeline = build_pipeline(&config)?;
            let report = pipeline.recommend(image, None).await?;
            print_report(&report, cli.json)
        }
        Command::Text { text } => {
            let pipeline = build_pipeline(&config)?;
            let report = pipeline.recommend_text(&text).await?;
            print_report(&report, cli.json)
        }
        Command::Check => check_language_model(&config).await,
    };

    observability::shutdown_tracing();
    outcome
}

fn build_pipeline(config: &AppConfig) -> Result<ReactionPipeline> {
    ReactionPipeline::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize pipeline: {}", e))
}

/// OCR only, so it needs no language model credential
async fn print_lines(config: &AppConfig, image: PathBuf, json: bool) -> Result<()> {
    config
        .validate_extraction()
        .map_err(|e| anyhow::anyhow!("OCR configuration validation failed: {}", e))?;

    let normalizer = ImageNormalizer::new(config.normalizer.clone());
    let source = ImageSource::from(image);
    let description = source.describe();

    let bitmap = match tokio::task::spawn_blocking(move || normalizer.normalize_source(&source)).await? {
        Ok(bitmap) => bitmap,
        Err(e) => {
            warn!(source = %description, error = %e, "Screenshot could not be read");
            eprintln!("Cannot read {}: {}", description, e);
            return Ok(());
        }
    };

    let extractor = TextExtractor::new(
        Arc::new(TesseractRecognizer::new(config.ocr.clone())),
        config.ocr.languages.clone(),
    );
    let text = extractor.extract(&bitmap).await;
    let lines = LineSegmenter::default().segment(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else if lines.is_empty() {
        println!("(no text recognized)");
    } else {
        for (index, line) in lines.iter().enumerate() {
            println!("{:>3}. {}", index + 1, line);
        }
    }
    Ok(())
}

fn print_report(report: &RecommendationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for line in &report.lines {
        println!("> {}", line);
    }
    if let Some(tone) = &report.tone {
        println!(
            "emotion={} tone={} intent={} confidence={:.2}",
            tone.emotion, tone.tone, tone.intent, tone.confidence
        );
    }
    if !report.keywords.is_empty() {
        let keywords: Vec<&str> = report.keywords.iter().collect();
        println!("keywords: {}", keywords.join(", "));
    }

    match &report.result {
        RecommendationResult::Matches { candidates } => {
            for candidate in candidates {
                match &candidate.caption {
                    Some(caption) => println!("{}  ({})", candidate.reference, caption),
                    None => println!("{}", candidate.reference),
                }
            }
        }
        RecommendationResult::NoMatch { message } => println!("{}", message),
    }
    Ok(())
}

async fn check_language_model(config: &AppConfig) -> Result<()> {
    config
        .llm
        .validate()
        .map_err(|e| anyhow::anyhow!("Language model configuration validation failed: {}", e))?;

    let client = GeminiClient::new(config.llm.clone())?;
    let reply = client
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Language model check failed: {}", e))?;

    info!(model = %config.llm.model, "Language model reachable");
    println!("{}: {}", config.llm.model, reply);
    Ok(())
}
