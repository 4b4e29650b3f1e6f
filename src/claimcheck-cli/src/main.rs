//! ClaimCheck CLI - Debate Fact-Checking Tool
//!
//! A command-line tool for extracting factual claims from a debate
//! transcript and checking them against web evidence.

use clap::Parser;
use colored::Colorize;
use claimcheck_core::{
    ClaimEvent, ClaimExtractor, ClaimOrchestrator, ClaimOutcome, Collaborators, Config,
    Diarization, EmptyCategorizer, FixedDiarizer, HttpTransport, LlmClaimExtractor,
    LlmVerdictProvider, NeutralSentiment, TextFileTranscriber, Verification, WebSearcher,
    chat_client, default_client, default_config, parse_turns, sentiment_to_percentage,
    verification_counts,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "claimcheck",
    version,
    about = "Fact-check debate claims against web evidence",
    long_about = "A CLI tool for extracting factual claims from a debate transcript and \
                  fact-checking each one using web search results and an OpenAI-compatible API."
)]
struct Cli {
    /// Transcript text file to analyze
    #[arg(value_name = "TRANSCRIPT")]
    transcript: PathBuf,

    /// Speaker turns file with one "start end speaker" line per turn
    #[arg(long, value_name = "FILE")]
    turns: Option<PathBuf>,

    /// Chat model used for claim extraction and verdicts
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Pipeline configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extract and print claims without fact-checking them
    #[arg(long)]
    claims_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    if let Some(model) = &cli.model {
        config.model.model = model.clone();
    }

    if !cli.transcript.is_file() {
        eprintln!(
            "{} Transcript file not found: {}",
            "Error:".red().bold(),
            cli.transcript.display()
        );
        std::process::exit(1);
    }

    let diarization = match &cli.turns {
        Some(path) => parse_turns(&std::fs::read_to_string(path)?)?,
        None => Diarization::default(),
    };

    let chat = chat_client(&api_base, &api_key);

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        "  ClaimCheck - Debate Fact-Checker".bright_blue().bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {}",
        "Transcript:".bold(),
        cli.transcript.display().to_string().bright_white()
    );
    if let Some(path) = &cli.turns {
        println!(
            "{} {} ({} turns)",
            "Speakers:".bold(),
            path.display(),
            diarization.turns().len()
        );
    }
    println!("{} {}", "Model:".bold(), config.model.model.dimmed());
    println!();
    println!("{}", "─".repeat(70).dimmed());

    if cli.claims_only {
        let transcript = std::fs::read_to_string(&cli.transcript)?;
        let extractor = LlmClaimExtractor::new(chat, &config.model);
        let claims = extractor.extract(&transcript).await?;

        println!();
        for (index, claim) in claims.iter().enumerate() {
            println!("{}. {}", index + 1, claim);
        }
        if claims.is_empty() {
            println!("{}", "No fact-checkable claims found.".yellow());
        }
        return Ok(());
    }

    let top_topics = config.context.top_topics;
    let searcher = WebSearcher::new(
        Arc::new(HttpTransport::new(default_client()?)),
        &config.search,
    );

    let collaborators = Collaborators {
        transcriber: Box::new(TextFileTranscriber),
        diarizer: Box::new(FixedDiarizer::new(diarization)),
        extractor: Box::new(LlmClaimExtractor::new(chat.clone(), &config.model)),
        categorizer: Box::new(EmptyCategorizer),
        sentiment: Box::new(NeutralSentiment),
        verdicts: Box::new(LlmVerdictProvider::new(chat, &config.model)),
    };

    let mut orchestrator =
        ClaimOrchestrator::new(config, searcher, collaborators).with_callback(console_callback());

    // Ctrl-C finishes the claim in progress and stops there.
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{}",
                "Stopping after the current claim...".yellow().bold()
            );
            cancel.cancel();
        }
    });

    let outcomes = orchestrator.run(&cli.transcript).await;

    // Print detailed results
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Results".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());

    for outcome in &outcomes {
        println!();
        println!(
            "{}",
            format!("{}. {}", outcome.index() + 1, outcome.claim()).bold()
        );
        match outcome {
            ClaimOutcome::Checked(result) => {
                println!("  {} {}", "Speaker:".bold(), result.speaker.bright_cyan());
                println!(
                    "  {} {}",
                    "Verification:".bold(),
                    colorize_verification(result.verdict.verification)
                );
                println!(
                    "  {} {}",
                    "Confidence:".bold(),
                    result.verdict.confidence.as_str()
                );
                println!("  {}", "Explanation:".bold());
                for line in textwrap(&result.verdict.explanation, 64).lines() {
                    println!("    {}", line);
                }
                println!("  {} {}", "Bias:".bold(), result.verdict.bias.dimmed());
                println!(
                    "  {} {}",
                    "Sources:".bold(),
                    result.verdict.sources.dimmed()
                );
                let categories = if result.categories.is_empty() {
                    "None".to_string()
                } else {
                    result
                        .categories
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!("  {} {}", "Categories:".bold(), categories);
                println!(
                    "  {} {:.2} ({:.1}% positive)",
                    "Sentiment:".bold(),
                    result.sentiment,
                    sentiment_to_percentage(result.sentiment)
                );
            }
            ClaimOutcome::Failed { error, .. } => {
                println!("  {} {}", "Error:".red().bold(), error.red());
            }
        }
    }

    // Summary
    let (verified, partially, not_verified) = verification_counts(&outcomes);
    let failed = outcomes
        .iter()
        .filter(|outcome| outcome.as_checked().is_none())
        .count();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Fact-check complete.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {} verified, {} partially verified, {} not verified",
        "Summary:".bold(),
        verified.to_string().green(),
        partially.to_string().yellow(),
        not_verified.to_string().red()
    );
    if failed > 0 {
        println!(
            "{}",
            format!("{} claim(s) could not be checked.", failed).yellow()
        );
    }

    let topics = orchestrator.topics().get_current_topics(top_topics);
    if !topics.is_empty() {
        println!("{} {}", "Current topics:".bold(), topics.join(", "));
    }
    println!();

    Ok(())
}

/// Create a callback that prints pipeline progress to the console.
fn console_callback() -> Box<dyn Fn(ClaimEvent) + Send + Sync> {
    Box::new(move |event| match event {
        ClaimEvent::RunStarted { claims } => {
            println!();
            println!(
                "{}",
                format!("Checking {} claims...", claims).bright_magenta().bold()
            );
        }
        ClaimEvent::ClaimStarted {
            index,
            total,
            claim,
        } => {
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                format!("[{}/{}]", index + 1, total).bright_cyan().bold(),
                claim
            );
        }
        ClaimEvent::ClaimChecked {
            speaker,
            verification,
            ..
        } => {
            println!(
                "    {} ({})",
                colorize_verification(verification),
                speaker.bright_cyan()
            );
        }
        ClaimEvent::ClaimFailed { error, .. } => {
            println!("    {} {}", "failed:".red().bold(), error.red());
        }
        ClaimEvent::RunFinished { .. } => {
            // Summary printed in main
        }
    })
}

fn colorize_verification(verification: Verification) -> colored::ColoredString {
    match verification {
        Verification::Verified => verification.as_str().green().bold(),
        Verification::PartiallyVerified => verification.as_str().yellow().bold(),
        Verification::NotVerified => verification.as_str().red().bold(),
        Verification::Error => verification.as_str().red().dimmed(),
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
