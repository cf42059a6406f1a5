use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pronunciation-coach-rust",
    version,
    about = "Score a speech-recognized transcription against a reference sentence"
)]
struct Cli {
    /// Transcription to score (reads stdin when omitted)
    transcription: Option<String>,

    /// Reference sentence the learner was practicing
    #[arg(short = 'r', long = "reference")]
    reference: Option<String>,

    /// Accent mode: tolerant or strict (default from settings)
    #[arg(short = 'M', long = "mode")]
    mode: Option<String>,

    /// Model name or provider:model (e.g. gemini:gemini-1.5-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Generate feedback with the configured AI provider
    #[arg(long = "ai")]
    ai: bool,

    /// Multi-line template feedback with practice tips
    #[arg(long = "detailed")]
    detailed: bool,

    /// Ask the AI provider for a pronunciation tip for one word
    #[arg(long = "tip")]
    tip: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(long = "read-settings")]
    read_settings: Option<String>,

    /// Append token usage to output
    #[arg(long = "with-using-tokens")]
    with_using_tokens: bool,

    /// Append model name to output
    #[arg(long = "with-using-model")]
    with_using_model: bool,

    /// Run the HTTP analysis server
    #[arg(long = "serve")]
    serve: bool,

    /// Server bind address (default from settings)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pronunciation_coach_rust::logging::init(cli.verbose)?;

    if cli.serve {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let settings = pronunciation_coach_rust::settings::load_settings(settings_path)?;
        let addr = cli.addr.unwrap_or_else(|| settings.server_addr.clone());
        return pronunciation_coach_rust::server::run_server(settings, addr).await;
    }

    let needs_input = cli.tip.is_none() && cli.transcription.is_none();
    let input = if let Some(transcription) = cli.transcription.clone() {
        Some(transcription)
    } else if needs_input && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = pronunciation_coach_rust::run(
        pronunciation_coach_rust::Config {
            reference: cli.reference,
            mode: cli.mode,
            model: cli.model,
            key: cli.key,
            ai: cli.ai,
            detailed: cli.detailed,
            tip: cli.tip,
            settings_path: cli.read_settings,
            with_using_tokens: cli.with_using_tokens,
            with_using_model: cli.with_using_model,
        },
        input,
    )
    .await?;

    println!("{}", output);
    Ok(())
}
