// ABOUTME: Simple CLI for trying a CLI agent gateway end to end.
// ABOUTME: Usage: prompt-test [--variant claude|codex|gemini] [--stream] <prompt>...

use anyhow::{Context, Result};
use clap::Parser;
use cligate::{CliGateway, Config, GatewayConfig, Message, PromptRequest, StreamEvent, Variant};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prompt-test")]
#[command(about = "Send prompts through a CLI agent gateway; each extra prompt continues the conversation", long_about = None)]
struct Cli {
    /// CLI agent to drive (ignored when --config is given)
    #[arg(short, long, default_value = "claude")]
    variant: Variant,

    /// TOML config file with a [gateway] section
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name; defaults to the gateway's default model
    #[arg(short, long, default_value = "")]
    model: String,

    /// System instructions for the conversation
    #[arg(short, long)]
    instructions: Option<String>,

    /// Stream deltas instead of waiting for the full response
    #[arg(short, long, default_value_t = false)]
    stream: bool,

    /// Per-call timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// One or more user turns, sent in order
    #[arg(required = true)]
    prompts: Vec<String>,
}

fn load_gateway(cli: &Cli) -> Result<CliGateway> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?.gateway,
        None => match Config::find_and_load()? {
            Some(config) if config.gateway.variant == cli.variant => config.gateway,
            _ => GatewayConfig::new(cli.variant),
        },
    };
    Ok(CliGateway::new(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cligate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let gateway = load_gateway(&cli).context("Failed to set up gateway")?;
    eprintln!(
        "[{} via {}]",
        gateway.variant(),
        gateway.config().binary()
    );

    let mut messages = Vec::new();
    for (turn, prompt) in cli.prompts.iter().enumerate() {
        messages.push(Message::user(prompt.clone()));

        let mut request = PromptRequest::new(cli.model.clone(), messages.clone());
        if let Some(instructions) = &cli.instructions {
            request = request.instructions(instructions.clone());
        }
        if let Some(timeout) = cli.timeout {
            request = request.timeout_secs(timeout);
        }

        let start = Instant::now();
        let reply = if cli.stream {
            let invocation_id = uuid::Uuid::new_v4().to_string();
            let mut stream = gateway.stream(invocation_id, &request);
            let mut reply = String::new();
            while let Some(event) = stream.recv().await {
                match event? {
                    StreamEvent::StreamStart { model, .. } => eprintln!("[turn {}: {}]", turn + 1, model),
                    StreamEvent::TextDelta { delta, .. } => {
                        print!("{}", delta);
                        io::stdout().flush().ok();
                    }
                    StreamEvent::StreamEnd { text, session_id, .. } => {
                        println!();
                        if let Some(id) = session_id {
                            eprintln!("[session: {}]", id);
                        }
                        reply = text;
                    }
                }
            }
            reply
        } else {
            let response = gateway.generate(&request).await?;
            println!("{}", response.text);
            if let Some(id) = &response.session_id {
                eprintln!("[session: {}]", id);
            }
            if let Some(structured) = &response.structured_output {
                eprintln!("[structured: {}]", structured);
            }
            response.text
        };
        eprintln!("[turn {} took {:?}]", turn + 1, start.elapsed());

        messages.push(Message::assistant(reply));
    }

    Ok(())
}
