//! aether — conversational orchestration engine
//!
//! Usage:
//!   aether --backend-url http://127.0.0.1:8080            → interactive chat
//!   aether --user alice --stream                          → streamed turns
//!   aether --state aether_state.json                      → persist across runs
//!
//! Commands inside the chat loop:
//!   /clear      clear the current session
//!   /stats      engine statistics
//!   /quit       save state and exit

use aether_core::EngineConfig;
use aether_engine::{Engine, FileStore, StreamEvent};
use aether_gen::{CancellationToken, HttpBackend};
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "aether",
    about = "AETHER conversational orchestration engine",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Base URL of the text generation backend
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    backend_url: String,

    /// Model identifier forwarded to the backend
    #[arg(long)]
    model: Option<String>,

    /// User id for personalization
    #[arg(short, long)]
    user: Option<String>,

    /// Stream responses word by word
    #[arg(long, default_value_t = false)]
    stream: bool,

    /// Snapshot file for durable state
    #[arg(long, default_value = "aether_state.json")]
    state: String,

    /// Path to an engine config file (JSON)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(model) = &cli.model {
        config.model_name = model.clone();
    }

    let backend = Arc::new(HttpBackend::new(&cli.backend_url, &config.model_name));
    let engine = Arc::new(Engine::new(config, backend));

    let store = FileStore::new(&cli.state);
    engine.load_state(&store)?;

    let session_id = engine.start_or_reuse_session(None).to_string();
    println!("aether ready (session {session_id}). /quit to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                match engine.clear_session(&session_id) {
                    Ok(()) => println!("session cleared"),
                    Err(e) => println!("error: {e}"),
                }
                continue;
            }
            "/stats" => {
                let stats = engine.stats().await;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                continue;
            }
            _ => {}
        }

        if cli.stream {
            let cancel = CancellationToken::new();
            let stream = engine
                .converse_stream(&session_id, line, cli.user.as_deref(), cancel)
                .await;
            futures::pin_mut!(stream);
            while let Some(event) = stream.next().await {
                match event {
                    StreamEvent::Token { text, .. } => {
                        print!("{text}");
                        std::io::stdout().flush()?;
                    }
                    StreamEvent::Final { confidence, .. } => {
                        println!("\n[confidence {confidence:.2}]");
                    }
                }
            }
        } else {
            let envelope = engine
                .converse(&session_id, line, cli.user.as_deref())
                .await;
            println!("{}", envelope.response);
            println!("[confidence {:.2}]", envelope.confidence);
        }
    }

    engine.save_state(&store)?;
    println!("state saved, goodbye");
    Ok(())
}
