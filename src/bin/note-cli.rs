use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::USER_AGENT;
use serde_json::{json, Value};
use std::io::Write;

/// User-agent that makes the relay answer in blocking mode.
const MINI_PROGRAM_UA: &str = "note-cli miniProgram";

#[derive(Parser)]
#[command(name = "note-cli")]
#[command(about = "Client for the note relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a note and print the workflow result
    Create {
        #[arg(long)]
        emotion: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        behavior: String,
        #[arg(long)]
        user_name: Option<String>,
        /// Identify as a mini-program client (blocking JSON instead of a stream)
        #[arg(long)]
        mini_program: bool,
    },
    /// Check relay health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Create {
            emotion,
            event,
            behavior,
            user_name,
            mini_program,
        } => {
            let mut body = json!({
                "emotion": emotion,
                "event": event,
                "behavior": behavior,
            });
            if let Some(name) = user_name {
                body["userName"] = Value::String(name);
            }

            let mut req = client.post(format!("{}/api/create-note", cli.url)).json(&body);
            if mini_program {
                req = req.header(USER_AGENT, MINI_PROGRAM_UA);
            }
            let res = req.send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/healthz", cli.url)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let is_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    // Streamed text: print as it arrives.
    let mut stdout = std::io::stdout();
    let mut stream = res.bytes_stream();
    while let Some(chunk) = stream.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    println!();
    Ok(())
}
