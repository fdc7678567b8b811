mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::DaemonClient;
use shared::ipc::{CaptureOutcome, Command, Response};

#[derive(Parser)]
#[command(name = "vcmd")]
#[command(about = "CLI for the vcmd voice command daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one voice command and print the transcript
    Capture {
        /// Seconds to wait for speech onset before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Start continuous listening in the daemon
    Listen,
    /// Stop continuous listening
    Stop,
    /// Re-run ambient noise calibration
    Calibrate,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new();

    let command = match cli.command {
        Commands::Capture { timeout } => Command::Capture {
            timeout_secs: timeout,
        },
        Commands::Listen => Command::Listen,
        Commands::Stop => Command::Stop,
        Commands::Calibrate => Command::Calibrate,
        Commands::Status => Command::Status,
    };

    match client.send_command(command).await {
        Ok(Response::Ok) => {
            println!("Success");
        }
        Ok(Response::Capture(outcome)) => match outcome {
            CaptureOutcome::Transcript(text) => {
                println!("{}", text);
            }
            CaptureOutcome::Timeout => {
                eprintln!("No speech detected before timeout");
                std::process::exit(1);
            }
            CaptureOutcome::Unintelligible => {
                eprintln!("Could not understand audio");
                std::process::exit(1);
            }
            CaptureOutcome::BackendError(detail) => {
                eprintln!("Speech recognition service error: {}", detail);
                std::process::exit(1);
            }
        },
        Ok(Response::Status(info)) => {
            println!("Status:");
            println!("  Running: {}", info.is_running);
            println!("  Listening: {}", info.is_listening);
            println!(
                "  Last command: {}",
                info.last_command.as_deref().unwrap_or("(none)")
            );
            println!("  Language: {}", info.language);
        }
        Ok(Response::Error(msg)) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to reach vcmdd: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
