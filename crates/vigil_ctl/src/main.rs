//! Sends a single command to a running Vigil instance and prints the answer.

use clap::Parser;
use command_models::{CommandRequest, CommandResponse};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

const RESPONSE_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the command server.
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    address: String,

    /// The command name, e.g. `update_settings`.
    command: String,

    /// The command data as a JSON object.
    #[arg(default_value = "{}")]
    data: String,
}

#[derive(Debug, Error)]
enum CtlError {
    #[error("Invalid command data: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server closed the connection without answering")]
    NoResponse,
}

async fn send(cli: &Cli) -> Result<CommandResponse, CtlError> {
    let data: Value = serde_json::from_str(&cli.data)?;
    let request = CommandRequest::new(cli.command.clone(), data);

    let mut stream = TcpStream::connect(&cli.address).await?;
    tracing::debug!(address = %cli.address, command = %cli.command, "Connected, sending request.");
    stream.write_all(&serde_json::to_vec(&request)?).await?;

    let mut buf = vec![0u8; RESPONSE_BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(CtlError::NoResponse);
    }
    Ok(serde_json::from_slice(&buf[..n])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let response = send(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
