mod render;

use std::path::{Path, PathBuf};

use booth::{ApiClient, ApiError, BoothConfig, ConfigError, Kiosk, Phone, PhoneUpdate, Role, Update};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::render::{KioskInput, PhoneInput, parse_kiosk_input, parse_phone_input, status_line};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "booth-cli", about = "Photo booth kiosk and phone client")]
struct Cli {
    #[arg(long, env = "BOOTH_BASE_URL", default_value = booth::config::DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is up.
    Ping,
    /// Print a session's status summary.
    Session { session_id: String },
    /// Print the HTTP and WebSocket endpoints for a session.
    Urls { session_id: String },
    /// Save a session's gallery QR code as PNG.
    Qr {
        session_id: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Save the WiFi join QR code as PNG.
    WifiQr {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Run the kiosk. Reads `start`, `capture`, `end`, `quit` from stdin.
    Kiosk,
    /// Join a session as a phone. Reads `download <photo_id>`, `quit` from stdin.
    Phone { session_id: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.base_url)?;

    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::Session { session_id } => run_session(&config, &session_id).await,
        Command::Urls { session_id } => run_urls(&config, &session_id),
        Command::Qr { session_id, out, size } => {
            let api = ApiClient::new(&config)?;
            let png = api.session_qr(&session_id, size.unwrap_or(config.qr_size)).await?;
            write_png(&out, &png)
        }
        Command::WifiQr { out, size } => {
            let api = ApiClient::new(&config)?;
            let png = api.wifi_qr(size.unwrap_or(config.qr_size)).await?;
            write_png(&out, &png)
        }
        Command::Kiosk => run_kiosk(&config).await,
        Command::Phone { session_id } => run_phone(&config, &session_id).await,
    }
}

/// Environment config, with the base URL taken from the command line.
fn load_config(base_url: &str) -> Result<BoothConfig, ConfigError> {
    BoothConfig::from_lookup(|key| {
        if key == "BOOTH_BASE_URL" {
            return Some(base_url.to_owned());
        }
        std::env::var(key).ok()
    })
}

async fn run_ping(config: &BoothConfig) -> Result<(), CliError> {
    ApiClient::new(config)?.health().await?;
    println!("ok");
    Ok(())
}

async fn run_session(config: &BoothConfig, session_id: &str) -> Result<(), CliError> {
    let summary = ApiClient::new(config)?.session(session_id).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_urls(config: &BoothConfig, session_id: &str) -> Result<(), CliError> {
    let urls = json!({
        "qr": config.api_url(&format!("/sessions/{session_id}/qr")),
        "wifiQr": config.api_url("/sessions/wifi-qr"),
        "kioskWs": config.ws_url(Role::Kiosk, session_id),
        "phoneWs": config.ws_url(Role::Phone, session_id),
        "preview": config.api_url("/camera/preview"),
    });
    println!("{}", serde_json::to_string_pretty(&urls)?);
    Ok(())
}

fn write_png(path: &Path, png: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, png)?;
    eprintln!("wrote {} bytes to {}", png.len(), path.display());
    Ok(())
}

async fn run_kiosk(config: &BoothConfig) -> Result<(), CliError> {
    let mut kiosk = Kiosk::new(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", status_line(kiosk.state(), kiosk.connection_status()));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_kiosk_input(&line) {
                    Some(KioskInput::Intent(intent)) => {
                        if !kiosk.dispatch(intent) {
                            eprintln!("ignored: {intent:?} does not apply right now");
                        }
                    }
                    Some(KioskInput::Quit) => break,
                    Some(KioskInput::Unknown(word)) => eprintln!("unknown command: {word}"),
                    None => continue,
                }
            }
            update = kiosk.step() => {
                if let Update::SessionCreated(_) = &update {
                    if let Some(created) = kiosk.created() {
                        if let Some(qr) = &created.qr_code_url {
                            println!("qr: {}", config.resolve(qr));
                        }
                    }
                }
                tracing::debug!(?update, "kiosk update");
            }
        }
        println!("{}", status_line(kiosk.state(), kiosk.connection_status()));
    }
    Ok(())
}

async fn run_phone(config: &BoothConfig, session_id: &str) -> Result<(), CliError> {
    let mut phone = Phone::join(config, session_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", status_line(phone.state(), phone.connection_status()));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_phone_input(&line) {
                    Some(PhoneInput::Download(photo_id)) => {
                        match phone.photo(&photo_id) {
                            Some(photo) => println!("download: {}", config.resolve(&photo.web_url)),
                            None => eprintln!("unknown photo: {photo_id}"),
                        }
                        if !phone.request_download(&photo_id) {
                            eprintln!("download not reported to the booth");
                        }
                    }
                    Some(PhoneInput::Quit) => break,
                    Some(PhoneInput::Unknown(text)) => eprintln!("unknown command: {text}"),
                    None => continue,
                }
            }
            update = phone.step() => {
                println!("{}", status_line(phone.state(), phone.connection_status()));
                if update == PhoneUpdate::Ended {
                    println!("session ended");
                    break;
                }
                continue;
            }
        }
        println!("{}", status_line(phone.state(), phone.connection_status()));
    }
    phone.leave();
    Ok(())
}
