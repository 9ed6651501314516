use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Inspect and drive a running live-relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "RELAY_URL")]
    url: String,

    /// Websocket path of the real-time channel.
    #[arg(long, default_value = "/realtime")]
    socket_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show counter, subscribers, cache and render state
    Status,
    /// Print every counter update until interrupted
    Watch,
    /// Emit click events
    Click {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let res = reqwest::get(format!("{}/__relay/status", cli.url.trim_end_matches('/'))).await?;
            print_response(res).await?;
        }
        Commands::Watch => {
            let (mut socket, _) = connect_async(socket_url(&cli.url, &cli.socket_path)?).await?;
            while let Some(frame) = socket.next().await {
                if let Message::Text(text) = frame? {
                    if let Some(value) = sync_value(text.as_str()) {
                        println!("{}", value);
                    }
                }
            }
        }
        Commands::Click { count } => {
            let (mut socket, _) = connect_async(socket_url(&cli.url, &cli.socket_path)?).await?;
            // The first frame is the current total.
            let mut last = next_sync(&mut socket).await?;
            for _ in 0..count {
                socket
                    .send(Message::Text(r#"{"event":"click"}"#.into()))
                    .await?;
                last = next_sync(&mut socket).await?;
            }
            println!("{}", last);
            socket.close(None).await?;
        }
    }

    Ok(())
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_sync(socket: &mut Socket) -> Result<u64, Box<dyn std::error::Error>> {
    while let Some(frame) = socket.next().await {
        if let Message::Text(text) = frame? {
            if let Some(value) = sync_value(text.as_str()) {
                return Ok(value);
            }
        }
    }
    Err("connection closed before a sync event".into())
}

fn sync_value(frame: &str) -> Option<u64> {
    let json: Value = serde_json::from_str(frame).ok()?;
    if json.get("event")?.as_str()? != "sync" {
        return None;
    }
    json.get("data")?.as_u64()
}

fn socket_url(base: &str, path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut url = url::Url::parse(base)?;
    let scheme = match url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).map_err(|_| "unsupported relay URL scheme")?;
    url.set_path(path);
    Ok(url.to_string())
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

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
