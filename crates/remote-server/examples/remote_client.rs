//! Interactive line client for the remote control server.
//!
//! Sends an identity line, then forwards every stdin line to the
//! server and prints everything the server pushes back.

use std::env;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<()> {
    // Where to connect and who we are: env override or default.
    let addr = env::var("REMOTE_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:6545".to_string());
    let identity = env::var("REMOTE_CLIENT_ID").unwrap_or_else(|_| "demo-client".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("could not connect to {}", addr))?;
    println!("Connected as {:?}.", identity);
    println!("Type protocol lines like:");
    println!("  Open|/path/to/movie.mkv");
    println!("  Pause|True");
    println!("  Seek|30000000");
    println!("  Volume|50");
    println!("  GetCurrentState");
    println!("Type 'Exit' to leave.\n");

    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(format!("{}\n", identity).as_bytes()).await?;

    // Print server lines as they arrive.
    let printer = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("<< {}", line),
                Ok(None) => {
                    println!("Server closed the connection.");
                    break;
                }
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    break;
                }
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if write_half
            .write_all(format!("{}\n", trimmed).as_bytes())
            .await
            .is_err()
        {
            break;
        }
        if trimmed == "Exit" {
            break;
        }
    }

    let _ = write_half.shutdown().await;
    let _ = printer.await;
    Ok(())
}
