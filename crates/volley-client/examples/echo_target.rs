//! Line-oriented target for trying volley locally.
//!
//! Answers every request with a one-line HTTP status once the request's body
//! has arrived.
//!
//!   cargo run --example echo_target -- 127.0.0.1:4063

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn answer(socket: TcpStream) -> std::io::Result<()> {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            if line == "\r\n" {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;
        // One line per request: volley reads each response as a single line.
        write.write_all(b"HTTP/1.1 200 OK\r\n").await?;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4063".to_string());
    let listener = TcpListener::bind(&addr).await?;
    println!("Echo target listening on {}", addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(e) = answer(socket).await {
                eprintln!("[{}] connection error: {}", peer, e);
            }
        });
    }
}
