//! Stand-in for the conversational AI backend, for exercising the gateway
//! bridge end to end without the real service.
//!
//! Speaks the binary one-byte-prefix protocol: sends the 0x00 handshake on
//! connect, echoes every 0x01 audio frame back to the caller, and after a few
//! frames emits a short greeting as 0x02 text tokens.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

const FRAME_HANDSHAKE: u8 = 0x00;
const FRAME_AUDIO: u8 = 0x01;
const FRAME_TEXT: u8 = 0x02;

const GREETING_TOKENS: &[&str] = &["Hello, ", "you are ", "coming through ", "loud and clear."];

#[tokio::main]
async fn main() {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8998".to_string());
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    println!("Mock AI server listening on {}", addr);

    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(handle_connection(stream));
    }
}

async fn handle_connection(stream: TcpStream) {
    let addr = stream
        .peer_addr()
        .expect("connected streams should have a peer address");

    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            println!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    println!("Bridge connected: {}", addr);

    // Readiness announcement, exactly once
    if ws_stream
        .send(Message::Binary(vec![FRAME_HANDSHAKE].into()))
        .await
        .is_err()
    {
        return;
    }

    let mut audio_frames = 0usize;
    let mut greeted = false;

    while let Some(msg) = ws_stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                println!("Error receiving from {}: {}", addr, e);
                break;
            }
        };
        match msg {
            Message::Binary(data) => {
                if let Some((&FRAME_AUDIO, packet)) = data.split_first() {
                    if packet.is_empty() {
                        continue;
                    }
                    audio_frames += 1;
                    // Echo the caller's own audio straight back
                    if ws_stream.send(Message::Binary(data.clone())).await.is_err() {
                        return;
                    }
                    if audio_frames >= 5 && !greeted {
                        greeted = true;
                        for token in GREETING_TOKENS {
                            let mut framed = vec![FRAME_TEXT];
                            framed.extend_from_slice(token.as_bytes());
                            if ws_stream.send(Message::Binary(framed.into())).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    println!(
        "Bridge disconnected: {} ({} audio frames seen)",
        addr, audio_frames
    );
}
