//! Carrier media-stream endpoint and the per-call voice bridge.
//!
//! The carrier speaks JSON envelopes over WebSocket with base64 µ-law audio;
//! the AI backend speaks binary frames with a one-byte type prefix. One call
//! runs two pumps, one per direction, raced against each other: whichever leg
//! finishes first tears down the bridge and hands the session to post-call
//! processing.

use axum::{
    extract::{
        ws::{Message as CarrierMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as AiMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::services::audio::transcode::{DownlinkTranscoder, UplinkTranscoder};
use crate::services::memory::extraction::process_conversation;
use crate::services::memory::format_memories;
use crate::services::phone::normalize_e164;
use crate::services::transcript::{TranscriptCapture, TranscriptTurn};
use crate::state::AppState;

// AI frame kinds: one leading byte on every binary message.
const FRAME_HANDSHAKE: u8 = 0x00;
const FRAME_AUDIO: u8 = 0x01;
const FRAME_TEXT: u8 = 0x02;

/// The probe is fixed: no user utterance exists yet at call start.
const MEMORY_PROBE: &str = "voice conversation";

const BASE_TEXT_PROMPT: &str = "You are a helpful, friendly AI assistant having a voice conversation. \
Be natural and conversational.";

type AiStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum CarrierEvent {
    Connected,
    Start { start: StartMeta },
    Media { media: MediaPayloadIn },
    Mark,
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMeta {
    #[serde(rename = "streamSid")]
    stream_sid: String,
}

#[derive(Debug, Deserialize)]
struct MediaPayloadIn {
    payload: String,
}

#[derive(Debug, Serialize)]
struct MediaEnvelope<'a> {
    event: &'static str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
    media: MediaPayloadOut,
}

#[derive(Debug, Serialize)]
struct MediaPayloadOut {
    payload: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    caller: Option<String>,
}

/// Upgrades the HTTP connection to the carrier media-stream WebSocket.
///
/// The caller number rides in the `caller` query parameter, placed there by
/// the telephony webhook that returned this endpoint's URL.
pub async fn handle_media_stream(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let caller = query.caller.unwrap_or_else(|| "unknown".to_string());
    info!("Media stream connection from {} (caller: {})", addr, caller);
    ws.on_upgrade(move |socket| handle_call(socket, caller, state))
}

async fn handle_call(socket: WebSocket, caller: String, state: AppState) {
    if let Err(e) = run_call(socket, &caller, state).await {
        error!("Voice bridge failed for caller {}: {e:#}", caller);
    }
}

async fn run_call(carrier_ws: WebSocket, caller: &str, state: AppState) -> anyhow::Result<()> {
    use anyhow::Context;

    let phone = normalize_e164(caller);

    // Provision user and conversation, then build the session prompt with
    // whatever the memory probe turns up. Failures here fail the call.
    let user = state
        .store
        .get_or_create_user(&phone)
        .await
        .context("User lookup failed")?;
    debug!(
        user_id = %user.id,
        phone = %user.phone_number,
        display_name = ?user.display_name,
        "Caller resolved"
    );
    let memories = state
        .store
        .semantic_search(user.id, MEMORY_PROBE, state.config.memory.top_k)
        .await
        .context("Memory retrieval failed")?;
    let conversation = state
        .store
        .create_conversation(user.id, "voice", None)
        .await
        .context("Conversation creation failed")?;

    let memory_context = format_memories(&memories);
    let base_prompt = state
        .config
        .ai
        .base_text_prompt
        .clone()
        .unwrap_or_else(|| BASE_TEXT_PROMPT.to_string());
    let text_prompt = if memory_context.is_empty() {
        base_prompt
    } else {
        format!("{base_prompt}\n\n{memory_context}")
    };
    let voice_prompt = state.config.ai.default_voice_prompt.as_str();

    let url = Url::parse_with_params(
        &state.config.ai.ws_url,
        &[("voice_prompt", voice_prompt), ("text_prompt", &text_prompt)],
    )
    .context("Invalid AI WebSocket URL")?;

    info!(
        user_id = %user.id,
        conversation_id = %conversation.id,
        voice_prompt,
        "Bridge starting"
    );

    let (ai_ws, _) = connect_async(url.as_str())
        .await
        .context("AI WebSocket connect failed")?;
    let (mut ai_tx, mut ai_rx) = ai_ws.split();

    // The server announces readiness with a single 0x00 binary message.
    // Anything else on the wire first means no bridge.
    match ai_rx.next().await {
        Some(Ok(AiMessage::Binary(data))) if data.first() == Some(&FRAME_HANDSHAKE) => {
            info!("AI handshake received");
        }
        _ => {
            let _ = ai_tx.close().await;
            anyhow::bail!("AI handshake failed: unexpected first message");
        }
    }

    let (mut carrier_tx, mut carrier_rx) = carrier_ws.split();
    let stream_sid: OnceLock<String> = OnceLock::new();
    let mut transcript = TranscriptCapture::new();
    let mut uplink = UplinkTranscoder::new();
    let mut downlink = DownlinkTranscoder::new();

    // Race the pumps; dropping the loser cancels it at its next await.
    tokio::select! {
        () = carrier_to_ai(&mut carrier_rx, &mut ai_tx, &mut uplink, &stream_sid) => {
            info!("Carrier leg finished, closing bridge");
        }
        () = ai_to_carrier(&mut ai_rx, &mut carrier_tx, &mut downlink, &mut transcript, &stream_sid) => {
            info!("AI leg finished, closing bridge");
        }
    }

    info!(conversation_id = %conversation.id, "Bridge disconnected");
    if uplink.residual_len() > 0 {
        // Less than 20 ms; not worth a trailing partial frame.
        debug!(samples = uplink.residual_len(), "Discarding sub-frame residual PCM");
    }

    let mut turns = transcript.transcript();
    if turns.is_empty() {
        // No turn boundaries observed; fall back to the raw token text.
        let full_text = transcript.full_text().trim().to_string();
        if !full_text.is_empty() {
            turns.push(TranscriptTurn {
                role: "assistant".to_string(),
                content: full_text,
            });
        }
    }

    for turn in &turns {
        if let Err(e) = state
            .store
            .add_message(conversation.id, &turn.role, &turn.content)
            .await
        {
            error!(
                conversation_id = %conversation.id,
                "Failed to persist transcript message: {e:#}"
            );
        }
    }

    // Fact extraction runs detached with its own handles; a failure inside it
    // never reaches the call outcome.
    let store = state.store.clone();
    let llm = state.llm.clone();
    let conversation_id = conversation.id;
    let user_id = conversation.user_id;
    let channel = conversation.channel;
    tokio::spawn(async move {
        if let Err(e) =
            process_conversation(store, llm, conversation_id, user_id, &channel, turns).await
        {
            error!(%conversation_id, "Post-call fact extraction failed: {e:#}");
        }
    });

    let _ = ai_tx.close().await;
    Ok(())
}

/// Carrier -> AI pump: JSON media envelopes in, `0x01` + Opus packets out.
async fn carrier_to_ai(
    carrier_rx: &mut SplitStream<WebSocket>,
    ai_tx: &mut SplitSink<AiStream, AiMessage>,
    transcoder: &mut UplinkTranscoder,
    stream_sid: &OnceLock<String>,
) {
    while let Some(message) = carrier_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("Carrier socket error: {e}");
                return;
            }
        };
        match message {
            CarrierMessage::Text(text) => {
                let envelope = match serde_json::from_str::<CarrierEvent>(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Dropping unparseable carrier frame: {e}");
                        continue;
                    }
                };
                match envelope {
                    CarrierEvent::Start { start } => {
                        info!(stream_sid = %start.stream_sid, "Carrier stream started");
                        // Set once; the AI leg reads it for outbound envelopes.
                        let _ = stream_sid.set(start.stream_sid);
                    }
                    CarrierEvent::Media { media } => {
                        let mulaw = match STANDARD.decode(media.payload.as_bytes()) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                warn!("Dropping media frame with bad base64: {e}");
                                continue;
                            }
                        };
                        for packet in transcoder.process(&mulaw) {
                            let mut framed = Vec::with_capacity(packet.len() + 1);
                            framed.push(FRAME_AUDIO);
                            framed.extend_from_slice(&packet);
                            if ai_tx.send(AiMessage::Binary(framed.into())).await.is_err() {
                                return;
                            }
                        }
                    }
                    CarrierEvent::Stop => {
                        info!("Carrier stream stopped");
                        return;
                    }
                    CarrierEvent::Connected | CarrierEvent::Mark | CarrierEvent::Other => {}
                }
            }
            CarrierMessage::Close(_) => return,
            _ => {}
        }
    }
}

/// AI -> carrier pump: binary frames dispatched on their type byte. Audio is
/// transcoded back into carrier media envelopes; text tokens feed the
/// transcript.
async fn ai_to_carrier(
    ai_rx: &mut SplitStream<AiStream>,
    carrier_tx: &mut SplitSink<WebSocket, CarrierMessage>,
    transcoder: &mut DownlinkTranscoder,
    transcript: &mut TranscriptCapture,
    stream_sid: &OnceLock<String>,
) {
    while let Some(message) = ai_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("AI socket error: {e}");
                return;
            }
        };
        match message {
            AiMessage::Binary(data) => {
                let Some((&kind, payload)) = data.split_first() else {
                    continue;
                };
                match kind {
                    FRAME_AUDIO => {
                        if payload.is_empty() {
                            continue;
                        }
                        let Some(mulaw) = transcoder.process(payload) else {
                            continue;
                        };
                        // Outbound media cannot be addressed until the carrier's
                        // start event has published the stream id.
                        let Some(sid) = stream_sid.get() else {
                            continue;
                        };
                        let envelope = MediaEnvelope {
                            event: "media",
                            stream_sid: sid,
                            media: MediaPayloadOut {
                                payload: STANDARD.encode(&mulaw),
                            },
                        };
                        let text = serde_json::to_string(&envelope).expect("Serialize failed");
                        if carrier_tx
                            .send(CarrierMessage::Text(text.into()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    FRAME_TEXT => {
                        if payload.is_empty() {
                            continue;
                        }
                        let token = String::from_utf8_lossy(payload);
                        transcript.add_token(&token);
                    }
                    FRAME_HANDSHAKE => {
                        // Duplicate handshake; nothing to do.
                    }
                    other => {
                        debug!("Ignoring AI frame of unknown kind 0x{other:02x}");
                    }
                }
            }
            AiMessage::Close(_) => return,
            _ => {}
        }
    }
}
