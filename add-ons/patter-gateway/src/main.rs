//! patter-gateway: the webhook surface for the phone persona.
//!
//! Thin plumbing around the `patter-voice` core: decodes the telephony
//! platform's form-encoded turn requests, hands them to the `TurnController`,
//! serves the per-call audio artifacts back, acknowledges the fire-and-forget
//! recording/transcription callbacks, and keeps the process warm on free-tier
//! hosting with an optional self-ping.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Router,
};
use patter_voice::{
    sweeper, twiml, AudioCache, OpenAiReply, OpenAiTts, ReplyBackend, ScriptedReply, ScriptedTts,
    SessionStore, TtsBackend, TurnController, VoiceConfig,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared application state accessible from all handlers.
#[derive(Clone)]
struct AppState {
    controller: Arc<TurnController>,
    audio: Arc<AudioCache>,
}

/// Fields consumed from the platform's turn request. Everything else the
/// platform posts is ignored.
#[derive(Debug, Deserialize)]
struct TurnForm {
    #[serde(rename = "CallSid")]
    call_sid: String,
    #[serde(rename = "SpeechResult")]
    speech_result: Option<String>,
}

/// Side-channel callback payload. All fields optional: these are
/// acknowledged, logged, and otherwise outside the turn loop.
#[derive(Debug, Deserialize, Default)]
struct CallbackForm {
    #[serde(rename = "CallSid")]
    call_sid: Option<String>,
    #[serde(rename = "RecordingUrl")]
    recording_url: Option<String>,
    #[serde(rename = "TranscriptionText")]
    transcription_text: Option<String>,
}

/// One turn of the voice loop. Always answers with a well-formed document:
/// the call-control protocol has no mid-call error channel, so even an
/// internal fault degrades to an apology-and-hangup document.
async fn voice(State(state): State<AppState>, Form(form): Form<TurnForm>) -> impl IntoResponse {
    let doc = match state
        .controller
        .handle_turn(&form.call_sid, form.speech_result.as_deref())
        .await
    {
        Ok(doc) => doc,
        Err(e) => {
            error!(call_sid = %form.call_sid, error = %e, "turn failed; sending apology document");
            twiml::apology()
        }
    };
    ([(header::CONTENT_TYPE, "text/xml")], doc.render())
}

/// Serves the most recent synthesized utterance for a call. 404 is the
/// defined fallback when no artifact exists (expired, or never produced);
/// turn documents only reference this URL right after a successful put.
async fn fetch_audio(
    State(state): State<AppState>,
    Path(call_sid): Path<String>,
) -> impl IntoResponse {
    match state.audio.get(&call_sid) {
        Some((bytes, produced_at)) => {
            debug!(call_sid = %call_sid, produced_at = %produced_at, bytes = bytes.len(), "serving audio artifact");
            ([(header::CONTENT_TYPE, "audio/mpeg")], bytes.to_vec()).into_response()
        }
        None => {
            warn!(call_sid = %call_sid, "no audio artifact for call");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn recording_status(Form(form): Form<CallbackForm>) -> StatusCode {
    info!(
        call_sid = form.call_sid.as_deref().unwrap_or("unknown"),
        recording_url = form.recording_url.as_deref().unwrap_or(""),
        "recording status callback"
    );
    StatusCode::OK
}

async fn transcription(Form(form): Form<CallbackForm>) -> StatusCode {
    info!(
        call_sid = form.call_sid.as_deref().unwrap_or("unknown"),
        has_text = form.transcription_text.is_some(),
        "transcription callback"
    );
    StatusCode::OK
}

async fn health() -> &'static str {
    "ok"
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/voice", post(voice))
        .route("/audio/:call_sid", get(fetch_audio))
        .route("/recording-status", post(recording_status))
        .route("/transcription", post(transcription))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically GETs `url` so free-tier hosting doesn't idle the process
/// out between calls. Failures are logged and ignored.
fn spawn_keepalive(url: String, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(Duration::from_secs(10)).build() {
            Ok(c) => c,
            Err(e) => {
                warn!("keepalive client build failed: {e}");
                return;
            }
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup isn't pinged.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.get(&url).send().await {
                Ok(res) => debug!(status = %res.status(), "keepalive ping"),
                Err(e) => warn!("keepalive ping failed: {e}"),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first: API keys stay in the backend environment only.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[patter-gateway] .env not loaded: {e} (using system environment)");
    }
    if std::env::var("PATTER_LLM_API_KEY").is_err() && std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!(
            "[patter-gateway] Hint: set PATTER_LLM_API_KEY or OPENAI_API_KEY in .env for live replies; without one the persona is scripted-only."
        );
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "patter_gateway=info,patter_voice=info,tower_http=info".into()
            }),
        )
        .init();

    let config = VoiceConfig::from_env();
    info!(public_url = %config.public_url, history_cap = config.history_cap, "starting patter-gateway");

    let reply: Arc<dyn ReplyBackend> = match OpenAiReply::from_env() {
        Ok(backend) => {
            info!(model = %backend.model, "reply backend: chat completions");
            Arc::new(backend)
        }
        Err(e) => {
            warn!("reply backend unavailable ({e}); using scripted replies");
            Arc::new(ScriptedReply::new())
        }
    };
    let tts: Arc<dyn TtsBackend> = match OpenAiTts::from_env() {
        Ok(backend) => {
            info!(model = %backend.model, voice = %backend.voice, "TTS backend: speech API");
            Arc::new(backend)
        }
        Err(e) => {
            warn!("TTS backend unavailable ({e}); falling back to platform voice");
            Arc::new(ScriptedTts::default())
        }
    };

    let sessions = Arc::new(SessionStore::new(config.history_cap));
    let audio = Arc::new(AudioCache::new());
    let _sweeper = sweeper::spawn(
        Arc::clone(&sessions),
        Arc::clone(&audio),
        config.max_age,
        config.sweep_interval,
    );

    if let Ok(url) = std::env::var("PATTER_KEEPALIVE_URL") {
        let secs = std::env::var("PATTER_KEEPALIVE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(600);
        info!(url = %url, every_secs = secs, "keepalive pinger enabled");
        spawn_keepalive(url, Duration::from_secs(secs));
    }

    let controller = Arc::new(TurnController::new(
        sessions,
        Arc::clone(&audio),
        reply,
        tts,
        config,
    ));
    let app = build_router(AppState { controller, audio });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested (Ctrl+C)");
        }
    }
    Ok(())
}
