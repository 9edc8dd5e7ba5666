//! HTTP surface of the lead (target) node.
//!
//! `POST /messages` (alias `/query`) takes a chat request and answers either
//! with the complete generation or, when `stream` is set, with chunked
//! newline-separated delta objects. `POST /hint` serves one round of the
//! remote delta-sync protocol. One generation runs at a time; each request
//! resets the hint board so remote drafters resynchronize.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::error;

use crate::core::{HintBoard, HintRequest, HintResponse};
use crate::engine::TargetEngine;
use crate::error::Error;
use crate::model::{LanguageModel, TextCodec};
use crate::prompt::{render_llama3, ChatRequest};
use crate::session::Mailbox;

/// Shared state of the lead node.
pub struct LeadNode {
    engine: Mutex<TargetEngine<Box<dyn LanguageModel>>>,
    board: HintBoard,
    codec: Arc<dyn TextCodec>,
    /// Serializes generations; one query at a time.
    query_lock: Arc<tokio::sync::Mutex<()>>,
    n_ctx: usize,
}

impl LeadNode {
    pub fn new(engine: TargetEngine<Box<dyn LanguageModel>>, codec: Arc<dyn TextCodec>) -> Arc<Self> {
        let n_ctx = engine.n_ctx();
        Arc::new(Self {
            engine: Mutex::new(engine),
            board: HintBoard::new(),
            codec,
            query_lock: Arc::new(tokio::sync::Mutex::new(())),
            n_ctx,
        })
    }

    /// The authoritative candidate board, for observation in tests.
    pub fn board(&self) -> &HintBoard {
        &self.board
    }
}

/// Build the lead router.
pub fn router(node: Arc<LeadNode>) -> Router {
    Router::new()
        .route("/messages", post(messages))
        .route("/query", post(messages))
        .route("/hint", post(hint))
        .with_state(node)
}

async fn hint(
    State(node): State<Arc<LeadNode>>,
    Json(req): Json<HintRequest>,
) -> Json<HintResponse> {
    Json(node.board.hint(&req))
}

async fn messages(State(node): State<Arc<LeadNode>>, Json(req): Json<ChatRequest>) -> Response {
    let rendered = render_llama3(&req);
    let prompt = node.codec.encode(&rendered);
    if prompt.len() > node.n_ctx {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "prompt of {} tokens exceeds context size {}",
                prompt.len(),
                node.n_ctx
            ),
        );
    }

    let guard = Arc::clone(&node.query_lock).lock_owned().await;
    let mailbox = Arc::new(Mailbox::new());
    let generation = tokio::task::spawn_blocking({
        let node = Arc::clone(&node);
        let mailbox = Arc::clone(&mailbox);
        let max_tokens = req.max_tokens;
        move || {
            let _guard = guard;
            node.board.reset(prompt.clone());
            let mut engine = node.engine.lock().unwrap_or_else(|e| e.into_inner());
            let codec = Arc::clone(&node.codec);
            let result = engine.run(&prompt, max_tokens, &node.board, &mut |tokens| {
                mailbox.push(codec.decode(tokens));
            });
            mailbox.close();
            result
        }
    });

    if req.stream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        tokio::task::spawn_blocking(move || {
            while let Some(chunk) = mailbox.next_chunk() {
                let line = json!({"choices": [{"delta": {"content": chunk}}]}).to_string() + "\n";
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            match generation.await {
                Ok(Err(e)) => error!(error = %e, "generation failed"),
                Err(e) => error!(error = %e, "generation task panicked"),
                Ok(Ok(_)) => {}
            }
        });
        let body = Body::from_stream(
            UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>),
        );
        ([(header::CONTENT_TYPE, "application/json")], body).into_response()
    } else {
        match generation.await {
            Ok(Ok(output)) => {
                Json(json!({"content": {"text": node.codec.decode(&output)}})).into_response()
            }
            Ok(Err(e)) => {
                let status = match e {
                    Error::PromptTooLong { .. } | Error::Config(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                api_error(status, e.to_string())
            }
            Err(e) => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("generation task failed: {e}"),
            ),
        }
    }
}

fn api_error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({"error": {"message": message}}))).into_response()
}
