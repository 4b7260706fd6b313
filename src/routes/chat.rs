use axum::{Json, extract::State};
use tracing::info;

use crate::{
    message::{ChatRequest, ChatResponse},
    services::chatbot::generate_reply,
    state::SharedState,
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!(message_len = payload.message.len(), "chat request");

    let response = generate_reply(&state.chatbot, &payload.message).await;

    Json(ChatResponse { response })
}
