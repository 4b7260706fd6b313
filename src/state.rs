// src/state.rs
use std::sync::Arc;

use crate::services::chatbot::ChatBot;
use crate::services::text_generation::TextGenerator;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub chatbot: ChatBot,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            chatbot: ChatBot::new(generator),
        }
    }
}
