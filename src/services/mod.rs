pub mod chatbot;
pub mod text_generation;
