//! Clinic chat assistant backed by Gemini. Available to clinics with an
//! active `ai_assistant` marketplace subscription.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AssistantError, ChatMessage, ChatRequest, ChatResponse, Conversation};
pub use router::assistant_routes;
pub use services::{AssistantService, ConversationService};
