pub mod assistant;
pub mod context;
pub mod conversation;
pub mod gemini;

pub use assistant::AssistantService;
pub use context::ContextService;
pub use conversation::ConversationService;
pub use gemini::GeminiClient;
