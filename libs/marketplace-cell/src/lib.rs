pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AppSubscription, MarketplaceApp, MarketplaceError, SubscriptionStatus, AI_ASSISTANT_APP};
pub use router::marketplace_routes;
pub use services::MarketplaceService;
