//! Clinic wallet and EasyKash top-ups.
//!
//! Top-ups are created pending and only credited when a correctly signed
//! gateway callback reports them paid.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{PaymentError, Wallet, WalletTransaction, WebhookResult};
pub use router::{payment_routes, wallet_routes};
pub use services::{PaymentWebhookService, TopupService, WalletService};
