pub mod easykash;
pub mod signature;
pub mod topup;
pub mod wallet;
pub mod webhook;

pub use easykash::{Buyer, EasyKashClient};
pub use topup::TopupService;
pub use wallet::WalletService;
pub use webhook::PaymentWebhookService;
