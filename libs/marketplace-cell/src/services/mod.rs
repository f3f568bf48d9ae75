pub mod subscription;

pub use subscription::MarketplaceService;
