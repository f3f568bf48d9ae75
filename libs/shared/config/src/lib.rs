use std::env;
use tracing::warn;

pub const DEFAULT_EASYKASH_BASE_URL: &str = "https://back.easykash.net";
pub const DEFAULT_ONESIGNAL_BASE_URL: &str = "https://onesignal.com/api/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub webhook_secret: String,
    pub easykash_api_key: String,
    pub easykash_hmac_secret: String,
    pub easykash_base_url: String,
    pub payment_redirect_url: String,
    pub onesignal_app_id: String,
    pub onesignal_api_key: String,
    pub onesignal_base_url: String,
    pub whatsapp_api_url: String,
    pub whatsapp_api_token: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub redis_url: Option<String>,
    pub port: u16,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using default", name);
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            webhook_secret: required("WEBHOOK_SECRET"),
            easykash_api_key: required("EASYKASH_API_KEY"),
            easykash_hmac_secret: required("EASYKASH_HMAC_SECRET"),
            easykash_base_url: with_default("EASYKASH_BASE_URL", DEFAULT_EASYKASH_BASE_URL),
            payment_redirect_url: required("PAYMENT_REDIRECT_URL"),
            onesignal_app_id: required("ONESIGNAL_APP_ID"),
            onesignal_api_key: required("ONESIGNAL_REST_API_KEY"),
            onesignal_base_url: with_default("ONESIGNAL_BASE_URL", DEFAULT_ONESIGNAL_BASE_URL),
            whatsapp_api_url: required("WHATSAPP_API_URL"),
            whatsapp_api_token: required("WHATSAPP_API_TOKEN"),
            gemini_api_key: required("GEMINI_API_KEY"),
            gemini_base_url: with_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            gemini_model: with_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            redis_url: env::var("REDIS_URL").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing Supabase environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.easykash_api_key.is_empty() && !self.easykash_hmac_secret.is_empty()
    }

    pub fn is_push_configured(&self) -> bool {
        !self.onesignal_app_id.is_empty() && !self.onesignal_api_key.is_empty()
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.whatsapp_api_url.is_empty() && !self.whatsapp_api_token.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_checks_follow_credentials() {
        let mut config = AppConfig::default();
        assert!(!config.is_configured());
        assert!(!config.is_payment_configured());

        config.supabase_url = "http://localhost:54321".into();
        config.supabase_anon_key = "anon".into();
        config.supabase_jwt_secret = "secret".into();
        assert!(config.is_configured());

        config.easykash_api_key = "key".into();
        assert!(!config.is_payment_configured());
        config.easykash_hmac_secret = "hmac".into();
        assert!(config.is_payment_configured());

        config.whatsapp_api_url = "http://wa".into();
        config.whatsapp_api_token = "token".into();
        assert!(config.is_whatsapp_configured());
        assert!(!config.is_push_configured());
        assert!(!config.is_ai_configured());
    }
}
