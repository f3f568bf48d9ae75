use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::warn;

use crate::models::{EasyKashCallback, PaymentError};

type HmacSha512 = Hmac<Sha512>;

/// Fields covered by the signature, concatenated without separators in
/// this exact order.
pub fn signing_string(callback: &EasyKashCallback) -> String {
    [
        callback.product_code.as_str(),
        callback.amount.as_str(),
        callback.product_type.as_str(),
        callback.payment_method.as_str(),
        callback.status.as_str(),
        callback.easykash_ref.as_str(),
        callback.customer_reference.as_str(),
    ]
    .concat()
}

/// Lowercase hex HMAC-SHA512 of `message`.
pub fn compute_signature(secret: &str, message: &str) -> Result<String, PaymentError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signatureHash` against the recomputed HMAC.
pub fn verify_callback(secret: &str, callback: &EasyKashCallback) -> Result<(), PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }

    let expected = hex::decode(callback.signature_hash.trim()).map_err(|_| {
        warn!(reference = %callback.customer_reference, "Webhook signature is not valid hex");
        PaymentError::InvalidSignature
    })?;

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(signing_string(callback).as_bytes());

    mac.verify_slice(&expected).map_err(|_| {
        warn!(reference = %callback.customer_reference, "Webhook signature mismatch");
        PaymentError::InvalidSignature
    })
}
