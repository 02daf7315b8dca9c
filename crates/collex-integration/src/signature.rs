//! 支付回调签名校验
//!
//! 签名为 HMAC-SHA256(secret, "{provider_order_id}|{provider_payment_id}") 的十六进制编码。

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// 签名校验器
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        }
    }

    /// 生成签名
    pub fn sign(&self, provider_order_id: &str, provider_payment_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(provider_order_id.as_bytes());
        mac.update(b"|");
        mac.update(provider_payment_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// 常数时间比较签名
    pub fn verify(&self, provider_order_id: &str, provider_payment_id: &str, signature: &str) -> bool {
        let expected = self.sign(provider_order_id, provider_payment_id);
        let provided = signature.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_known_vector() {
        let verifier = SignatureVerifier::new("Jefe");
        let mut mac = HmacSha256::new_from_slice(b"Jefe").unwrap();
        mac.update(b"order_X|pay_Y");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(verifier.sign("order_X", "pay_Y"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let verifier = SignatureVerifier::new("secret");
        let signature = verifier.sign("order_X", "pay_Y");

        assert!(verifier.verify("order_X", "pay_Y", &signature));
        assert!(verifier.verify("order_X", "pay_Y", &signature.to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let verifier = SignatureVerifier::new("secret");
        let signature = verifier.sign("order_X", "pay_Y");

        assert!(!verifier.verify("order_X", "pay_Z", &signature));
        assert!(!verifier.verify("order_W", "pay_Y", &signature));
        assert!(!verifier.verify("order_X", "pay_Y", "deadbeef"));
        assert!(!verifier.verify("order_X", "pay_Y", ""));
        assert!(!SignatureVerifier::new("other").verify("order_X", "pay_Y", &signature));
    }
}
