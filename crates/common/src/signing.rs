use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &[u8], payload: &[u8], signature_b64: &str) -> bool {
    let Ok(sig_bytes) = STANDARD.decode(signature_b64) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_sign_verify() {
        let secret = b"relay-secret";
        let payload = b"{\"owner\":\"u-1\"}";
        let sig = sign_payload(secret, payload);
        assert!(verify_signature(secret, payload, &sig));
    }

    #[test]
    fn wrong_signature_rejected() {
        assert!(!verify_signature(b"secret", b"data", "bad-base64!"));
        assert!(!verify_signature(
            b"secret",
            b"data",
            &STANDARD.encode(b"wrong")
        ));
    }

    #[test]
    fn tampered_payload_rejected() {
        let sig = sign_payload(b"secret", b"original");
        assert!(!verify_signature(b"secret", b"tampered", &sig));
    }
}
