//! Download Tokens
//!
//! Each purchased line gets a token `<order_id>.<product_id>.<hex mac>` where
//! the mac is HMAC-SHA256 over `<order_id>:<product_id>`. Tokens are
//! self-verifying, so handing one out grants exactly that product of that order.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use store_core::{OrderId, ProductId};
use uuid::Uuid;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies download tokens
#[derive(Clone)]
pub struct DownloadSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for DownloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSigner").finish_non_exhaustive()
    }
}

impl DownloadSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Random per-process secret; tokens die with the process
    pub fn ephemeral() -> Self {
        let mut secret = Uuid::new_v4().as_bytes().to_vec();
        secret.extend_from_slice(Uuid::new_v4().as_bytes());
        Self { secret }
    }

    fn mac(&self, order_id: &str, product_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(order_id.as_bytes());
        mac.update(b":");
        mac.update(product_id.as_bytes());
        Some(mac)
    }

    /// Token for one purchased product
    pub fn sign(&self, order_id: &OrderId, product_id: &ProductId) -> String {
        let signature = self
            .mac(order_id.as_str(), product_id.as_str())
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("{}.{}.{}", order_id, product_id, signature)
    }

    /// Check a token and return what it grants
    pub fn verify(&self, token: &str) -> Result<(OrderId, ProductId)> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(product), Some(order)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PaymentError::InvalidToken);
        };

        let expected = hex::decode(signature).map_err(|_| PaymentError::InvalidToken)?;
        let mac = self.mac(order, product).ok_or(PaymentError::InvalidToken)?;
        mac.verify_slice(&expected).map_err(|_| PaymentError::InvalidToken)?;

        Ok((OrderId::from_string(order), ProductId::from_canonical(product)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = DownloadSigner::new("secret");
        let order = OrderId::new();
        let product = ProductId::from_canonical("ebook");
        let token = signer.sign(&order, &product);

        let (o, p) = signer.verify(&token).unwrap();
        assert_eq!(o, order);
        assert_eq!(p, product);
    }

    #[test]
    fn test_swapped_product_rejected() {
        let signer = DownloadSigner::new("secret");
        let order = OrderId::new();
        let token = signer.sign(&order, &ProductId::from_canonical("prompts"));
        let forged = token.replacen(".prompts.", ".video-course.", 1);
        assert!(matches!(signer.verify(&forged), Err(PaymentError::InvalidToken)));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = DownloadSigner::new("a").sign(&OrderId::new(), &ProductId::from_canonical("ebook"));
        assert!(DownloadSigner::new("b").verify(&token).is_err());
        assert!(DownloadSigner::ephemeral().verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = DownloadSigner::new("secret");
        for token in ["", "abc", "a.b", "a.b.zz", "a.b.c.d"] {
            assert!(signer.verify(token).is_err(), "{token}");
        }
    }
}
