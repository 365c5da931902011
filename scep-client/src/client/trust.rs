//! User-driven trust decisions over CA certificates, with positive verdicts
//! memoized for the lifetime of the client.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use x509_cert::Certificate;

use crate::crypto;
use crate::error::{Result, ScepError};

/// Presents a candidate CA certificate to the embedding application and
/// observes its verdict. Invoked at most once per distinct certificate per
/// client instance; a positive verdict is cached, a negative one is not, so
/// the user may be asked again.
pub trait TrustCallback: Send + Sync {
    fn verify(&self, certificate: &Certificate) -> bool;
}

impl<F> TrustCallback for F
where
    F: Fn(&Certificate) -> bool + Send + Sync,
{
    fn verify(&self, certificate: &Certificate) -> bool {
        self(certificate)
    }
}

/// Accepts every CA certificate without inspection. Only reasonable inside
/// tests and throwaway tooling, hence the name.
pub struct InsecureAcceptAll;

impl TrustCallback for InsecureAcceptAll {
    fn verify(&self, _certificate: &Certificate) -> bool {
        true
    }
}

/// Accepts exactly the certificates whose SHA-256 fingerprint was pinned
/// up front.
pub struct FingerprintPin {
    pins: HashSet<[u8; 32]>,
}

impl FingerprintPin {
    pub fn new(pins: impl IntoIterator<Item = [u8; 32]>) -> Self {
        Self {
            pins: pins.into_iter().collect(),
        }
    }
}

impl TrustCallback for FingerprintPin {
    fn verify(&self, certificate: &Certificate) -> bool {
        crypto::sha256_fingerprint(certificate)
            .map(|fingerprint| self.pins.contains(&fingerprint))
            .unwrap_or(false)
    }
}

pub(crate) struct TrustStore {
    callback: Arc<dyn TrustCallback>,
    approved: Mutex<HashSet<[u8; 32]>>,
}

impl TrustStore {
    pub fn new(callback: Arc<dyn TrustCallback>) -> Self {
        Self {
            callback,
            approved: Mutex::new(HashSet::new()),
        }
    }

    /// Approved means: previously approved, or approved by the callback
    /// right now. The lock is held across the callback so a certificate is
    /// never presented twice concurrently.
    pub async fn check(&self, certificate: &Certificate) -> Result<()> {
        let fingerprint = crypto::sha256_fingerprint(certificate)?;
        let mut approved = self.approved.lock().await;
        if approved.contains(&fingerprint) {
            tracing::trace!("CA certificate already approved");
            return Ok(());
        }
        if self.callback.verify(certificate) {
            approved.insert(fingerprint);
            tracing::debug!(
                fingerprint = %hex::encode(fingerprint),
                "CA certificate approved by trust callback"
            );
            Ok(())
        } else {
            tracing::warn!(
                fingerprint = %hex::encode(fingerprint),
                "CA certificate rejected by trust callback"
            );
            Err(ScepError::Untrusted)
        }
    }
}
