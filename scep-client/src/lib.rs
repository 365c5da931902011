//! A SCEP (Simple Certificate Enrollment Protocol) client: certificate
//! enrollment, renewal, and certificate/CRL lookup against a CA that may
//! front itself with an RA, speaking CMS-wrapped PKCS#10 over HTTP.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod capabilities;
pub mod client;
pub mod crypto;
pub mod error;
pub mod message;
pub mod transaction;
mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use capabilities::{Capabilities, Capability};
pub use client::trust::{FingerprintPin, InsecureAcceptAll, TrustCallback};
pub use client::{Client, ClientIdentity};
pub use crypto::{CipherAlgo, HashAlgo};
pub use error::{Result, ScepError};
pub use message::{FailInfo, MessageType, Nonce, PkiStatus, TransactionId};
pub use transaction::{CertStore, EnrollmentTransaction, QueryTransaction, TransactionState};

pub(crate) const USER_AGENT: &str = concat!("scep-client/", env!("CARGO_PKG_VERSION"));
