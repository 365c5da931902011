//! `GetCACaps` vocabulary and the predicates derived from it.

use std::collections::HashSet;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

use crate::crypto::{CipherAlgo, HashAlgo};

/// One token of the closed `GetCACaps` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Capability {
    #[strum(serialize = "AES")]
    Aes,
    #[strum(serialize = "DES3")]
    TripleDes,
    #[strum(serialize = "SHA-1")]
    Sha1,
    #[strum(serialize = "SHA-256")]
    Sha256,
    #[strum(serialize = "SHA-512")]
    Sha512,
    #[strum(serialize = "POSTPKIOperation")]
    PostPkiOperation,
    #[strum(serialize = "GetNextCACert")]
    GetNextCaCert,
    #[strum(serialize = "Renewal")]
    Renewal,
    #[strum(serialize = "SCEPStandard")]
    ScepStandard,
}

/// The capability set a CA advertised for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(HashSet<Capability>);

impl Capabilities {
    /// Parse a `GetCACaps` body, one token per line. Unknown tokens are
    /// ignored so that future protocol revisions stay interoperable.
    pub(crate) fn parse(body: &str) -> Self {
        let set = body
            .lines()
            .filter_map(|line| {
                let token = line.trim();
                match Capability::from_str(token) {
                    Ok(capability) => Some(capability),
                    Err(_) => {
                        if !token.is_empty() {
                            tracing::debug!(token, "Ignoring unknown CA capability token");
                        }
                        None
                    }
                }
            })
            .collect();
        Self(set)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `PKIOperation` goes over HTTP POST when the CA advertises it.
    pub fn post_supported(&self) -> bool {
        self.contains(Capability::PostPkiOperation)
    }

    /// `GetNextCACert` is only legal when advertised.
    pub fn rollover_supported(&self) -> bool {
        self.contains(Capability::GetNextCaCert)
    }

    pub fn renewal_supported(&self) -> bool {
        self.contains(Capability::Renewal)
    }

    /// AES-128-CBC when advertised, Triple-DES-CBC otherwise.
    pub fn strongest_cipher(&self) -> CipherAlgo {
        if self.contains(Capability::Aes) {
            CipherAlgo::Aes128Cbc
        } else {
            CipherAlgo::TripleDesCbc
        }
    }

    /// Strongest mutually supported digest; SHA-1 is the universal floor.
    pub fn strongest_digest(&self) -> HashAlgo {
        if self.contains(Capability::Sha512) {
            HashAlgo::Sha512
        } else if self.contains(Capability::Sha256) {
            HashAlgo::Sha256
        } else {
            HashAlgo::Sha1
        }
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl serde::Serialize for Capability {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Serializes as the sorted token list, for tooling output.
impl serde::Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tokens: Vec<String> = self.iter().map(|token| token.to_string()).collect();
        tokens.sort();
        tokens.serialize(serializer)
    }
}
