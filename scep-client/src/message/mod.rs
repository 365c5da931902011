//! Logical SCEP message model: the authenticated attribute set, transaction
//! identifiers, nonces, and the decoded `pkiMessage` record.

pub(crate) mod envelope;
pub(crate) mod signed;

use der::{Encode, Sequence};
use rand::RngCore;
use x509_cert::name::Name;
use x509_cert::request::CertReq;

use crate::crypto::HashAlgo;
use crate::error::{Result, ScepError};

/// The SCEP authenticated attribute arc (2.16.840.1.113733.1.9.x).
pub mod oids {
    use const_oid::ObjectIdentifier;

    pub const MESSAGE_TYPE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.2");
    pub const PKI_STATUS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.3");
    pub const FAIL_INFO: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.4");
    pub const SENDER_NONCE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.5");
    pub const RECIPIENT_NONCE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.6");
    pub const TRANSACTION_ID: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.7");
    /// Private-use neighbor of the fixed attribute arc carrying the CA
    /// profile string when one is configured.
    pub const PROFILE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.10");
}

/// SCEP messageType attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum MessageType {
    CertRep,
    RenewalReq,
    PkcsReq,
    CertPoll,
    GetCert,
    GetCrl,
}

impl MessageType {
    pub(crate) const fn code(&self) -> u8 {
        match self {
            MessageType::CertRep => 3,
            MessageType::RenewalReq => 17,
            MessageType::PkcsReq => 19,
            MessageType::CertPoll => 20,
            MessageType::GetCert => 21,
            MessageType::GetCrl => 22,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(MessageType::CertRep),
            17 => Some(MessageType::RenewalReq),
            19 => Some(MessageType::PkcsReq),
            20 => Some(MessageType::CertPoll),
            21 => Some(MessageType::GetCert),
            22 => Some(MessageType::GetCrl),
            _ => None,
        }
    }
}

/// SCEP pkiStatus attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PkiStatus {
    Success,
    Failure,
    Pending,
}

impl PkiStatus {
    pub(crate) const fn code(&self) -> u8 {
        match self {
            PkiStatus::Success => 0,
            PkiStatus::Failure => 2,
            PkiStatus::Pending => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PkiStatus::Success),
            2 => Some(PkiStatus::Failure),
            3 => Some(PkiStatus::Pending),
            _ => None,
        }
    }
}

/// SCEP failInfo attribute values, surfaced verbatim on `FAILURE` replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailInfo {
    BadAlg,
    BadMessageCheck,
    BadRequest,
    BadTime,
    BadCertId,
}

impl FailInfo {
    pub(crate) const fn code(&self) -> u8 {
        match self {
            FailInfo::BadAlg => 0,
            FailInfo::BadMessageCheck => 1,
            FailInfo::BadRequest => 2,
            FailInfo::BadTime => 3,
            FailInfo::BadCertId => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FailInfo::BadAlg),
            1 => Some(FailInfo::BadMessageCheck),
            2 => Some(FailInfo::BadRequest),
            3 => Some(FailInfo::BadTime),
            4 => Some(FailInfo::BadCertId),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailInfo::BadAlg => "badAlg",
            FailInfo::BadMessageCheck => "badMessageCheck",
            FailInfo::BadRequest => "badRequest",
            FailInfo::BadTime => "badTime",
            FailInfo::BadCertId => "badCertId",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// 16 fresh random bytes tying a response to the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; 16]);

impl Nonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = ScepError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| ScepError::MalformedAttribute("nonce"))?;
        Ok(Self(bytes))
    }
}

/// SCEP transaction identifier. Enrollments derive it from the CSR public
/// key so a resent request is recognized by the CA as the same transaction;
/// queries use a fresh random identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// Stable identifier: SHA-1 over the DER SubjectPublicKeyInfo of the
    /// request, rendered as hex.
    pub fn from_csr(csr: &CertReq) -> Result<Self> {
        let spki = csr.info.public_key.to_der()?;
        Ok(Self(hex::encode(HashAlgo::Sha1.digest(&spki))))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_string(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Poll correlation object for `CertPoll`: the name the CA will issue under
/// plus the subject the pending CSR asked for.
#[derive(Clone, Debug, PartialEq, Sequence)]
pub(crate) struct IssuerAndSubject {
    pub issuer: Name,
    pub subject: Name,
}

/// One decoded `pkiMessage`, after signature verification. The content is
/// still the raw enveloped-data until the transaction engine decrypts it.
#[derive(Debug, Clone)]
pub(crate) struct PkiMessage {
    pub message_type: MessageType,
    pub transaction_id: TransactionId,
    pub sender_nonce: Nonce,
    pub recipient_nonce: Option<Nonce>,
    pub status: Option<PkiStatus>,
    pub fail_info: Option<FailInfo>,
    pub content: Option<Vec<u8>>,
}
