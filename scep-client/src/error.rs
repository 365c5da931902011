use thiserror::Error;

use crate::capabilities::Capability;
use crate::message::{FailInfo, MessageType, TransactionId};

/// Everything that can go wrong talking SCEP to a CA: client
/// misconfiguration, transport failures, protocol violations in the CMS
/// exchange, trust-callback rejections, CA-side refusals carrying a
/// failInfo, and operations the CA does not advertise.
#[derive(Error, Debug)]
pub enum ScepError {
    #[error("CA endpoint must be an absolute http or https URL, got scheme {0:?}")]
    EndpointScheme(String),

    #[error("CA endpoint must not carry a query string or a fragment: {0}")]
    EndpointNotPlain(url::Url),

    #[error("Invalid CA endpoint URL: {0}")]
    EndpointParse(#[from] url::ParseError),

    #[error("Certificate does not carry an RSA public key")]
    NotRsa,

    #[error("Client identity certificate and private key do not match")]
    IdentityKeyMismatch,

    #[error("HTTP exchange with the CA failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CA answered {operation} with unexpected content type {content_type:?}")]
    UnexpectedContentType {
        operation: &'static str,
        content_type: String,
    },

    #[error("Malformed DER in SCEP message: {0}")]
    Der(#[from] der::Error),

    #[error("Malformed CMS content: {0}")]
    Cms(&'static str),

    #[error("Required authenticated attribute {0} is missing")]
    MissingAttribute(&'static str),

    #[error("Malformed authenticated attribute {0}")]
    MalformedAttribute(&'static str),

    #[error("Response transaction id {got} does not match request transaction id {want}")]
    TransactionIdMismatch {
        want: TransactionId,
        got: TransactionId,
    },

    #[error("Response recipient nonce does not echo the sender nonce")]
    NonceMismatch,

    #[error("Response is not signed by the CA or an RA")]
    UntrustedSigner,

    #[error("Signature verification failed: {0}")]
    Signature(#[from] signature::Error),

    #[error("Message digest attribute does not match the signed content")]
    DigestMismatch,

    #[error("Unsupported algorithm in SCEP message: {0}")]
    UnsupportedAlgorithm(const_oid::ObjectIdentifier),

    #[error("RSA operation failed: {0}")]
    Rsa(#[from] rsa::errors::Error),

    #[error("Content encryption failed")]
    Encrypt,

    #[error("Failed to decrypt the enveloped content")]
    Decrypt,

    #[error("No recipient in the enveloped content matches the client identity")]
    NoRecipient,

    #[error("GetCACert returned {0} certificates, expected between 1 and 3")]
    ChainSize(usize),

    #[error("No certificate in the GetCACert response verifies the other chain members")]
    ChainNoCa,

    #[error("Cannot tell the encryption RA and the signing RA apart by key usage")]
    ChainAmbiguousRa,

    #[error("Rollover chain is not signed by the current CA")]
    RolloverNotAnchored,

    #[error("CA returned PENDING to a {0} query")]
    IllegalPending(MessageType),

    #[error("CA certificate was rejected by the trust callback")]
    Untrusted,

    #[error("CA rejected the request: {0}")]
    OperationFailed(FailInfo),

    #[error("CA does not advertise the {0} capability")]
    Unsupported(Capability),

    #[error("Transaction state does not allow {0}")]
    InvalidState(&'static str),
}

pub type Result<T> = std::result::Result<T, ScepError>;
