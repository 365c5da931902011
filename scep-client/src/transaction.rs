//! The transactional exchange: one `pkiMessage` out, one `CertRep` back,
//! with identifier and nonce correlation enforced before anything else is
//! looked at.

use rsa::RsaPrivateKey;
use x509_cert::crl::CertificateList;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use der::Encode;

use crate::crypto::{CipherAlgo, HashAlgo};
use crate::error::{Result, ScepError};
use crate::message::signed::{self, SignRequest};
use crate::message::{envelope, IssuerAndSubject, MessageType, Nonce, PkiMessage, PkiStatus, TransactionId};
use crate::transport::{CaRequest, CaResponse, Transport};

/// Certificates and CRLs decoded from a `CertRep` degenerate bag.
#[derive(Debug, Clone)]
pub struct CertStore {
    pub certificates: Vec<Certificate>,
    pub crls: Vec<CertificateList>,
}

/// Observable state of a SCEP transaction after at least one exchange.
#[derive(Debug, Clone)]
pub enum TransactionState {
    /// The CA issued the requested data; the store holds it.
    Issued(CertStore),
    /// Manual approval is outstanding; the caller may poll.
    Pending,
    /// The CA answered `FAILURE`; the fail info is carried verbatim.
    NonExistent(crate::message::FailInfo),
}

/// Everything one transaction needs to talk to the CA: codecs parameters,
/// the negotiated transport method, and the certificates allowed to sign
/// responses.
pub(crate) struct Pipeline {
    pub transport: Transport,
    pub identity_certificate: Certificate,
    pub identity_key: RsaPrivateKey,
    /// Encryption target: the encryption RA, or the CA without one.
    pub recipient: Certificate,
    /// Certificates that may sign responses: the CA and its RAs.
    pub responders: Vec<Certificate>,
    pub digest: HashAlgo,
    pub cipher: CipherAlgo,
    pub use_post: bool,
    pub profile: Option<String>,
}

impl Pipeline {
    /// One request/response exchange: envelope, sign, send, verify,
    /// correlate, decrypt. The reply is rejected unless its transaction id
    /// equals ours and its recipientNonce echoes the senderNonce generated
    /// for this very call.
    async fn exchange(
        &self,
        message_type: MessageType,
        transaction_id: &TransactionId,
        payload: Option<&[u8]>,
    ) -> Result<PkiMessage> {
        let sender_nonce = Nonce::generate();
        let content = match payload {
            Some(payload) => Some(envelope::encrypt(&self.recipient, self.cipher, payload)?),
            None => None,
        };
        let raw = signed::sign(
            &self.identity_certificate,
            &self.identity_key,
            &SignRequest {
                message_type,
                transaction_id,
                sender_nonce: &sender_nonce,
                content: content.as_deref(),
                profile: self.profile.as_deref(),
                digest: self.digest,
            },
        )?;

        tracing::debug!(%message_type, %transaction_id, use_post = self.use_post, "Sending pkiMessage");
        let response = self
            .transport
            .roundtrip(CaRequest::PkiOperation {
                body: raw,
                use_post: self.use_post,
            })
            .await?;
        let raw_reply = match response {
            CaResponse::PkiMessage(raw) => raw,
            _ => return Err(ScepError::Cms("transport returned a mismatched response kind")),
        };

        let mut reply = signed::decode_pki_message(&raw_reply, &self.responders)?;
        if reply.message_type != MessageType::CertRep {
            return Err(ScepError::Cms("response is not a CertRep"));
        }
        if reply.transaction_id != *transaction_id {
            return Err(ScepError::TransactionIdMismatch {
                want: transaction_id.clone(),
                got: reply.transaction_id,
            });
        }
        if reply.recipient_nonce != Some(sender_nonce) {
            return Err(ScepError::NonceMismatch);
        }
        tracing::debug!(
            status = ?reply.status,
            ca_nonce = ?reply.sender_nonce,
            "CertRep correlated"
        );

        if let Some(encrypted) = reply.content.take() {
            reply.content = Some(envelope::decrypt(
                &self.identity_certificate,
                &self.identity_key,
                &encrypted,
            )?);
        }
        Ok(reply)
    }
}

fn classify(reply: PkiMessage, pending_allowed: bool, query: MessageType) -> Result<TransactionState> {
    let status = reply
        .status
        .ok_or(ScepError::MissingAttribute("pkiStatus"))?;
    match status {
        PkiStatus::Success => {
            let content = reply
                .content
                .ok_or(ScepError::Cms("CertRep SUCCESS carries no content"))?;
            let (certificates, crls) = signed::parse_degenerate_bag(&content)?;
            Ok(TransactionState::Issued(CertStore { certificates, crls }))
        }
        PkiStatus::Failure => {
            let fail_info = reply
                .fail_info
                .ok_or(ScepError::MissingAttribute("failInfo"))?;
            Ok(TransactionState::NonExistent(fail_info))
        }
        PkiStatus::Pending if pending_allowed => Ok(TransactionState::Pending),
        PkiStatus::Pending => Err(ScepError::IllegalPending(query)),
    }
}

/// An enrollment in flight. `send` submits the CSR; while the CA answers
/// `PENDING`, `poll` re-asks under the same transaction id with a fresh
/// nonce each time.
pub struct EnrollmentTransaction {
    pipeline: Pipeline,
    csr: CertReq,
    ca: Certificate,
    message_type: MessageType,
    transaction_id: TransactionId,
    state: Option<TransactionState>,
}

impl EnrollmentTransaction {
    pub(crate) fn new(
        pipeline: Pipeline,
        csr: CertReq,
        ca: Certificate,
        message_type: MessageType,
    ) -> Result<Self> {
        let transaction_id = TransactionId::from_csr(&csr)?;
        Ok(Self {
            pipeline,
            csr,
            ca,
            message_type,
            transaction_id,
            state: None,
        })
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn state(&self) -> Option<&TransactionState> {
        self.state.as_ref()
    }

    pub async fn send(&mut self) -> Result<&TransactionState> {
        if self.state.is_some() {
            return Err(ScepError::InvalidState("a second send"));
        }
        let payload = self.csr.to_der()?;
        let reply = self
            .pipeline
            .exchange(self.message_type, &self.transaction_id, Some(&payload))
            .await?;
        let state = classify(reply, true, self.message_type)?;
        tracing::info!(transaction_id = %self.transaction_id, state = discriminant_name(&state), "Enrollment sent");
        Ok(&*self.state.insert(state))
    }

    pub async fn poll(&mut self) -> Result<&TransactionState> {
        match self.state {
            Some(TransactionState::Pending) => {}
            _ => return Err(ScepError::InvalidState("polling")),
        }
        let poll_object = IssuerAndSubject {
            issuer: self.ca.tbs_certificate.subject.clone(),
            subject: self.csr.info.subject.clone(),
        };
        let payload = poll_object.to_der()?;
        let reply = self
            .pipeline
            .exchange(MessageType::CertPoll, &self.transaction_id, Some(&payload))
            .await?;
        let state = classify(reply, true, MessageType::CertPoll)?;
        tracing::info!(transaction_id = %self.transaction_id, state = discriminant_name(&state), "Enrollment polled");
        Ok(&*self.state.insert(state))
    }
}

/// A `GetCert` or `GetCRL` lookup. Same outer loop as enrollment, but a
/// `PENDING` answer is a protocol violation here.
pub struct QueryTransaction {
    pipeline: Pipeline,
    message_type: MessageType,
    issuer_and_serial: cms::cert::IssuerAndSerialNumber,
    transaction_id: TransactionId,
    state: Option<TransactionState>,
}

impl QueryTransaction {
    pub(crate) fn new(
        pipeline: Pipeline,
        message_type: MessageType,
        issuer_and_serial: cms::cert::IssuerAndSerialNumber,
    ) -> Self {
        Self {
            pipeline,
            message_type,
            issuer_and_serial,
            transaction_id: TransactionId::generate(),
            state: None,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn state(&self) -> Option<&TransactionState> {
        self.state.as_ref()
    }

    pub async fn send(&mut self) -> Result<&TransactionState> {
        if self.state.is_some() {
            return Err(ScepError::InvalidState("a second send"));
        }
        let payload = self.issuer_and_serial.to_der()?;
        let reply = self
            .pipeline
            .exchange(self.message_type, &self.transaction_id, Some(&payload))
            .await?;
        let state = classify(reply, false, self.message_type)?;
        tracing::info!(transaction_id = %self.transaction_id, state = discriminant_name(&state), "Query sent");
        Ok(&*self.state.insert(state))
    }
}

fn discriminant_name(state: &TransactionState) -> &'static str {
    match state {
        TransactionState::Issued(_) => "issued",
        TransactionState::Pending => "pending",
        TransactionState::NonExistent(_) => "non-existent",
    }
}
