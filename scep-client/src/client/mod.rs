//! The client façade: binds identity, endpoint, trust callback, and an
//! optional CA profile, and exposes the five public SCEP operations.

pub(crate) mod authority;
pub mod trust;

use std::collections::HashMap;
use std::sync::Arc;

use cms::cert::IssuerAndSerialNumber;
use rsa::RsaPrivateKey;
use tokio::sync::Mutex;
use url::Url;
use x509_cert::crl::CertificateList;
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::capabilities::{Capabilities, Capability};
use crate::crypto::{self, CipherAlgo};
use crate::error::{Result, ScepError};
use crate::message::{signed, MessageType};
use crate::transaction::{CertStore, EnrollmentTransaction, Pipeline, QueryTransaction, TransactionState};
use crate::transport::Transport;
use authority::Authority;
use trust::{TrustCallback, TrustStore};

/// The enrolling entity: an X.509 certificate and its RSA private key. The
/// protocol signs requests and unwraps response keys with this pair, so
/// both must be RSA and must match.
#[derive(Clone)]
pub struct ClientIdentity {
    certificate: Certificate,
    key: RsaPrivateKey,
}

impl ClientIdentity {
    pub fn new(certificate: Certificate, key: RsaPrivateKey) -> Result<Self> {
        let certificate_key = crypto::rsa_public_key(&certificate)?;
        if certificate_key != key.to_public_key() {
            return Err(ScepError::IdentityKeyMismatch);
        }
        Ok(Self { certificate, key })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    fn is_self_signed(&self) -> bool {
        self.certificate.tbs_certificate.issuer == self.certificate.tbs_certificate.subject
    }
}

/// A SCEP client bound to one CA endpoint.
///
/// The instance is passive configuration plus two caches (capabilities per
/// profile, approved CA certificates); transports are created per
/// operation, so the client is freely shareable behind an `Arc`.
pub struct Client {
    endpoint: Url,
    http: reqwest::Client,
    identity: ClientIdentity,
    profile: Option<String>,
    preferred_cipher: Option<CipherAlgo>,
    capabilities: Mutex<HashMap<String, Capabilities>>,
    trust: TrustStore,
}

impl Client {
    /// Endpoint validation happens here: an absolute http(s) URL with no
    /// query string and no fragment.
    pub fn new(
        endpoint: &str,
        identity: ClientIdentity,
        callback: impl TrustCallback + 'static,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ScepError::EndpointScheme(endpoint.scheme().to_owned()));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(ScepError::EndpointNotPlain(endpoint));
        }
        let http = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self {
            endpoint,
            http,
            identity,
            profile: None,
            preferred_cipher: None,
            capabilities: Mutex::new(HashMap::new()),
            trust: TrustStore::new(Arc::new(callback)),
        })
    }

    /// Select a CA profile, sent as the `message` query parameter and as an
    /// authenticated attribute on transactional messages.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Narrow the negotiated content cipher. Only honored when the CA
    /// advertises the corresponding capability.
    pub fn with_preferred_cipher(mut self, cipher: CipherAlgo) -> Self {
        self.preferred_cipher = Some(cipher);
        self
    }

    fn transport(&self) -> Transport {
        Transport::new(self.http.clone(), self.endpoint.clone())
    }

    /// The CA capability set, fetched once per profile and cached for the
    /// client lifetime. A failed probe is not cached.
    pub async fn capabilities(&self) -> Result<Capabilities> {
        let key = self.profile.clone().unwrap_or_default();
        let mut cache = self.capabilities.lock().await;
        if let Some(capabilities) = cache.get(&key) {
            tracing::trace!(profile = %key, "Capability cache hit");
            return Ok(capabilities.clone());
        }
        let capabilities = self
            .transport()
            .get_ca_caps(self.profile.as_deref())
            .await?;
        cache.insert(key, capabilities.clone());
        Ok(capabilities)
    }

    /// The full certificate chain from `GetCACert`, after the CA
    /// certificate passed the trust callback.
    pub async fn ca_certificates(&self) -> Result<Vec<Certificate>> {
        let (chain, _) = self.resolve_authority().await?;
        Ok(chain)
    }

    async fn resolve_authority(&self) -> Result<(Vec<Certificate>, Authority)> {
        let chain = self
            .transport()
            .get_ca_cert(self.profile.as_deref())
            .await?;
        tracing::debug!(chain_len = chain.len(), "GetCACert returned a chain");
        let authority = Authority::resolve(&chain)?;
        self.trust.check(&authority.ca).await?;
        Ok((chain, authority))
    }

    /// The next-generation CA chain, available ahead of CA certificate
    /// expiry when the CA advertises `GetNextCACert`.
    pub async fn rollover_certificates(&self) -> Result<Vec<Certificate>> {
        let capabilities = self.capabilities().await?;
        if !capabilities.rollover_supported() {
            return Err(ScepError::Unsupported(Capability::GetNextCaCert));
        }
        let (_, authority) = self.resolve_authority().await?;
        let raw = self
            .transport()
            .get_next_ca_cert(self.profile.as_deref())
            .await?;
        signed::verify_rollover(&raw, &authority.ca)
    }

    /// Prepare an enrollment for `csr`. Nothing is sent yet; the caller
    /// drives the returned transaction through `send` and, while the CA
    /// answers pending, `poll`.
    pub async fn enroll(&self, csr: CertReq) -> Result<EnrollmentTransaction> {
        let capabilities = self.capabilities().await?;
        let (_, authority) = self.resolve_authority().await?;
        let message_type = if self.is_renewal(&csr, &capabilities) {
            MessageType::RenewalReq
        } else {
            MessageType::PkcsReq
        };
        tracing::debug!(%message_type, "Prepared enrollment transaction");
        let pipeline = self.pipeline(&capabilities, &authority);
        EnrollmentTransaction::new(pipeline, csr, authority.ca, message_type)
    }

    /// Look up an issued certificate by serial number under the CA issuer
    /// name.
    pub async fn certificate(&self, serial: SerialNumber) -> Result<Vec<Certificate>> {
        let store = self.query(MessageType::GetCert, Some(serial)).await?;
        Ok(store.certificates)
    }

    /// Fetch the CA's current CRL, when it distributes one over SCEP.
    pub async fn crl(&self) -> Result<Option<CertificateList>> {
        let store = self.query(MessageType::GetCrl, None).await?;
        Ok(store.crls.into_iter().next())
    }

    async fn query(
        &self,
        message_type: MessageType,
        serial: Option<SerialNumber>,
    ) -> Result<CertStore> {
        let capabilities = self.capabilities().await?;
        let (_, authority) = self.resolve_authority().await?;
        let serial =
            serial.unwrap_or_else(|| authority.ca.tbs_certificate.serial_number.clone());
        let issuer_and_serial = IssuerAndSerialNumber {
            issuer: authority.ca.tbs_certificate.issuer.clone(),
            serial_number: serial,
        };
        let pipeline = self.pipeline(&capabilities, &authority);
        let mut transaction = QueryTransaction::new(pipeline, message_type, issuer_and_serial);
        match transaction.send().await? {
            TransactionState::Issued(store) => Ok(store.clone()),
            TransactionState::NonExistent(fail_info) => {
                Err(ScepError::OperationFailed(*fail_info))
            }
            TransactionState::Pending => Err(ScepError::IllegalPending(message_type)),
        }
    }

    /// A renewal replaces the current identity certificate: the CSR asks
    /// for the identity's subject, the identity was issued by a CA rather
    /// than self-signed, and the CA advertises `Renewal`.
    fn is_renewal(&self, csr: &CertReq, capabilities: &Capabilities) -> bool {
        capabilities.renewal_supported()
            && !self.identity.is_self_signed()
            && csr.info.subject == self.identity.certificate.tbs_certificate.subject
    }

    fn effective_cipher(&self, capabilities: &Capabilities) -> CipherAlgo {
        match self.preferred_cipher {
            Some(CipherAlgo::Aes128Cbc) if capabilities.contains(Capability::Aes) => {
                CipherAlgo::Aes128Cbc
            }
            Some(CipherAlgo::TripleDesCbc) if capabilities.contains(Capability::TripleDes) => {
                CipherAlgo::TripleDesCbc
            }
            _ => capabilities.strongest_cipher(),
        }
    }

    fn pipeline(&self, capabilities: &Capabilities, authority: &Authority) -> Pipeline {
        Pipeline {
            transport: self.transport(),
            identity_certificate: self.identity.certificate.clone(),
            identity_key: self.identity.key.clone(),
            recipient: authority.recipient().clone(),
            responders: authority.responders(),
            digest: capabilities.strongest_digest(),
            cipher: self.effective_cipher(capabilities),
            use_post: capabilities.post_supported(),
            profile: self.profile.clone(),
        }
    }
}
