//! Shared unit-test fixtures: RSA keys generated once per test process and
//! certificates built around them with the x509-cert builder.

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{CertificateSet, EncapsulatedContentInfo, SignedData, SignerInfos};
use const_oid::db::rfc5911::{ID_DATA, ID_SIGNED_DATA};
use der::asn1::SetOfVec;
use der::{Any, Decode, Encode};
use once_cell::sync::Lazy;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use x509_cert::builder::{Builder, CertificateBuilder, Profile, RequestBuilder};
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

static CLIENT_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("client key"));
static OTHER_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("other key"));
static CA_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("ca key"));

static SERIAL: AtomicU8 = AtomicU8::new(10);

pub(crate) fn client_key() -> &'static RsaPrivateKey {
    &CLIENT_KEY
}

pub(crate) fn other_key() -> &'static RsaPrivateKey {
    &OTHER_KEY
}

pub(crate) fn ca_key() -> &'static RsaPrivateKey {
    &CA_KEY
}

fn spki(key: &RsaPrivateKey) -> SubjectPublicKeyInfoOwned {
    let der = key
        .to_public_key()
        .to_public_key_der()
        .expect("public key der");
    SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).expect("spki")
}

fn validity() -> Validity {
    Validity::from_now(Duration::from_secs(365 * 24 * 3600)).expect("validity")
}

fn next_serial() -> SerialNumber {
    SerialNumber::new(&[SERIAL.fetch_add(1, Ordering::SeqCst)]).expect("serial")
}

fn self_signed(subject: &str, key: &RsaPrivateKey) -> Certificate {
    let signer = SigningKey::<Sha256>::new(key.clone());
    let builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        next_serial(),
        validity(),
        Name::from_str(subject).expect("subject"),
        spki(key),
        &signer,
    )
    .expect("certificate builder");
    builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("self-signed certificate")
}

static CLIENT_CERT: Lazy<Certificate> = Lazy::new(|| self_signed("CN=scep-client", &CLIENT_KEY));
static OTHER_CERT: Lazy<Certificate> = Lazy::new(|| self_signed("CN=unrelated", &OTHER_KEY));
static CA_CERT: Lazy<Certificate> = Lazy::new(|| {
    let signer = SigningKey::<Sha256>::new(CA_KEY.clone());
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        SerialNumber::new(&[1]).expect("serial"),
        validity(),
        Name::from_str("CN=SCEP Test CA,O=Example").expect("subject"),
        spki(&CA_KEY),
        &signer,
    )
    .expect("certificate builder");
    builder
        .add_extension(&BasicConstraints {
            ca: true,
            path_len_constraint: None,
        })
        .expect("basic constraints");
    builder
        .add_extension(&KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
        .expect("key usage");
    builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("ca certificate")
});

pub(crate) fn client_certificate() -> Certificate {
    CLIENT_CERT.clone()
}

pub(crate) fn other_certificate() -> Certificate {
    OTHER_CERT.clone()
}

pub(crate) fn ca_certificate() -> Certificate {
    CA_CERT.clone()
}

/// A certificate issued by the test CA for the given subject and key, with
/// an optional KeyUsage extension.
pub(crate) fn issue(
    subject: &str,
    key: &RsaPrivateKey,
    key_usage: Option<KeyUsage>,
) -> Certificate {
    let signer = SigningKey::<Sha256>::new(CA_KEY.clone());
    let issuer = CA_CERT.tbs_certificate.subject.clone();
    let mut builder = CertificateBuilder::new(
        Profile::Manual {
            issuer: Some(issuer),
        },
        next_serial(),
        validity(),
        Name::from_str(subject).expect("subject"),
        spki(key),
        &signer,
    )
    .expect("certificate builder");
    if let Some(key_usage) = key_usage {
        builder.add_extension(&key_usage).expect("key usage");
    }
    builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("issued certificate")
}

pub(crate) fn issue_signing_ra(subject: &str) -> Certificate {
    issue(
        subject,
        &OTHER_KEY,
        Some(KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
        )),
    )
}

pub(crate) fn issue_encryption_ra(subject: &str) -> Certificate {
    issue(
        subject,
        &OTHER_KEY,
        Some(KeyUsage(KeyUsages::KeyEncipherment.into())),
    )
}

pub(crate) fn issued_client_certificate(subject: &str) -> Certificate {
    issue(
        subject,
        &CLIENT_KEY,
        Some(KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
        )),
    )
}

fn csr(subject: &str, key: &RsaPrivateKey) -> CertReq {
    let signer = SigningKey::<Sha256>::new(key.clone());
    let builder =
        RequestBuilder::new(Name::from_str(subject).expect("subject"), &signer).expect("csr");
    builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("signed csr")
}

pub(crate) fn client_csr(subject: &str) -> CertReq {
    csr(subject, &CLIENT_KEY)
}

pub(crate) fn other_csr(subject: &str) -> CertReq {
    csr(subject, &OTHER_KEY)
}

/// A degenerate (signer-less) certificate bag, the container shape CAs use
/// for chains and issued certificates.
pub(crate) fn degenerate_bag(certificates: &[Certificate]) -> Vec<u8> {
    let mut set = SetOfVec::new();
    for certificate in certificates {
        set.insert(CertificateChoices::Certificate(certificate.clone()))
            .expect("certificate set");
    }
    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::new(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet(set)),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::new()),
    };
    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der().expect("signed data der"))
            .expect("signed data as any"),
    };
    content_info.to_der().expect("content info der")
}
