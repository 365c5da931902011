//! A miniature in-process SCEP CA: wiremock serves the HTTP side, this
//! module implements the server half of the message pipeline with the same
//! CMS building blocks the client uses, independently of the client code.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{
    EncryptedContentInfo, EnvelopedData, KeyTransRecipientInfo, RecipientIdentifier, RecipientInfo,
    RecipientInfos,
};
use cms::revocation::{RevocationInfoChoice, RevocationInfoChoices};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use const_oid::db::rfc5911::{
    ID_CONTENT_TYPE, ID_DATA, ID_ENVELOPED_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode, Tag};
use once_cell::sync::Lazy;
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use sha2::{Digest, Sha256};
use wiremock::{Request, Respond, ResponseTemplate};
use x509_cert::attr::Attribute;
use x509_cert::builder::{Builder, CertificateBuilder, Profile, RequestBuilder};
use x509_cert::crl::{CertificateList, TbsCertList};
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages};
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, Version};

pub const OID_MESSAGE_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.2");
pub const OID_PKI_STATUS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.3");
pub const OID_FAIL_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.4");
pub const OID_SENDER_NONCE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.5");
pub const OID_RECIPIENT_NONCE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.6");
pub const OID_TRANSACTION_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.7");

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const AES_128_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.2");
const DES_EDE3_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.7");

static SERIAL: AtomicU8 = AtomicU8::new(32);

#[ctor::ctor]
fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scep_client=debug".into()),
        )
        .try_init();
}

fn next_serial() -> SerialNumber {
    SerialNumber::new(&[SERIAL.fetch_add(1, Ordering::SeqCst)]).unwrap()
}

fn spki_of(key: &RsaPrivateKey) -> SubjectPublicKeyInfoOwned {
    let der = key.to_public_key().to_public_key_der().unwrap();
    SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).unwrap()
}

fn validity() -> Validity {
    Validity::from_now(Duration::from_secs(30 * 24 * 3600)).unwrap()
}

/// The server half: a CA key pair and certificate, plus everything needed
/// to answer SCEP exchanges.
pub struct TestCa {
    pub key: RsaPrivateKey,
    pub certificate: Certificate,
}

impl TestCa {
    pub fn generate(subject: &str) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let signer = SigningKey::<Sha256>::new(key.clone());
        let mut builder = CertificateBuilder::new(
            Profile::Manual { issuer: None },
            next_serial(),
            validity(),
            Name::from_str(subject).unwrap(),
            spki_of(&key),
            &signer,
        )
        .unwrap();
        builder
            .add_extension(&BasicConstraints {
                ca: true,
                path_len_constraint: None,
            })
            .unwrap();
        builder
            .add_extension(&KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
            .unwrap();
        let certificate = builder.build::<rsa::pkcs1v15::Signature>().unwrap();
        Self { key, certificate }
    }

    /// Issue a certificate for a decoded CSR, honoring its subject and key.
    pub fn issue_from_csr(&self, csr: &CertReq) -> Certificate {
        let signer = SigningKey::<Sha256>::new(self.key.clone());
        let mut builder = CertificateBuilder::new(
            Profile::Manual {
                issuer: Some(self.certificate.tbs_certificate.subject.clone()),
            },
            next_serial(),
            validity(),
            csr.info.subject.clone(),
            csr.info.public_key.clone(),
            &signer,
        )
        .unwrap();
        builder
            .add_extension(&KeyUsage(
                KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
            ))
            .unwrap();
        builder.build::<rsa::pkcs1v15::Signature>().unwrap()
    }

    /// Issue an RA certificate with the given key usage flags (none means
    /// no KeyUsage extension at all).
    pub fn issue_ra(&self, subject: &str, key_usage: Option<KeyUsage>) -> (RsaPrivateKey, Certificate) {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let signer = SigningKey::<Sha256>::new(self.key.clone());
        let mut builder = CertificateBuilder::new(
            Profile::Manual {
                issuer: Some(self.certificate.tbs_certificate.subject.clone()),
            },
            next_serial(),
            validity(),
            Name::from_str(subject).unwrap(),
            spki_of(&key),
            &signer,
        )
        .unwrap();
        if let Some(key_usage) = key_usage {
            builder.add_extension(&key_usage).unwrap();
        }
        (key, builder.build::<rsa::pkcs1v15::Signature>().unwrap())
    }

    /// A minimal signed CRL under this CA.
    pub fn empty_crl(&self) -> CertificateList {
        let signature_algorithm = AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA,
            parameters: Some(Any::null()),
        };
        let tbs_cert_list = TbsCertList {
            version: Version::V2,
            signature: signature_algorithm.clone(),
            issuer: self.certificate.tbs_certificate.subject.clone(),
            this_update: Time::UtcTime(
                UtcTime::from_unix_duration(Duration::from_secs(1_700_000_000)).unwrap(),
            ),
            next_update: None,
            revoked_certificates: None,
            crl_extensions: None,
        };
        let signer = SigningKey::<Sha256>::new(self.key.clone());
        let signature = signer.try_sign(&tbs_cert_list.to_der().unwrap()).unwrap();
        CertificateList {
            tbs_cert_list,
            signature_algorithm,
            signature: BitString::from_bytes(&signature.to_vec()).unwrap(),
        }
    }

    /// Sign a `GetNextCACert` response: signed-data by the current CA whose
    /// payload is a degenerate bag with the rollover chain.
    pub fn next_ca_response(&self, chain: &[Certificate]) -> Vec<u8> {
        let bag = degenerate_bag(chain, &[]);
        sign_pki_response(
            &self.key,
            &self.certificate,
            &bag,
            &[], // no SCEP attributes on a rollover bag
        )
    }

    /// Build a `CertRep` for a previously parsed request.
    pub fn cert_rep(&self, request: &ParsedPkiRequest, reply: CertRepSpec<'_>) -> Vec<u8> {
        let mut attributes: Vec<(ObjectIdentifier, Any)> = vec![
            (
                OID_MESSAGE_TYPE,
                printable("3"),
            ),
            (
                OID_TRANSACTION_ID,
                printable(reply.transaction_id.unwrap_or(&request.transaction_id)),
            ),
            (
                OID_PKI_STATUS,
                printable(&reply.status.to_string()),
            ),
            (OID_SENDER_NONCE, octets(&fresh_nonce())),
            (
                OID_RECIPIENT_NONCE,
                octets(reply.recipient_nonce.unwrap_or(&request.sender_nonce)),
            ),
        ];
        if let Some(fail_info) = reply.fail_info {
            attributes.push((OID_FAIL_INFO, printable(&fail_info.to_string())));
        }

        let content = reply.issued.map(|issued| {
            let bag = degenerate_bag(issued.certificates, issued.crls);
            encrypt_for(issued.recipient, &bag)
        });

        sign_pki_response(
            &self.key,
            &self.certificate,
            content.as_deref().unwrap_or_default(),
            &attributes,
        )
    }
}

pub struct IssuedContent<'a> {
    /// Certificate the enveloped reply is encrypted for (the enrolling
    /// client).
    pub recipient: &'a Certificate,
    pub certificates: &'a [Certificate],
    pub crls: &'a [CertificateList],
}

pub struct CertRepSpec<'a> {
    /// 0 = SUCCESS, 2 = FAILURE, 3 = PENDING
    pub status: u8,
    pub fail_info: Option<u8>,
    pub issued: Option<IssuedContent<'a>>,
    /// Overrides for tamper tests; default to echoing the request.
    pub transaction_id: Option<&'a str>,
    pub recipient_nonce: Option<&'a [u8]>,
}

impl<'a> CertRepSpec<'a> {
    pub fn success(issued: IssuedContent<'a>) -> Self {
        Self {
            status: 0,
            fail_info: None,
            issued: Some(issued),
            transaction_id: None,
            recipient_nonce: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            status: 3,
            fail_info: None,
            issued: None,
            transaction_id: None,
            recipient_nonce: None,
        }
    }

    pub fn failure(fail_info: u8) -> Self {
        Self {
            status: 2,
            fail_info: Some(fail_info),
            issued: None,
            transaction_id: None,
            recipient_nonce: None,
        }
    }
}

/// The client request after signature unwrapping and envelope decryption.
pub struct ParsedPkiRequest {
    pub message_type: u8,
    pub transaction_id: String,
    pub sender_nonce: Vec<u8>,
    /// Decrypted payload: CSR, poll object, or IssuerAndSerialNumber.
    pub payload: Vec<u8>,
    pub used_post: bool,
}

/// Extract and decrypt a `PKIOperation` request (POST body or GET
/// `message=` parameter) addressed to `decryption_key`.
pub fn parse_pki_operation(request: &Request, decryption_key: &RsaPrivateKey) -> ParsedPkiRequest {
    let used_post = request.method.to_string().eq_ignore_ascii_case("post");
    let raw = if used_post {
        request.body.clone()
    } else {
        let encoded = request
            .url
            .query_pairs()
            .find(|(name, _)| name == "message")
            .map(|(_, value)| value.into_owned())
            .expect("GET PKIOperation without message parameter");
        URL_SAFE.decode(encoded).expect("message is not base64url")
    };

    let content_info = ContentInfo::from_der(&raw).unwrap();
    assert_eq!(content_info.content_type, ID_SIGNED_DATA);
    let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
    let signer_info = signed_data.signer_infos.0.iter().next().unwrap();
    let attrs = signer_info.signed_attrs.as_ref().unwrap();

    let message_type = printable_attr(attrs, OID_MESSAGE_TYPE).parse::<u8>().unwrap();
    let transaction_id = printable_attr(attrs, OID_TRANSACTION_ID);
    let sender_nonce = octet_attr(attrs, OID_SENDER_NONCE);

    let econtent = signed_data
        .encap_content_info
        .econtent
        .expect("request carries no content");
    let payload = decrypt_envelope(decryption_key, econtent.value());

    ParsedPkiRequest {
        message_type,
        transaction_id,
        sender_nonce,
        payload,
        used_post,
    }
}

fn printable_attr(attrs: &SignedAttributes, oid: ObjectIdentifier) -> String {
    let value = attrs
        .iter()
        .find(|attribute| attribute.oid == oid)
        .and_then(|attribute| attribute.values.iter().next())
        .unwrap_or_else(|| panic!("missing attribute {oid}"));
    String::from_utf8(value.value().to_vec()).unwrap()
}

fn octet_attr(attrs: &SignedAttributes, oid: ObjectIdentifier) -> Vec<u8> {
    attrs
        .iter()
        .find(|attribute| attribute.oid == oid)
        .and_then(|attribute| attribute.values.iter().next())
        .unwrap_or_else(|| panic!("missing attribute {oid}"))
        .value()
        .to_vec()
}

fn decrypt_envelope(key: &RsaPrivateKey, raw: &[u8]) -> Vec<u8> {
    let content_info = ContentInfo::from_der(raw).unwrap();
    assert_eq!(content_info.content_type, ID_ENVELOPED_DATA);
    let enveloped = EnvelopedData::from_der(&content_info.content.to_der().unwrap()).unwrap();

    let ktri = enveloped
        .recip_infos
        .0
        .iter()
        .find_map(|info| match info {
            RecipientInfo::Ktri(ktri) => Some(ktri),
            _ => None,
        })
        .expect("no key-transport recipient");
    let cek = key
        .decrypt(Pkcs1v15Encrypt, ktri.enc_key.as_bytes())
        .expect("content key unwrap failed");

    let encrypted = &enveloped.encrypted_content;
    let iv = encrypted
        .content_enc_alg
        .parameters
        .as_ref()
        .expect("missing IV")
        .value()
        .to_vec();
    let ciphertext = encrypted.encrypted_content.as_ref().unwrap().as_bytes();

    use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
    let oid = encrypted.content_enc_alg.oid;
    if oid == AES_128_CBC {
        cbc::Decryptor::<aes::Aes128>::new_from_slices(&cek, &iv)
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .unwrap()
    } else if oid == DES_EDE3_CBC {
        cbc::Decryptor::<des::TdesEde3>::new_from_slices(&cek, &iv)
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .unwrap()
    } else {
        panic!("unexpected content cipher {oid}")
    }
}

/// Encrypt a reply payload for the client certificate, AES-128-CBC.
pub fn encrypt_for(recipient: &Certificate, plaintext: &[u8]) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut cek = [0u8; 16];
    rng.fill_bytes(&mut cek);
    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut iv);

    use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
    let ciphertext = cbc::Encryptor::<aes::Aes128>::new_from_slices(&cek, &iv)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let recipient_key = rsa::RsaPublicKey::from_public_key_der(
        &recipient
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .unwrap(),
    )
    .unwrap();
    let wrapped = recipient_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &cek)
        .unwrap();

    let ktri = KeyTransRecipientInfo {
        version: CmsVersion::V0,
        rid: RecipientIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: recipient.tbs_certificate.issuer.clone(),
            serial_number: recipient.tbs_certificate.serial_number.clone(),
        }),
        key_enc_alg: AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        enc_key: OctetString::new(wrapped.as_slice()).unwrap(),
    };
    let mut recipients = SetOfVec::new();
    recipients.insert(RecipientInfo::Ktri(ktri)).unwrap();

    let enveloped = EnvelopedData {
        version: CmsVersion::V0,
        originator_info: None,
        recip_infos: RecipientInfos(recipients),
        encrypted_content: EncryptedContentInfo {
            content_type: ID_DATA,
            content_enc_alg: AlgorithmIdentifierOwned {
                oid: AES_128_CBC,
                parameters: Some(Any::new(Tag::OctetString, iv.to_vec()).unwrap()),
            },
            encrypted_content: Some(OctetString::new(ciphertext).unwrap()),
        },
        unprotected_attrs: None,
    };
    ContentInfo {
        content_type: ID_ENVELOPED_DATA,
        content: Any::from_der(&enveloped.to_der().unwrap()).unwrap(),
    }
    .to_der()
    .unwrap()
}

fn printable(value: &str) -> Any {
    Any::new(Tag::PrintableString, value.as_bytes().to_vec()).unwrap()
}

fn octets(value: &[u8]) -> Any {
    Any::new(Tag::OctetString, value.to_vec()).unwrap()
}

fn fresh_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Attribute {
    let mut values = SetOfVec::new();
    values.insert(value).unwrap();
    Attribute { oid, values }
}

/// Signed-data with one signer over `content`, carrying `attributes` as
/// authenticated attributes (plus contentType and messageDigest) when any
/// are given, or no signed attributes at all otherwise.
pub fn sign_pki_response(
    key: &RsaPrivateKey,
    signer_certificate: &Certificate,
    content: &[u8],
    attributes: &[(ObjectIdentifier, Any)],
) -> Vec<u8> {
    let econtent = if content.is_empty() && !attributes.is_empty() {
        None
    } else {
        Some(Any::new(Tag::OctetString, content.to_vec()).unwrap())
    };

    let signer = SigningKey::<Sha256>::new(key.clone());
    let (signed_attrs, message) = if attributes.is_empty() {
        (None, content.to_vec())
    } else {
        let mut attrs: SignedAttributes = SetOfVec::new();
        attrs
            .insert(attribute(
                ID_CONTENT_TYPE,
                Any::new(Tag::ObjectIdentifier, ID_DATA.as_bytes().to_vec()).unwrap(),
            ))
            .unwrap();
        attrs
            .insert(attribute(
                ID_MESSAGE_DIGEST,
                octets(Sha256::digest(content).as_slice()),
            ))
            .unwrap();
        for (oid, value) in attributes {
            attrs.insert(attribute(*oid, value.clone())).unwrap();
        }
        let message = attrs.to_der().unwrap();
        (Some(attrs), message)
    };
    let signature = signer.try_sign(&message).unwrap();

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: signer_certificate.tbs_certificate.issuer.clone(),
            serial_number: signer_certificate.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: AlgorithmIdentifierOwned {
            oid: ID_SHA256,
            parameters: None,
        },
        signed_attrs,
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA,
            parameters: Some(Any::null()),
        },
        signature: OctetString::new(signature.to_vec()).unwrap(),
        unsigned_attrs: None,
    };

    let mut digest_algorithms = SetOfVec::new();
    digest_algorithms
        .insert(AlgorithmIdentifierOwned {
            oid: ID_SHA256,
            parameters: None,
        })
        .unwrap();
    let mut certificates = SetOfVec::new();
    certificates
        .insert(CertificateChoices::Certificate(signer_certificate.clone()))
        .unwrap();
    let mut signer_infos = SetOfVec::new();
    signer_infos.insert(signer_info).unwrap();

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent,
        },
        certificates: Some(CertificateSet(certificates)),
        crls: None,
        signer_infos: SignerInfos(signer_infos),
    };
    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der().unwrap()).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// A degenerate (signer-less) signed-data bag of certificates and CRLs.
pub fn degenerate_bag(certificates: &[Certificate], crls: &[CertificateList]) -> Vec<u8> {
    let mut certificate_set = SetOfVec::new();
    for certificate in certificates {
        certificate_set
            .insert(CertificateChoices::Certificate(certificate.clone()))
            .unwrap();
    }
    let mut crl_set = SetOfVec::new();
    for crl in crls {
        crl_set
            .insert(RevocationInfoChoice::Crl(crl.clone()))
            .unwrap();
    }
    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::new(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet(certificate_set)),
        crls: if crls.is_empty() {
            None
        } else {
            Some(RevocationInfoChoices(crl_set))
        },
        signer_infos: SignerInfos(SetOfVec::new()),
    };
    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der().unwrap()).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// Client-side fixtures shared by the scenario tests.
pub struct TestClient {
    pub key: RsaPrivateKey,
    pub certificate: Certificate,
}

impl TestClient {
    pub fn generate(subject: &str) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let signer = SigningKey::<Sha256>::new(key.clone());
        let builder = CertificateBuilder::new(
            Profile::Manual { issuer: None },
            next_serial(),
            validity(),
            Name::from_str(subject).unwrap(),
            spki_of(&key),
            &signer,
        )
        .unwrap();
        let certificate = builder.build::<rsa::pkcs1v15::Signature>().unwrap();
        Self { key, certificate }
    }

    pub fn csr(&self, subject: &str) -> CertReq {
        let signer = SigningKey::<Sha256>::new(self.key.clone());
        RequestBuilder::new(Name::from_str(subject).unwrap(), &signer)
            .unwrap()
            .build::<rsa::pkcs1v15::Signature>()
            .unwrap()
    }

    pub fn identity(&self) -> scep_client::ClientIdentity {
        scep_client::ClientIdentity::new(self.certificate.clone(), self.key.clone()).unwrap()
    }
}

/// Process-wide fixtures: RSA key generation is the expensive part of these
/// tests, so every scenario in a binary shares one CA and one client.
pub static CA: Lazy<TestCa> = Lazy::new(|| TestCa::generate("CN=Test SCEP CA,O=Example"));
pub static CLIENT: Lazy<TestClient> = Lazy::new(|| TestClient::generate("CN=test-client"));

/// Wiremock responder built from a plain closure.
pub struct FnResponder(
    pub Box<dyn Fn(&Request) -> ResponseTemplate + Send + Sync>,
);

impl Respond for FnResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        (self.0)(request)
    }
}

impl FnResponder {
    pub fn new(handler: impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static) -> Self {
        Self(Box::new(handler))
    }
}

pub fn pki_message_response(body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/x-pki-message")
}

pub fn ca_cert_response(certificate: &Certificate) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        certificate.to_der().unwrap(),
        "application/x-x509-ca-cert",
    )
}

pub fn ca_ra_cert_response(chain: &[Certificate]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        degenerate_bag(chain, &[]),
        "application/x-x509-ca-ra-cert",
    )
}
