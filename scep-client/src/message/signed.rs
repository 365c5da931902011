//! The pkiMessage layer: CMS signed-data carrying the SCEP authenticated
//! attribute set, plus the degenerate certificate bag used by responses.

use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::revocation::RevocationInfoChoice;
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use const_oid::db::rfc5911::{ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use const_oid::ObjectIdentifier;
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode, Tag, Tagged};
use rsa::RsaPrivateKey;
use x509_cert::attr::Attribute;
use x509_cert::crl::CertificateList;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

use crate::crypto::{self, HashAlgo};
use crate::error::{Result, ScepError};
use crate::message::{oids, FailInfo, MessageType, Nonce, PkiMessage, PkiStatus, TransactionId};

pub(crate) struct SignRequest<'a> {
    pub message_type: MessageType,
    pub transaction_id: &'a TransactionId,
    pub sender_nonce: &'a Nonce,
    /// Enveloped-data DER, absent for messages without a payload.
    pub content: Option<&'a [u8]>,
    pub profile: Option<&'a str>,
    pub digest: HashAlgo,
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    let mut values = SetOfVec::new();
    values.insert(value)?;
    Ok(Attribute { oid, values })
}

fn printable(value: &str) -> Result<Any> {
    Ok(Any::new(Tag::PrintableString, value.as_bytes().to_vec())?)
}

fn octets(value: &[u8]) -> Result<Any> {
    Ok(Any::new(Tag::OctetString, value.to_vec())?)
}

/// Wrap a payload into signed-data under the client identity, carrying the
/// SCEP authenticated attributes.
pub(crate) fn sign(
    signer_certificate: &Certificate,
    signer_key: &RsaPrivateKey,
    request: &SignRequest<'_>,
) -> Result<Vec<u8>> {
    let econtent = request
        .content
        .map(|content| Any::new(Tag::OctetString, content.to_vec()))
        .transpose()?;

    let mut signed_attrs: SignedAttributes = SetOfVec::new();
    signed_attrs.insert(attribute(
        ID_CONTENT_TYPE,
        Any::new(Tag::ObjectIdentifier, ID_DATA.as_bytes().to_vec())?,
    )?)?;
    signed_attrs.insert(attribute(
        ID_MESSAGE_DIGEST,
        octets(&request.digest.digest(request.content.unwrap_or_default()))?,
    )?)?;
    signed_attrs.insert(attribute(
        oids::MESSAGE_TYPE,
        printable(&request.message_type.code().to_string())?,
    )?)?;
    signed_attrs.insert(attribute(
        oids::TRANSACTION_ID,
        printable(request.transaction_id.as_str())?,
    )?)?;
    signed_attrs.insert(attribute(
        oids::SENDER_NONCE,
        octets(request.sender_nonce.as_bytes())?,
    )?)?;
    if let Some(profile) = request.profile {
        signed_attrs.insert(attribute(oids::PROFILE, printable(profile)?)?)?;
    }

    // RFC 5652: the signature covers the SET OF encoding of the signed
    // attributes, not their [0] IMPLICIT rendition inside SignerInfo.
    let signature = crypto::sign_pkcs1v15(signer_key, request.digest, &signed_attrs.to_der()?)?;

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: signer_certificate.tbs_certificate.issuer.clone(),
            serial_number: signer_certificate.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: AlgorithmIdentifierOwned {
            oid: request.digest.oid(),
            parameters: None,
        },
        signed_attrs: Some(signed_attrs),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: request.digest.rsa_signature_oid(),
            parameters: Some(Any::null()),
        },
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    };

    let mut digest_algorithms = SetOfVec::new();
    digest_algorithms.insert(AlgorithmIdentifierOwned {
        oid: request.digest.oid(),
        parameters: None,
    })?;

    let mut certificates = SetOfVec::new();
    certificates.insert(CertificateChoices::Certificate(signer_certificate.clone()))?;

    let mut signer_infos = SetOfVec::new();
    signer_infos.insert(signer_info)?;

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

    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der()?)?,
    };
    Ok(content_info.to_der()?)
}

pub(crate) struct VerifiedSignedData {
    pub signer: Certificate,
    pub econtent: Option<Vec<u8>>,
    pub signed_attrs: Option<SignedAttributes>,
}

fn matches_sid(certificate: &Certificate, sid: &SignerIdentifier) -> bool {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(ias) => {
            certificate.tbs_certificate.issuer == ias.issuer
                && certificate.tbs_certificate.serial_number == ias.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(_) => false,
    }
}

/// Verify the single signer of a signed-data blob and hand back its content
/// and authenticated attributes. `candidates` supplements the certificates
/// embedded in the message when resolving the signer; the caller decides
/// afterwards whether the resolved signer is acceptable.
pub(crate) fn verify_signed_data(
    raw: &[u8],
    candidates: &[Certificate],
) -> Result<VerifiedSignedData> {
    let content_info = ContentInfo::from_der(raw)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(ScepError::Cms("expected signed-data content"));
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;

    let mut signers = signed_data.signer_infos.0.iter();
    let signer_info = signers
        .next()
        .ok_or(ScepError::Cms("signed-data carries no signer"))?;
    if signers.next().is_some() {
        return Err(ScepError::Cms("signed-data carries more than one signer"));
    }

    let embedded = signed_data
        .certificates
        .as_ref()
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(certificate) => Some(certificate),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let signer = embedded
        .into_iter()
        .chain(candidates.iter())
        .find(|certificate| matches_sid(certificate, &signer_info.sid))
        .cloned()
        .ok_or(ScepError::UntrustedSigner)?;

    let digest = HashAlgo::from_digest_oid(signer_info.digest_alg.oid)
        .ok_or(ScepError::UnsupportedAlgorithm(signer_info.digest_alg.oid))?;
    let signature_oid = signer_info.signature_algorithm.oid;
    if signature_oid != crypto::RSA_ENCRYPTION
        && HashAlgo::from_signature_oid(signature_oid).is_none()
    {
        return Err(ScepError::UnsupportedAlgorithm(signature_oid));
    }

    let econtent = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .map(|content| content.value().to_vec());

    let signer_key = crypto::rsa_public_key(&signer)?;
    let signature = signer_info.signature.as_bytes();
    match &signer_info.signed_attrs {
        Some(signed_attrs) => {
            let expected = digest.digest(econtent.as_deref().unwrap_or_default());
            let digest_attr = find_attr(signed_attrs, ID_MESSAGE_DIGEST)
                .ok_or(ScepError::MissingAttribute("messageDigest"))?;
            if digest_attr.tag() != Tag::OctetString || digest_attr.value() != expected {
                return Err(ScepError::DigestMismatch);
            }
            crypto::verify_pkcs1v15(&signer_key, digest, &signed_attrs.to_der()?, signature)?;
            Ok(VerifiedSignedData {
                signer,
                econtent,
                signed_attrs: Some(signed_attrs.clone()),
            })
        }
        None => {
            let content = econtent
                .as_deref()
                .ok_or(ScepError::Cms("unsigned attributes and no content to verify"))?;
            crypto::verify_pkcs1v15(&signer_key, digest, content, signature)?;
            Ok(VerifiedSignedData {
                signer,
                econtent,
                signed_attrs: None,
            })
        }
    }
}

fn find_attr<'a>(attrs: &'a SignedAttributes, oid: ObjectIdentifier) -> Option<&'a Any> {
    attrs
        .iter()
        .find(|attribute| attribute.oid == oid)
        .and_then(|attribute| attribute.values.iter().next())
}

fn printable_attr(attrs: &SignedAttributes, oid: ObjectIdentifier, name: &'static str) -> Result<Option<String>> {
    match find_attr(attrs, oid) {
        None => Ok(None),
        Some(value) => {
            if value.tag() != Tag::PrintableString {
                return Err(ScepError::MalformedAttribute(name));
            }
            std::str::from_utf8(value.value())
                .map(|s| Some(s.to_owned()))
                .map_err(|_| ScepError::MalformedAttribute(name))
        }
    }
}

fn octet_attr(attrs: &SignedAttributes, oid: ObjectIdentifier, name: &'static str) -> Result<Option<Vec<u8>>> {
    match find_attr(attrs, oid) {
        None => Ok(None),
        Some(value) => {
            if value.tag() != Tag::OctetString {
                return Err(ScepError::MalformedAttribute(name));
            }
            Ok(Some(value.value().to_vec()))
        }
    }
}

fn code_attr(attrs: &SignedAttributes, oid: ObjectIdentifier, name: &'static str) -> Result<Option<u8>> {
    printable_attr(attrs, oid, name)?
        .map(|value| value.parse::<u8>().map_err(|_| ScepError::MalformedAttribute(name)))
        .transpose()
}

/// Verify a pkiMessage and lift its authenticated attributes into the
/// logical record. The signer must be one of `responders` (the CA or an
/// RA); anything else is rejected before the attributes are looked at.
pub(crate) fn decode_pki_message(raw: &[u8], responders: &[Certificate]) -> Result<PkiMessage> {
    let verified = verify_signed_data(raw, responders)?;

    let signer_der = verified.signer.to_der()?;
    let mut authorized = false;
    for responder in responders {
        if responder.to_der()? == signer_der {
            authorized = true;
            break;
        }
    }
    if !authorized {
        return Err(ScepError::UntrustedSigner);
    }

    let attrs = verified
        .signed_attrs
        .as_ref()
        .ok_or(ScepError::Cms("pkiMessage carries no authenticated attributes"))?;

    let message_type = code_attr(attrs, oids::MESSAGE_TYPE, "messageType")?
        .ok_or(ScepError::MissingAttribute("messageType"))?;
    let message_type =
        MessageType::from_code(message_type).ok_or(ScepError::MalformedAttribute("messageType"))?;

    let transaction_id = printable_attr(attrs, oids::TRANSACTION_ID, "transactionID")?
        .ok_or(ScepError::MissingAttribute("transactionID"))?;

    let sender_nonce = octet_attr(attrs, oids::SENDER_NONCE, "senderNonce")?
        .ok_or(ScepError::MissingAttribute("senderNonce"))?;
    let sender_nonce = Nonce::try_from(sender_nonce.as_slice())?;

    let recipient_nonce = octet_attr(attrs, oids::RECIPIENT_NONCE, "recipientNonce")?
        .map(|bytes| Nonce::try_from(bytes.as_slice()))
        .transpose()?;

    let status = code_attr(attrs, oids::PKI_STATUS, "pkiStatus")?
        .map(|code| PkiStatus::from_code(code).ok_or(ScepError::MalformedAttribute("pkiStatus")))
        .transpose()?;

    let fail_info = code_attr(attrs, oids::FAIL_INFO, "failInfo")?
        .map(|code| FailInfo::from_code(code).ok_or(ScepError::MalformedAttribute("failInfo")))
        .transpose()?;

    Ok(PkiMessage {
        message_type,
        transaction_id: TransactionId::from_string(transaction_id),
        sender_nonce,
        recipient_nonce,
        status,
        fail_info,
        content: verified.econtent,
    })
}

/// Verify a `GetNextCACert` response: the enclosing signed-data must be
/// anchored at the current CA, its payload is a degenerate bag holding the
/// rollover chain.
pub(crate) fn verify_rollover(raw: &[u8], current_ca: &Certificate) -> Result<Vec<Certificate>> {
    let verified = verify_signed_data(raw, std::slice::from_ref(current_ca))?;

    let anchored = verified.signer.to_der()? == current_ca.to_der()?
        || crypto::certificate_signed_by(&verified.signer, current_ca);
    if !anchored {
        return Err(ScepError::RolloverNotAnchored);
    }

    let bag = verified
        .econtent
        .ok_or(ScepError::Cms("next-CA response carries no content"))?;
    let (certificates, _) = parse_degenerate_bag(&bag)?;
    if certificates.is_empty() {
        return Err(ScepError::Cms("next-CA bag carries no certificates"));
    }
    Ok(certificates)
}

/// Unpack a degenerate (signer-less) signed-data certificate bag.
pub(crate) fn parse_degenerate_bag(
    raw: &[u8],
) -> Result<(Vec<Certificate>, Vec<CertificateList>)> {
    let content_info = ContentInfo::from_der(raw)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(ScepError::Cms("expected a degenerate signed-data bag"));
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;

    let certificates = signed_data
        .certificates
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(certificate) => Some(certificate.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let crls = signed_data
        .crls
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    RevocationInfoChoice::Crl(crl) => Some(crl.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok((certificates, crls))
}
