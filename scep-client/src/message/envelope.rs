//! The pkcsPKIEnvelope layer: CMS enveloped-data with a single key-transport
//! recipient.

use cms::cert::IssuerAndSerialNumber;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{
    EncryptedContentInfo, EnvelopedData, KeyTransRecipientInfo, RecipientIdentifier, RecipientInfo,
    RecipientInfos,
};
use const_oid::db::rfc5911::{ID_DATA, ID_ENVELOPED_DATA};
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode, Tag, Tagged};
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::crypto::{self, CipherAlgo};
use crate::error::{Result, ScepError};

/// Encrypt `plaintext` for the recipient certificate. A fresh
/// content-encryption key is generated per call and wrapped PKCS#1 v1.5
/// under the recipient public key.
pub(crate) fn encrypt(
    recipient: &Certificate,
    cipher: CipherAlgo,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();

    let cek = Zeroizing::new({
        let mut key = vec![0u8; cipher.key_len()];
        rng.fill_bytes(&mut key);
        key
    });
    let mut iv = vec![0u8; cipher.iv_len()];
    rng.fill_bytes(&mut iv);

    let ciphertext = cipher.encrypt(&cek, &iv, plaintext)?;
    let wrapped_cek = crypto::rsa_public_key(recipient)?.encrypt(&mut rng, Pkcs1v15Encrypt, &cek)?;

    let ktri = KeyTransRecipientInfo {
        version: CmsVersion::V0,
        rid: RecipientIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: recipient.tbs_certificate.issuer.clone(),
            serial_number: recipient.tbs_certificate.serial_number.clone(),
        }),
        key_enc_alg: AlgorithmIdentifierOwned {
            oid: crypto::RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        enc_key: OctetString::new(wrapped_cek)?,
    };

    let mut recipient_infos = SetOfVec::new();
    recipient_infos.insert(RecipientInfo::Ktri(ktri))?;

    let enveloped = EnvelopedData {
        version: CmsVersion::V0,
        originator_info: None,
        recip_infos: RecipientInfos(recipient_infos),
        encrypted_content: EncryptedContentInfo {
            content_type: ID_DATA,
            content_enc_alg: AlgorithmIdentifierOwned {
                oid: cipher.oid(),
                parameters: Some(Any::new(Tag::OctetString, iv)?),
            },
            encrypted_content: Some(OctetString::new(ciphertext)?),
        },
        unprotected_attrs: None,
    };

    let content_info = ContentInfo {
        content_type: ID_ENVELOPED_DATA,
        content: Any::from_der(&enveloped.to_der()?)?,
    };
    Ok(content_info.to_der()?)
}

/// Decrypt enveloped-data addressed to the client identity: locate the
/// key-transport recipient matching (issuer, serial) of the identity
/// certificate, unwrap the content-encryption key, decrypt the content.
pub(crate) fn decrypt(
    identity_certificate: &Certificate,
    identity_key: &RsaPrivateKey,
    raw: &[u8],
) -> Result<Vec<u8>> {
    let content_info = ContentInfo::from_der(raw)?;
    if content_info.content_type != ID_ENVELOPED_DATA {
        return Err(ScepError::Cms("expected enveloped-data content"));
    }
    let enveloped = EnvelopedData::from_der(&content_info.content.to_der()?)?;

    let own_rid = IssuerAndSerialNumber {
        issuer: identity_certificate.tbs_certificate.issuer.clone(),
        serial_number: identity_certificate.tbs_certificate.serial_number.clone(),
    };
    let ktri = enveloped
        .recip_infos
        .0
        .iter()
        .find_map(|recipient_info| match recipient_info {
            RecipientInfo::Ktri(ktri)
                if matches!(
                    &ktri.rid,
                    RecipientIdentifier::IssuerAndSerialNumber(rid) if *rid == own_rid
                ) =>
            {
                Some(ktri)
            }
            _ => None,
        })
        .ok_or(ScepError::NoRecipient)?;

    if ktri.key_enc_alg.oid != crypto::RSA_ENCRYPTION {
        return Err(ScepError::UnsupportedAlgorithm(ktri.key_enc_alg.oid));
    }
    let cek = Zeroizing::new(
        identity_key
            .decrypt(Pkcs1v15Encrypt, ktri.enc_key.as_bytes())
            .map_err(|_| ScepError::Decrypt)?,
    );

    let encrypted = &enveloped.encrypted_content;
    let cipher = CipherAlgo::from_oid(encrypted.content_enc_alg.oid)
        .ok_or(ScepError::UnsupportedAlgorithm(encrypted.content_enc_alg.oid))?;
    let iv = encrypted
        .content_enc_alg
        .parameters
        .as_ref()
        .filter(|parameters| parameters.tag() == Tag::OctetString)
        .map(|parameters| parameters.value().to_vec())
        .ok_or(ScepError::Cms("content-encryption IV is missing"))?;
    let ciphertext = encrypted
        .encrypted_content
        .as_ref()
        .ok_or(ScepError::Cms("encrypted content is absent"))?;

    cipher.decrypt(&cek, &iv, ciphertext.as_bytes())
}
