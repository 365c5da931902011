//! RSA and block-cipher primitives shared by the SCEP message codecs.
//!
//! The protocol pins the asymmetric algorithm to RSA: requests are signed
//! with the client key and the content-encryption key travels PKCS#1 v1.5
//! wrapped for the recipient certificate.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Encode;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::{SignatureEncoding, Signer, Verifier};
use x509_cert::Certificate;

use crate::error::{Result, ScepError};

pub(crate) const RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const ID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

const AES_128_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.2");
const DES_EDE3_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.7");

/// Message digest negotiated from the CA capability set. SHA-1 is the
/// protocol floor and stays supported for that reason alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgo {
    pub(crate) const fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgo::Sha1 => ID_SHA1,
            HashAlgo::Sha256 => ID_SHA256,
            HashAlgo::Sha384 => ID_SHA384,
            HashAlgo::Sha512 => ID_SHA512,
        }
    }

    pub(crate) const fn rsa_signature_oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgo::Sha1 => SHA1_WITH_RSA,
            HashAlgo::Sha256 => SHA256_WITH_RSA,
            HashAlgo::Sha384 => SHA384_WITH_RSA,
            HashAlgo::Sha512 => SHA512_WITH_RSA,
        }
    }

    pub(crate) fn from_digest_oid(oid: ObjectIdentifier) -> Option<Self> {
        if oid == ID_SHA1 {
            Some(HashAlgo::Sha1)
        } else if oid == ID_SHA256 {
            Some(HashAlgo::Sha256)
        } else if oid == ID_SHA384 {
            Some(HashAlgo::Sha384)
        } else if oid == ID_SHA512 {
            Some(HashAlgo::Sha512)
        } else {
            None
        }
    }

    pub(crate) fn from_signature_oid(oid: ObjectIdentifier) -> Option<Self> {
        if oid == SHA1_WITH_RSA {
            Some(HashAlgo::Sha1)
        } else if oid == SHA256_WITH_RSA {
            Some(HashAlgo::Sha256)
        } else if oid == SHA384_WITH_RSA {
            Some(HashAlgo::Sha384)
        } else if oid == SHA512_WITH_RSA {
            Some(HashAlgo::Sha512)
        } else {
            None
        }
    }

    pub(crate) fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgo::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgo::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgo::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgo::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Content-encryption cipher for the PKCS#7 envelope. AES-128-CBC when the
/// CA advertises `AES`, Triple-DES-CBC as the legacy fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgo {
    Aes128Cbc,
    TripleDesCbc,
}

impl CipherAlgo {
    pub(crate) const fn oid(&self) -> ObjectIdentifier {
        match self {
            CipherAlgo::Aes128Cbc => AES_128_CBC,
            CipherAlgo::TripleDesCbc => DES_EDE3_CBC,
        }
    }

    pub(crate) fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        if oid == AES_128_CBC {
            Some(CipherAlgo::Aes128Cbc)
        } else if oid == DES_EDE3_CBC {
            Some(CipherAlgo::TripleDesCbc)
        } else {
            None
        }
    }

    pub(crate) const fn key_len(&self) -> usize {
        match self {
            CipherAlgo::Aes128Cbc => 16,
            CipherAlgo::TripleDesCbc => 24,
        }
    }

    pub(crate) const fn iv_len(&self) -> usize {
        match self {
            CipherAlgo::Aes128Cbc => 16,
            CipherAlgo::TripleDesCbc => 8,
        }
    }

    pub(crate) fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(match self {
            CipherAlgo::Aes128Cbc => cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(|_| ScepError::Encrypt)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            CipherAlgo::TripleDesCbc => cbc::Encryptor::<des::TdesEde3>::new_from_slices(key, iv)
                .map_err(|_| ScepError::Encrypt)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        })
    }

    pub(crate) fn decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            CipherAlgo::Aes128Cbc => cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(|_| ScepError::Decrypt)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| ScepError::Decrypt),
            CipherAlgo::TripleDesCbc => cbc::Decryptor::<des::TdesEde3>::new_from_slices(key, iv)
                .map_err(|_| ScepError::Decrypt)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| ScepError::Decrypt),
        }
    }
}

/// Extract the RSA public key of a certificate, or fail with [`ScepError::NotRsa`].
pub(crate) fn rsa_public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|_| ScepError::NotRsa)
}

fn sign_with<D>(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = SigningKey::<D>::new(key.clone());
    Ok(signing_key.try_sign(message)?.to_vec())
}

pub(crate) fn sign_pkcs1v15(key: &RsaPrivateKey, algo: HashAlgo, message: &[u8]) -> Result<Vec<u8>> {
    match algo {
        HashAlgo::Sha1 => sign_with::<Sha1>(key, message),
        HashAlgo::Sha256 => sign_with::<Sha256>(key, message),
        HashAlgo::Sha384 => sign_with::<Sha384>(key, message),
        HashAlgo::Sha512 => sign_with::<Sha512>(key, message),
    }
}

fn verify_with<D>(key: &RsaPublicKey, message: &[u8], signature: &Signature) -> Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = VerifyingKey::<D>::new(key.clone());
    verifying_key.verify(message, signature)?;
    Ok(())
}

pub(crate) fn verify_pkcs1v15(
    key: &RsaPublicKey,
    algo: HashAlgo,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let signature = Signature::try_from(signature)?;
    match algo {
        HashAlgo::Sha1 => verify_with::<Sha1>(key, message, &signature),
        HashAlgo::Sha256 => verify_with::<Sha256>(key, message, &signature),
        HashAlgo::Sha384 => verify_with::<Sha384>(key, message, &signature),
        HashAlgo::Sha512 => verify_with::<Sha512>(key, message, &signature),
    }
}

/// Whether `certificate` carries a signature made by the key of `issuer`.
pub(crate) fn certificate_signed_by(certificate: &Certificate, issuer: &Certificate) -> bool {
    let check = || -> Result<()> {
        let algo = HashAlgo::from_signature_oid(certificate.signature_algorithm.oid)
            .ok_or(ScepError::UnsupportedAlgorithm(certificate.signature_algorithm.oid))?;
        let tbs = certificate.tbs_certificate.to_der()?;
        let signature = certificate
            .signature
            .as_bytes()
            .ok_or(ScepError::Cms("certificate signature is not octet aligned"))?;
        verify_pkcs1v15(&rsa_public_key(issuer)?, algo, &tbs, signature)
    };
    check().is_ok()
}

pub(crate) fn sha256_fingerprint(certificate: &Certificate) -> Result<[u8; 32]> {
    Ok(Sha256::digest(certificate.to_der()?).into())
}
