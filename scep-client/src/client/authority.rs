//! Resolution of the unordered 1–3 certificate chain a CA hands back from
//! `GetCACert` into CA, signing RA, and encryption RA roles.

use const_oid::AssociatedOid;
use der::Decode;
use x509_cert::ext::pkix::KeyUsage;
use x509_cert::Certificate;

use crate::crypto;
use crate::error::{Result, ScepError};

#[derive(Debug, Clone)]
pub(crate) struct Authority {
    pub ca: Certificate,
    pub signing_ra: Option<Certificate>,
    pub encryption_ra: Option<Certificate>,
}

impl Authority {
    /// The CA is the certificate whose public key verifies the signature of
    /// every other chain member. With two RAs, the encryption RA is the one
    /// whose KeyUsage asserts neither digitalSignature nor cRLSign; a single
    /// RA serves both roles.
    pub fn resolve(chain: &[Certificate]) -> Result<Self> {
        match chain {
            [ca] => Ok(Self {
                ca: ca.clone(),
                signing_ra: None,
                encryption_ra: None,
            }),
            [first, second] => {
                let (ca, ra) = if crypto::certificate_signed_by(second, first) {
                    (first, second)
                } else if crypto::certificate_signed_by(first, second) {
                    (second, first)
                } else {
                    return Err(ScepError::ChainNoCa);
                };
                Ok(Self {
                    ca: ca.clone(),
                    signing_ra: Some(ra.clone()),
                    encryption_ra: Some(ra.clone()),
                })
            }
            [_, _, _] => {
                let ca_position = (0..3)
                    .find(|&candidate| {
                        (0..3)
                            .filter(|&other| other != candidate)
                            .all(|other| {
                                crypto::certificate_signed_by(&chain[other], &chain[candidate])
                            })
                    })
                    .ok_or(ScepError::ChainNoCa)?;
                let ras: Vec<&Certificate> = chain
                    .iter()
                    .enumerate()
                    .filter(|(position, _)| *position != ca_position)
                    .map(|(_, certificate)| certificate)
                    .collect();

                let first_is_encryption = is_encryption_only(ras[0])?;
                let second_is_encryption = is_encryption_only(ras[1])?;
                let (encryption_ra, signing_ra) = match (first_is_encryption, second_is_encryption)
                {
                    (true, false) => (ras[0], ras[1]),
                    (false, true) => (ras[1], ras[0]),
                    _ => return Err(ScepError::ChainAmbiguousRa),
                };
                Ok(Self {
                    ca: chain[ca_position].clone(),
                    signing_ra: Some(signing_ra.clone()),
                    encryption_ra: Some(encryption_ra.clone()),
                })
            }
            _ => Err(ScepError::ChainSize(chain.len())),
        }
    }

    /// The certificate enrollment payloads are encrypted for.
    pub fn recipient(&self) -> &Certificate {
        self.encryption_ra.as_ref().unwrap_or(&self.ca)
    }

    /// Certificates allowed to sign responses on this CA's behalf.
    pub fn responders(&self) -> Vec<Certificate> {
        let mut responders = vec![self.ca.clone()];
        for ra in [self.signing_ra.as_ref(), self.encryption_ra.as_ref()]
            .into_iter()
            .flatten()
        {
            if !responders.contains(ra) {
                responders.push(ra.clone());
            }
        }
        responders
    }
}

/// An RA qualifies as encryption-only when its KeyUsage asserts neither
/// digitalSignature (bit 0) nor cRLSign (bit 6). A certificate without a
/// KeyUsage extension asserts nothing and qualifies as well.
fn is_encryption_only(certificate: &Certificate) -> Result<bool> {
    for extension in certificate.tbs_certificate.extensions.iter().flatten() {
        if extension.extn_id == KeyUsage::OID {
            let key_usage = KeyUsage::from_der(extension.extn_value.as_bytes())?;
            return Ok(!(key_usage.digital_signature() || key_usage.crl_sign()));
        }
    }
    Ok(true)
}
