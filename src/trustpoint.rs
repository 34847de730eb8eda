/*
 * Copyright 2025 Oxide Computer Company
 */

use async_trait::async_trait;
use log::info;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509NameBuilder, X509};
use serde_json::json;

use crate::client::{CertificateClient, Oracle};
use crate::entity::Configurable;
use crate::error::{Error, Result};
use crate::path;
use crate::update::{Update, Updates};

pub const RSA_BITS: u32 = 2048;
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/*
 * A named slot on the device that holds a certificate and key pair.  The
 * slot itself is ordinary configuration; the material that goes into it is
 * loaded separately with load().
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TrustAnchor {
    name: String,
}

impl TrustAnchor {
    pub fn new(name: &str) -> Result<TrustAnchor> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
        {
            return Err(Error::invalid_value("trust anchor name", name));
        }
        Ok(TrustAnchor { name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /*
     * Generate a fresh self-signed certificate whose subject is this trust
     * anchor.
     */
    pub fn self_signed(&self, days: u32) -> Result<CertificateMaterial> {
        CertificateMaterial::generate(&self.name, days)
    }

    /*
     * Push certificate material into the slot.  Loading the same material
     * again is harmless, so this can simply be repeated on every pass.
     */
    pub async fn load(
        &self,
        c: &dyn CertificateClient,
        m: &CertificateMaterial,
    ) -> Result<()> {
        c.load_certificate(&self.name, m.cert_pem(), m.key_pem()).await?;
        info!("{self}: certificate loaded");
        Ok(())
    }
}

impl std::fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trust anchor {}", self.name)
    }
}

#[async_trait]
impl Configurable for TrustAnchor {
    async fn compile(&self, _o: &dyn Oracle) -> Result<Updates> {
        Ok(vec![Update::replace(
            path::trust_point(&self.name),
            json!({ "name": self.name }),
        )]
        .into())
    }

    async fn reset(&self, _o: &dyn Oracle) -> Result<Updates> {
        Ok(vec![Update::delete(path::trust_point(&self.name))].into())
    }
}

/*
 * A certificate and its private key, both PEM encoded.
 */
#[derive(Clone)]
pub struct CertificateMaterial {
    cert: X509,
    key: PKey<Private>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("subject", &self.subject_cn())
            .finish_non_exhaustive()
    }
}

impl CertificateMaterial {
    pub fn generate(subject: &str, days: u32) -> Result<CertificateMaterial> {
        if days == 0 {
            return Err(Error::out_of_range(
                "certificate validity",
                days,
                1,
                u32::MAX.into(),
            ));
        }

        let key = PKey::from_rsa(Rsa::generate(RSA_BITS)?)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, subject)?;
        let name = name.build();

        let serial = {
            let mut bn = BigNum::new()?;
            bn.rand(159, MsbOption::MAYBE_ZERO, false)?;
            bn.to_asn1_integer()?
        };

        let mut b = X509::builder()?;
        b.set_version(2)?;
        b.set_serial_number(&serial)?;
        b.set_subject_name(&name)?;
        b.set_issuer_name(&name)?;
        b.set_pubkey(&key)?;
        b.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
        b.set_not_after(Asn1Time::days_from_now(days)?.as_ref())?;
        b.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        b.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .key_cert_sign()
                .build()?,
        )?;
        b.sign(&key, MessageDigest::sha256())?;

        CertificateMaterial::new(b.build(), key)
    }

    /*
     * Package existing PEM material, making sure the key actually belongs to
     * the certificate.
     */
    pub fn from_pem(cert: &[u8], key: &[u8]) -> Result<CertificateMaterial> {
        let cert = X509::from_pem(cert)?;
        let key = PKey::private_key_from_pem(key)?;
        CertificateMaterial::new(cert, key)
    }

    fn new(cert: X509, key: PKey<Private>) -> Result<CertificateMaterial> {
        if !cert.public_key()?.public_eq(&key) {
            return Err(Error::Invalid(
                "private key does not match certificate".into(),
            ));
        }

        let cert_pem = cert.to_pem()?;
        let key_pem = key.private_key_to_pem_pkcs8()?;
        Ok(CertificateMaterial { cert, key, cert_pem, key_pem })
    }

    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }

    pub fn subject_cn(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|e| e.data().as_utf8().ok())
            .map(|s| s.to_string())
    }

    pub fn key_bits(&self) -> u32 {
        self.key.bits()
    }
}
