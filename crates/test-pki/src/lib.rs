//! Throwaway PKI for tests: a root, optional intermediates and server leaves.
//!
//! Everything here panics on failure; it is only linked into test builds.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use time::{Duration, OffsetDateTime};

pub struct Authority {
    der: CertificateDer<'static>,
    pem: String,
    issuer: Issuer<'static, KeyPair>,
}

pub struct Leaf {
    pub der: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl Leaf {
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::from(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = OffsetDateTime::now_utc() - Duration::days(365);
    params.not_after = OffsetDateTime::now_utc() + Duration::days(3650);
    params
}

fn leaf_params(sans: &[&str], not_after: OffsetDateTime) -> CertificateParams {
    let names: Vec<String> = sans.iter().map(|s| s.to_string()).collect();
    let mut params = CertificateParams::new(names).expect("leaf params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, sans.first().copied().unwrap_or("leaf"));
    params.distinguished_name = dn;
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.not_before = OffsetDateTime::now_utc() - Duration::days(1);
    params.not_after = not_after;
    params
}

impl Authority {
    pub fn root(common_name: &str) -> Self {
        let key = KeyPair::generate().expect("root key");
        let params = ca_params(common_name);
        let cert = params.self_signed(&key).expect("self-sign root");
        Authority {
            der: cert.der().clone(),
            pem: cert.pem(),
            issuer: Issuer::new(params, key),
        }
    }

    pub fn intermediate(&self, common_name: &str) -> Self {
        let key = KeyPair::generate().expect("intermediate key");
        let params = ca_params(common_name);
        let cert = params.signed_by(&key, &self.issuer).expect("sign intermediate");
        Authority {
            der: cert.der().clone(),
            pem: cert.pem(),
            issuer: Issuer::new(params, key),
        }
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.der.clone()
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Leaf valid for roughly a year.
    pub fn leaf(&self, sans: &[&str]) -> Leaf {
        self.leaf_valid_until(sans, OffsetDateTime::now_utc() + Duration::days(365))
    }

    pub fn leaf_valid_until(&self, sans: &[&str], not_after: OffsetDateTime) -> Leaf {
        let key = KeyPair::generate().expect("leaf key");
        let cert = leaf_params(sans, not_after)
            .signed_by(&key, &self.issuer)
            .expect("sign leaf");
        Leaf {
            der: cert.der().clone(),
            key_der: key.serialize_der(),
        }
    }
}

/// A leaf that signs itself, with no CA behind it.
pub fn self_signed_leaf(sans: &[&str]) -> Leaf {
    let key = KeyPair::generate().expect("leaf key");
    let not_after = OffsetDateTime::now_utc() + Duration::days(365);
    let cert = leaf_params(sans, not_after)
        .self_signed(&key)
        .expect("self-sign leaf");
    Leaf {
        der: cert.der().clone(),
        key_der: key.serialize_der(),
    }
}
