//! Shared test fixtures: a disposable PKI and PKCS#12 container builders.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

/// A three-level test PKI: self-signed root, intermediate, and a
/// practitioner leaf certificate.
pub struct TestPki {
    pub root: X509,
    pub root_key: PKey<Private>,
    pub intermediate: X509,
    pub intermediate_key: PKey<Private>,
    pub leaf: X509,
    pub leaf_key: PKey<Private>,
}

impl TestPki {
    /// PKI whose leaf is currently valid.
    pub fn new() -> Self {
        let not_before = Asn1Time::days_from_now(0).expect("Should create not_before");
        let not_after = Asn1Time::days_from_now(365).expect("Should create not_after");
        Self::with_leaf_validity(&not_before, &not_after)
    }

    /// PKI whose leaf expired in the past. CA certificates stay valid so the
    /// failure is attributable to the leaf alone.
    pub fn expired() -> Self {
        let not_before = Asn1Time::from_unix(1_577_836_800) // 2020-01-01
            .expect("Should create not_before");
        let not_after = Asn1Time::from_unix(1_609_459_200) // 2021-01-01
            .expect("Should create not_after");
        Self::with_leaf_validity(&not_before, &not_after)
    }

    fn with_leaf_validity(not_before: &Asn1Time, not_after: &Asn1Time) -> Self {
        let root_key = generate_key();
        let root = build_certificate(CertificateSpec {
            serial: 1,
            common_name: "Medsign Test Root CA",
            subject_key: &root_key,
            issuer: None,
            issuer_key: &root_key,
            is_ca: true,
            not_before: &Asn1Time::days_from_now(0).expect("Should create not_before"),
            not_after: &Asn1Time::days_from_now(3650).expect("Should create not_after"),
        });

        let intermediate_key = generate_key();
        let intermediate = build_certificate(CertificateSpec {
            serial: 2,
            common_name: "Medsign Test Issuing CA",
            subject_key: &intermediate_key,
            issuer: Some(&root),
            issuer_key: &root_key,
            is_ca: true,
            not_before: &Asn1Time::days_from_now(0).expect("Should create not_before"),
            not_after: &Asn1Time::days_from_now(1825).expect("Should create not_after"),
        });

        let leaf_key = generate_key();
        let leaf = build_certificate(CertificateSpec {
            serial: 3,
            common_name: "Dr. Ana Souza",
            subject_key: &leaf_key,
            issuer: Some(&intermediate),
            issuer_key: &intermediate_key,
            is_ca: false,
            not_before,
            not_after,
        });

        Self {
            root,
            root_key,
            intermediate,
            intermediate_key,
            leaf,
            leaf_key,
        }
    }

    /// DER PKCS#12 container with the complete chain (intermediate + root).
    pub fn container(&self, password: &str) -> Vec<u8> {
        build_container(
            &self.leaf_key,
            &self.leaf,
            &[&self.intermediate, &self.root],
            password,
        )
    }

    /// DER PKCS#12 container missing the intermediate certificate, so the
    /// chain inside cannot reach the root.
    pub fn container_without_intermediate(&self, password: &str) -> Vec<u8> {
        build_container(&self.leaf_key, &self.leaf, &[&self.root], password)
    }

    /// DER PKCS#12 container with no CA certificates at all.
    pub fn container_leaf_only(&self, password: &str) -> Vec<u8> {
        build_container(&self.leaf_key, &self.leaf, &[], password)
    }
}

struct CertificateSpec<'a> {
    serial: u32,
    common_name: &'a str,
    subject_key: &'a PKey<Private>,
    issuer: Option<&'a X509>,
    issuer_key: &'a PKey<Private>,
    is_ca: bool,
    not_before: &'a Asn1Time,
    not_after: &'a Asn1Time,
}

fn generate_key() -> PKey<Private> {
    let rsa = Rsa::generate(2048).expect("Should generate RSA key");
    PKey::from_rsa(rsa).expect("Should create PKey")
}

fn build_certificate(spec: CertificateSpec<'_>) -> X509 {
    let mut name = X509NameBuilder::new().expect("Should create name builder");
    name.append_entry_by_text("CN", spec.common_name)
        .expect("Should add CN");
    name.append_entry_by_text("O", "Medsign Test Clinic")
        .expect("Should add O");
    let name = name.build();

    let mut builder = X509Builder::new().expect("Should create X509 builder");
    builder.set_version(2).expect("Should set version");
    let serial = BigNum::from_u32(spec.serial)
        .expect("Should create serial")
        .to_asn1_integer()
        .expect("Should convert serial");
    builder
        .set_serial_number(&serial)
        .expect("Should set serial");
    builder.set_subject_name(&name).expect("Should set subject");
    match spec.issuer {
        Some(issuer) => builder
            .set_issuer_name(issuer.subject_name())
            .expect("Should set issuer"),
        None => builder.set_issuer_name(&name).expect("Should set issuer"),
    }
    builder
        .set_not_before(spec.not_before)
        .expect("Should set not_before");
    builder
        .set_not_after(spec.not_after)
        .expect("Should set not_after");
    builder
        .set_pubkey(spec.subject_key)
        .expect("Should set pubkey");

    if spec.is_ca {
        let basic = BasicConstraints::new()
            .critical()
            .ca()
            .build()
            .expect("Should build basic constraints");
        builder
            .append_extension(basic)
            .expect("Should append extension");
    }

    builder
        .sign(spec.issuer_key, MessageDigest::sha256())
        .expect("Should sign certificate");
    builder.build()
}

fn build_container(key: &PKey<Private>, leaf: &X509, chain: &[&X509], password: &str) -> Vec<u8> {
    let mut ca = Stack::new().expect("Should create stack");
    for cert in chain {
        ca.push((*cert).to_owned()).expect("Should push CA cert");
    }

    let mut builder = Pkcs12::builder();
    builder.name("medsign test container");
    builder.pkey(key);
    builder.cert(leaf);
    builder.ca(ca);
    builder
        .build2(password)
        .expect("Should build PKCS#12")
        .to_der()
        .expect("Should encode PKCS#12")
}

/// Rendered document bytes standing in for a clinical PDF.
pub fn sample_document_bytes(marker: &str) -> Vec<u8> {
    format!("%PDF-1.7 medsign test document {marker}").into_bytes()
}
