use bytes::{Buf, BufMut, Bytes, BytesMut};
use ed25519_dalek::{Signature, Verifier, SIGNATURE_LENGTH};
use thiserror::Error;

use crate::{Address, Identity, IdentityError, PeerDirectory, ADDRESS_LEN};

/// Role bit: the issuer permits the target to act as a federated relay on
/// the issuer's behalf.
pub const ROLE_UPSTREAM: u64 = 1 << 0;

/// Signature algorithm id for ed25519, the only one currently defined.
const SIGNATURE_ALGORITHM_ED25519: u8 = 1;

/// How much authority a certificate grants its target.
///
/// Levels are ordered; callers gate operations on `level >= threshold`.
/// Which operations map to which threshold is the surrounding node's
/// business, not this crate's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TrustLevel {
    /// Actively distrusted.
    Negative = 0,
    /// No particular trust either way.
    Default = 1,
    /// Moderately trusted.
    Medium = 25,
    /// Highly trusted.
    High = 50,
    /// Unconditionally trusted.
    Ultimate = 100,
}

impl TryFrom<u16> for TrustLevel {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Negative),
            1 => Ok(Self::Default),
            25 => Ok(Self::Medium),
            50 => Ok(Self::High),
            100 => Ok(Self::Ultimate),
            other => Err(other),
        }
    }
}

/// Error creating a certificate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrustError {
    /// The issuer identity is reserved or its address does not match its
    /// key.
    #[error("issuer identity is not valid")]
    InvalidIssuer,
    /// The issuer identity has no secret key to sign with.
    #[error("issuer identity has no secret key")]
    MissingSecretKey,
}

/// Error decoding a certificate off the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before the certificate did.
    #[error("certificate truncated")]
    Truncated,
    /// A signature algorithm id this version does not know.
    #[error("unknown signature algorithm {0}")]
    UnknownSignatureAlgorithm(u8),
    /// A signature whose length does not fit its declared algorithm.
    #[error("signature length {0} does not fit the declared algorithm")]
    SignatureLength(u16),
    /// A trust level discriminant this version does not know.
    #[error("unknown trust level {0}")]
    UnknownTrustLevel(u16),
    /// The embedded target identity could not be decoded.
    #[error("target identity: {0}")]
    Identity(#[from] IdentityError),
}

/// Outcome of certificate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature checks out against the issuer's known public key.
    Ok,
    /// The issuer is not in the peer directory. A discovery request has
    /// been fired off; retry once the directory has caught up.
    PendingIssuerLookup,
    /// The signature does not verify; treat the certificate as forged.
    BadSignature,
}

/// A signed credential: `issuer` vouches that `target` holds `roles` at
/// `level`, as of `timestamp_ms`.
///
/// Certificates are immutable once created. Superseding an older
/// certificate from the same issuer is done by issuing a newer one and
/// comparing timestamps at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateOfTrust {
    timestamp_ms: u64,
    roles: u64,
    issuer: Address,
    target: Identity,
    level: TrustLevel,
    signature: Signature,
}

impl CertificateOfTrust {
    /// Creates and signs a certificate. The issuer must be a valid identity
    /// holding its secret key; the target's secret half, if any, is
    /// stripped before embedding.
    pub fn create(
        timestamp_ms: u64,
        roles: u64,
        issuer: &Identity,
        target: &Identity,
        level: TrustLevel,
    ) -> Result<Self, TrustError> {
        if !issuer.is_valid() {
            return Err(TrustError::InvalidIssuer);
        }

        let target = target.public_view();
        let signed = signing_buffer(timestamp_ms, roles, issuer.address(), &target, level);
        let signature = issuer.sign(&signed).ok_or(TrustError::MissingSecretKey)?;

        Ok(Self { timestamp_ms, roles, issuer: issuer.address(), target, level, signature })
    }

    /// Checks the signature against the issuer's public identity.
    ///
    /// Never blocks and never mutates the certificate. If the issuer is not
    /// known locally, a single fire-and-forget discovery request is issued
    /// through `directory` and the caller is told to retry later.
    pub fn verify<D: PeerDirectory + ?Sized>(&self, directory: &D) -> Verification {
        let Some(issuer) = directory.resolve_identity(self.issuer) else {
            tracing::debug!("certificate issuer {} unknown, requesting discovery", self.issuer);
            directory.request_discovery(self.issuer);
            return Verification::PendingIssuerLookup;
        };

        let signed =
            signing_buffer(self.timestamp_ms, self.roles, self.issuer, &self.target, self.level);
        match issuer.public_key().verify(&signed, &self.signature) {
            Ok(()) => Verification::Ok,
            Err(_) => {
                tracing::warn!("bad certificate signature from issuer {}", self.issuer);
                Verification::BadSignature
            }
        }
    }

    /// Issuance time, milliseconds since the UNIX epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// The raw role bitmap.
    pub fn roles(&self) -> u64 {
        self.roles
    }

    /// Whether the issuer permits the target to relay upstream on its
    /// behalf.
    pub fn role_upstream(&self) -> bool {
        self.roles & ROLE_UPSTREAM != 0
    }

    /// The issuer's address.
    pub fn issuer(&self) -> Address {
        self.issuer
    }

    /// The target identity (public half only).
    pub fn target(&self) -> &Identity {
        &self.target
    }

    /// The granted trust level.
    pub fn level(&self) -> TrustLevel {
        self.level
    }

    /// Appends the wire encoding.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.timestamp_ms);
        buf.put_u64(self.roles);
        buf.put_slice(self.issuer.as_bytes());
        self.target.encode(buf);
        buf.put_u16(self.level as u16);
        buf.put_u8(SIGNATURE_ALGORITHM_ED25519);
        buf.put_u16(SIGNATURE_LENGTH as u16);
        buf.put_slice(&self.signature.to_bytes());
        // Additional fields, reserved. Decoders skip what they don't know.
        buf.put_u16(0);
    }

    /// Decodes a certificate from the front of `buf`.
    ///
    /// Trailing additional fields declared by the final length prefix are
    /// skipped, not rejected, so newer certificates still decode.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        if buf.remaining() < 8 + 8 + ADDRESS_LEN {
            return Err(WireError::Truncated);
        }
        let timestamp_ms = buf.get_u64();
        let roles = buf.get_u64();
        let mut issuer = [0u8; ADDRESS_LEN];
        buf.copy_to_slice(&mut issuer);

        let target = Identity::decode(buf)?;

        if buf.remaining() < 2 + 1 + 2 {
            return Err(WireError::Truncated);
        }
        let level_raw = buf.get_u16();
        let level = TrustLevel::try_from(level_raw).map_err(WireError::UnknownTrustLevel)?;

        let algorithm = buf.get_u8();
        if algorithm != SIGNATURE_ALGORITHM_ED25519 {
            return Err(WireError::UnknownSignatureAlgorithm(algorithm));
        }
        let signature_len = buf.get_u16();
        if usize::from(signature_len) != SIGNATURE_LENGTH {
            return Err(WireError::SignatureLength(signature_len));
        }
        if buf.remaining() < SIGNATURE_LENGTH {
            return Err(WireError::Truncated);
        }
        let mut signature = [0u8; SIGNATURE_LENGTH];
        buf.copy_to_slice(&mut signature);

        if buf.remaining() < 2 {
            return Err(WireError::Truncated);
        }
        let additional = usize::from(buf.get_u16());
        if buf.remaining() < additional {
            return Err(WireError::Truncated);
        }
        buf.advance(additional);

        Ok(Self {
            timestamp_ms,
            roles,
            issuer: Address::from_bytes(issuer),
            target,
            level,
            signature: Signature::from_bytes(&signature),
        })
    }
}

/// The canonical byte buffer covered by the signature.
fn signing_buffer(
    timestamp_ms: u64,
    roles: u64,
    issuer: Address,
    target: &Identity,
    level: TrustLevel,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(8 + 8 + ADDRESS_LEN + target.encoded_len() + 2);
    buf.put_u64(timestamp_ms);
    buf.put_u64(roles);
    buf.put_slice(issuer.as_bytes());
    target.encode(&mut buf);
    buf.put_u16(level as u16);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::MemoryDirectory;

    fn certificate(issuer: &Identity, target: &Identity) -> CertificateOfTrust {
        CertificateOfTrust::create(1_700_000_000_000, ROLE_UPSTREAM, issuer, target, TrustLevel::High)
            .unwrap()
    }

    #[test]
    fn create_requires_a_secret_key() {
        let issuer = Identity::generate();
        let target = Identity::generate();

        assert_eq!(
            CertificateOfTrust::create(
                0,
                0,
                &issuer.public_view(),
                &target,
                TrustLevel::Default
            )
            .unwrap_err(),
            TrustError::MissingSecretKey
        );
    }

    #[test]
    fn create_rejects_an_invalid_issuer() {
        let issuer = Identity::generate();
        let target = Identity::generate();

        // An identity whose address does not derive from its key.
        let mut buf = BytesMut::new();
        issuer.encode(&mut buf);
        buf[0] ^= 0xff;
        let forged = Identity::decode(&mut buf).unwrap();
        assert!(!forged.is_valid());

        assert_eq!(
            CertificateOfTrust::create(0, 0, &forged, &target, TrustLevel::Default).unwrap_err(),
            TrustError::InvalidIssuer
        );
    }

    #[test]
    fn verify_against_known_issuer() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let directory = MemoryDirectory::new();
        directory.insert(issuer.public_view());

        assert_eq!(cert.verify(&directory), Verification::Ok);
        assert!(directory.discovery_requests().is_empty());
    }

    #[test]
    fn verify_against_wrong_key_is_bad_signature() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        // A directory that maps the issuer's address to someone else's key.
        let directory = MemoryDirectory::new();
        directory.insert_at(cert.issuer(), Identity::generate().public_view());

        assert_eq!(cert.verify(&directory), Verification::BadSignature);
    }

    #[test]
    fn verify_against_empty_directory_requests_discovery_once() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let directory = MemoryDirectory::new();

        assert_eq!(cert.verify(&directory), Verification::PendingIssuerLookup);
        assert_eq!(directory.discovery_requests(), vec![cert.issuer()]);
    }

    #[test]
    fn tampering_breaks_the_signature() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let directory = MemoryDirectory::new();
        directory.insert(issuer.public_view());

        let mut buf = BytesMut::new();
        cert.encode(&mut buf);
        buf[0] ^= 0x01; // bend the timestamp

        let tampered = CertificateOfTrust::decode(&mut buf).unwrap();
        assert_eq!(tampered.verify(&directory), Verification::BadSignature);
    }

    #[test]
    fn roles_are_a_bitmap() {
        let issuer = Identity::generate();
        let target = Identity::generate();

        let cert = certificate(&issuer, &target);
        assert!(cert.role_upstream());

        let cert =
            CertificateOfTrust::create(0, 0, &issuer, &target, TrustLevel::Default).unwrap();
        assert!(!cert.role_upstream());
    }

    #[test]
    fn levels_are_ordered() {
        assert!(TrustLevel::Negative < TrustLevel::Default);
        assert!(TrustLevel::Default < TrustLevel::Medium);
        assert!(TrustLevel::Medium < TrustLevel::High);
        assert!(TrustLevel::High < TrustLevel::Ultimate);
        assert_eq!(TrustLevel::try_from(25), Ok(TrustLevel::Medium));
        assert_eq!(TrustLevel::try_from(26), Err(26));
    }

    #[test]
    fn wire_round_trip() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let mut buf = BytesMut::new();
        cert.encode(&mut buf);

        let decoded = CertificateOfTrust::decode(&mut buf).unwrap();
        assert_eq!(decoded, cert);
        assert!(!buf.has_remaining());

        // And the decoded copy still verifies.
        let directory = MemoryDirectory::new();
        directory.insert(issuer.public_view());
        assert_eq!(decoded.verify(&directory), Verification::Ok);
    }

    #[test]
    fn decode_skips_unknown_additional_fields() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let mut buf = BytesMut::new();
        cert.encode(&mut buf);
        // Rewrite the trailing additional-fields block with 4 unknown bytes.
        let len = buf.len();
        buf[len - 2..].copy_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);

        let decoded = CertificateOfTrust::decode(&mut buf).unwrap();
        assert_eq!(decoded, cert);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn decode_rejects_unknown_signature_algorithm() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let mut buf = BytesMut::new();
        cert.encode(&mut buf);
        // The algorithm byte sits right after the fixed head, the target
        // identity, and the level.
        let offset = 8 + 8 + ADDRESS_LEN + cert.target().encoded_len() + 2;
        buf[offset] = 9;

        assert_eq!(
            CertificateOfTrust::decode(&mut buf).unwrap_err(),
            WireError::UnknownSignatureAlgorithm(9)
        );
    }

    #[test]
    fn decode_rejects_truncation() {
        let issuer = Identity::generate();
        let target = Identity::generate();
        let cert = certificate(&issuer, &target);

        let mut buf = BytesMut::new();
        cert.encode(&mut buf);
        buf.truncate(30);

        assert!(CertificateOfTrust::decode(&mut buf).is_err());
    }
}
