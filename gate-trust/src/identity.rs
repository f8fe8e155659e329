use bytes::{Buf, BufMut};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{Address, ADDRESS_LEN};

/// Identity algorithm id for ed25519 keys. The encoding is self-describing
/// so that future key types can coexist on the wire.
const ALGORITHM_ED25519: u8 = 1;

/// Error decoding an identity off the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// The buffer ended before the identity did.
    #[error("identity truncated: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the decoder needed.
        needed: usize,
        /// Bytes remaining in the buffer.
        have: usize,
    },
    /// An algorithm id this version does not know.
    #[error("unknown identity algorithm {0}")]
    UnknownAlgorithm(u8),
    /// Key bytes that do not decode to a valid public key.
    #[error("malformed public key")]
    MalformedKey,
}

/// A peer identity: an address bound to an ed25519 keypair.
///
/// The secret half is present only for identities generated locally.
/// Identities decoded off the wire, and the targets embedded in
/// certificates, carry the public key alone.
#[derive(Clone)]
pub struct Identity {
    address: Address,
    public: VerifyingKey,
    secret: Option<SigningKey>,
}

impl Identity {
    /// Generates a fresh identity with a local secret key.
    pub fn generate() -> Self {
        let secret = SigningKey::generate(&mut OsRng);
        let public = secret.verifying_key();
        Self { address: Address::from_public_key(public.as_bytes()), public, secret: Some(secret) }
    }

    /// This identity's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// This identity's public key.
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public
    }

    /// Whether the secret key is held locally.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether the address is non-reserved and actually derives from the
    /// public key.
    pub fn is_valid(&self) -> bool {
        self.address.is_valid() && self.address == Address::from_public_key(self.public.as_bytes())
    }

    /// Signs `message` with the secret key, if held.
    pub fn sign(&self, message: &[u8]) -> Option<Signature> {
        self.secret.as_ref().map(|secret| secret.sign(message))
    }

    /// A copy of this identity with the secret half stripped, as it appears
    /// on the wire.
    pub fn public_view(&self) -> Self {
        Self { address: self.address, public: self.public, secret: None }
    }

    /// Length of this identity's wire encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        ADDRESS_LEN + 1 + PUBLIC_KEY_LENGTH
    }

    /// Appends the wire encoding: address, algorithm id, public key.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.address.as_bytes());
        buf.put_u8(ALGORITHM_ED25519);
        buf.put_slice(self.public.as_bytes());
    }

    /// Decodes an identity from the front of `buf`.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, IdentityError> {
        if buf.remaining() < ADDRESS_LEN + 1 {
            return Err(IdentityError::Truncated {
                needed: ADDRESS_LEN + 1,
                have: buf.remaining(),
            });
        }

        let mut address = [0u8; ADDRESS_LEN];
        buf.copy_to_slice(&mut address);

        let algorithm = buf.get_u8();
        if algorithm != ALGORITHM_ED25519 {
            return Err(IdentityError::UnknownAlgorithm(algorithm));
        }

        if buf.remaining() < PUBLIC_KEY_LENGTH {
            return Err(IdentityError::Truncated {
                needed: PUBLIC_KEY_LENGTH,
                have: buf.remaining(),
            });
        }

        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        buf.copy_to_slice(&mut key);
        let public = VerifyingKey::from_bytes(&key).map_err(|_| IdentityError::MalformedKey)?;

        Ok(Self { address: Address::from_bytes(address), public, secret: None })
    }
}

// Key material stays out of debug output.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("has_secret", &self.secret.is_some())
            .finish_non_exhaustive()
    }
}

// Two identities are the same peer if they agree on address and public key;
// whether the secret half is held locally does not enter into it.
impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.public == other.public
    }
}

impl Eq for Identity {}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn generated_identities_are_valid() {
        let identity = Identity::generate();

        assert!(identity.is_valid());
        assert!(identity.has_secret());
        assert!(identity.address().is_valid());
    }

    #[test]
    fn encode_decode_round_trip() {
        let identity = Identity::generate();

        let mut buf = BytesMut::new();
        identity.encode(&mut buf);
        assert_eq!(buf.len(), identity.encoded_len());

        let decoded = Identity::decode(&mut buf).unwrap();
        assert_eq!(decoded, identity);
        assert!(!decoded.has_secret());
        assert!(decoded.is_valid());
    }

    #[test]
    fn decode_rejects_unknown_algorithm() {
        let identity = Identity::generate();

        let mut buf = BytesMut::new();
        identity.encode(&mut buf);
        buf[ADDRESS_LEN] = 0x7f;

        assert_eq!(
            Identity::decode(&mut buf).unwrap_err(),
            IdentityError::UnknownAlgorithm(0x7f)
        );
    }

    #[test]
    fn decode_rejects_truncation() {
        let identity = Identity::generate();

        let mut buf = BytesMut::new();
        identity.encode(&mut buf);
        buf.truncate(10);

        assert!(matches!(
            Identity::decode(&mut buf).unwrap_err(),
            IdentityError::Truncated { .. }
        ));
    }

    #[test]
    fn public_view_signs_nothing() {
        let identity = Identity::generate();

        assert!(identity.sign(b"payload").is_some());
        assert!(identity.public_view().sign(b"payload").is_none());
        assert_eq!(identity.public_view(), identity);
    }
}
