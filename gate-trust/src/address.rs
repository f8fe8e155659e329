use std::fmt;

use sha2::{Digest, Sha512};

/// Width of a peer address on the wire, in bytes.
pub const ADDRESS_LEN: usize = 5;

/// A fixed-width overlay peer address.
///
/// Addresses are derived from an identity's public signing key (the
/// trailing bytes of its SHA-512 digest), so an address commits to a key
/// without carrying it. The all-zero address is reserved and never names a
/// peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Derives the address for a public signing key.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha512::digest(public_key);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Self(bytes)
    }

    /// Wraps raw address bytes, as read off the wire.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Whether this address can name a peer. The all-zero address cannot.
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_stable() {
        let key = [7u8; 32];

        assert_eq!(Address::from_public_key(&key), Address::from_public_key(&key));
        assert_ne!(Address::from_public_key(&key), Address::from_public_key(&[8u8; 32]));
    }

    #[test]
    fn zero_address_is_invalid() {
        assert!(!Address::from_bytes([0; ADDRESS_LEN]).is_valid());
        assert!(Address::from_bytes([0, 0, 0, 0, 1]).is_valid());
    }

    #[test]
    fn displays_as_ten_hex_chars() {
        let addr = Address::from_bytes([0xde, 0xad, 0xbe, 0xef, 0x01]);
        assert_eq!(addr.to_string(), "deadbeef01");
    }
}
