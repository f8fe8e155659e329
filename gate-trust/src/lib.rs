//! Signed trust credentials between overlay peers.
//!
//! A [`CertificateOfTrust`] is a fixed-shape credential in which an issuer
//! vouches for a target's role on the network, signed with the issuer's
//! ed25519 key. Verification needs the issuer's public identity, which may
//! not be known locally yet: in that case verification kicks off a
//! fire-and-forget discovery request through the [`PeerDirectory`] seam and
//! tells the caller to retry later. Nothing in this crate blocks.

mod address;
mod certificate;
mod directory;
mod identity;

pub use address::{Address, ADDRESS_LEN};
pub use certificate::{
    CertificateOfTrust, TrustError, TrustLevel, Verification, WireError, ROLE_UPSTREAM,
};
pub use directory::{MemoryDirectory, PeerDirectory};
pub use identity::{Identity, IdentityError};
