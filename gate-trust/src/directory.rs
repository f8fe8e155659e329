use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{Address, Identity};

/// Read side of the node's peer store, as certificate verification sees it.
///
/// `request_discovery` is fire-and-forget: implementations kick off an
/// asynchronous WHOIS-style lookup for the address and return immediately.
/// Verification retries later once the directory has caught up.
pub trait PeerDirectory {
    /// Looks up a peer's full public identity by address.
    fn resolve_identity(&self, address: Address) -> Option<Identity>;

    /// Requests an asynchronous discovery of the given address.
    fn request_discovery(&self, address: Address);
}

/// In-memory [`PeerDirectory`].
///
/// Discovery requests are recorded rather than acted on, which is what
/// tests and tooling want; a real node wires `request_discovery` into its
/// discovery protocol instead.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    peers: RwLock<FxHashMap<Address, Identity>>,
    discoveries: RwLock<Vec<Address>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity under its own address. The secret half, if
    /// present, is stripped.
    pub fn insert(&self, identity: Identity) {
        self.insert_at(identity.address(), identity);
    }

    /// Registers an identity under an arbitrary address.
    pub fn insert_at(&self, address: Address, identity: Identity) {
        self.peers.write().insert(address, identity.public_view());
    }

    /// The addresses discovery has been requested for, in request order.
    pub fn discovery_requests(&self) -> Vec<Address> {
        self.discoveries.read().clone()
    }
}

impl PeerDirectory for MemoryDirectory {
    fn resolve_identity(&self, address: Address) -> Option<Identity> {
        self.peers.read().get(&address).cloned()
    }

    fn request_discovery(&self, address: Address) {
        tracing::debug!("discovery requested for {}", address);
        self.discoveries.write().push(address);
    }
}
