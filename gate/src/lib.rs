#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Admission control for a peer-to-peer virtual network overlay node.
//!
//! Three tightly coupled pieces: a rule-based frame classifier
//! ([`Filter`]), a signed trust credential ([`CertificateOfTrust`]), and a
//! bounded deferred-work queue ([`DeferredPackets`]) that keeps expensive
//! decode and verification work off the network I/O thread.

pub use gate_defer::*;
pub use gate_filter::*;
pub use gate_trust::*;
