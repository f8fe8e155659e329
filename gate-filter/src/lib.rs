//! Rule-based classification of Ethernet frames crossing the virtual
//! network boundary.
//!
//! A [`Filter`] is an ordered deny list of [`Rule`]s. Each rule is built
//! from three [`Range`]s (ether type, IP protocol, port) and matches a
//! frame by walking its IPv4 or IPv6 headers byte by byte. The caller's
//! policy is "match implies drop, no match implies allow".
//!
//! Filters are constructed once (programmatically or from the
//! `ether;proto;port` text form) and are read-only afterwards, so a
//! published filter can be shared across worker threads without locking.

pub mod headers;
mod range;
mod rule;

mod filter;

pub use filter::Filter;
pub use range::Range;
pub use rule::{MatchError, ParseError, Rule};
