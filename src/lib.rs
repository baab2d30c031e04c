//! `nullzone` is a LAN-facing DNS resolver front-end.
//!
//! Queries for domains on operator-curated blocklists are answered with a
//! sink address; everything else is stub-forwarded to configured upstream
//! resolvers and cached. The management/dashboard surface consumes the
//! [`engine::BlocklistAdmin`] capability and the [`observer`] traits; it
//! never needs the resolver's concrete types.

pub mod cache;
pub mod config;
pub mod engine;
pub mod observer;
pub mod server;
pub mod stats;
pub mod upstream;
