//! Public facade over `actomaton-core`.
//!
//! Splits the behavior crate from its (future) wire types the way the
//! teacher splits `xeno-broker-proto` from `xeno-broker`: this crate is
//! the one application code depends on, so the core can gain internal
//! modules without ever breaking this surface.

#![warn(missing_docs)]

pub use actomaton_core::*;
