//! Handle-backed views of host-owned state. A proxy holds an identifier and a
//! channel, never data - every read or mutation is a command round-trip, and a
//! proxy outlived by its referent fails with a stale-handle error instead of
//! answering from the past.

pub mod document;
pub mod history;
pub mod layers;
