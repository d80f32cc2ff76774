//! CLI command implementations.

pub mod inspect;
pub mod kv;
pub mod serve;
pub mod verify;
