//! Connection handshake authentication.

pub mod gate;

pub use gate::{AuthGate, Identity};
