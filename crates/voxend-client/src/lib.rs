//! Headless client session core: the receiving half of the protocol,
//! applying world state into a shared block map.

pub mod session;

pub use session::{ClientSession, Control, WorldParams};
