// Event check-in API
//
// HTTP surface over the `checkin` engine: token minting for kiosk and
// printed codes, member and public check-in, and operator reconciliation.

pub mod config;
pub mod server;

pub use config::*;
