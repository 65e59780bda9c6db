//! Storage and directory abstractions.

pub mod directory;
pub mod store;

pub use directory::MemberDirectory;
pub use store::{AttendanceStore, CheckInStore};
