//! Domain types for attendance and the member directory boundary.

pub mod attendance;
pub mod member;

pub use attendance::{
    AttendanceRecord, AttendeeCategory, CheckInMethod, LinkStatus, NewAttendance,
};
pub use member::{non_blank, DirectoryMember, NewMember, SessionIdentity};
