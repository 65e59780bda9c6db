// Session tokens for authenticated callers
pub mod jwt;

pub use jwt::{Claims, JwtService};
