//! Token authentication

mod jwt;

pub use jwt::{strip_bearer, Claims, JwtService};
