pub mod auth;
pub mod json;

pub use auth::{AdminUser, AuthSource, AuthUser};
pub use json::{JsonBody, OptionalJsonBody};
