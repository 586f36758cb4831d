//! Database models split into domain-specific modules.

pub mod quote;
pub mod user;
pub mod visit;

pub use quote::*;
pub use user::*;
pub use visit::*;
