//! Database models split into domain-specific modules.

pub mod klient;
pub mod montaz;
pub mod user;

pub use klient::*;
pub use montaz::*;
pub use user::*;
