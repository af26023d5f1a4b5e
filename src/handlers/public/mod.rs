// handlers/public/mod.rs - Public handlers (no session required)
//
// Account creation, login, and read-only recipe browsing. Handlers still see
// the resolved `SessionContext`, which registration uses to refuse callers
// that are already logged in.

pub mod auth;
pub mod recipes;

pub use auth::*;
pub use recipes::*;
