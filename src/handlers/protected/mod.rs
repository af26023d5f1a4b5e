// handlers/protected/mod.rs - Protected handlers (session required)
//
// Every handler here resolves the caller through `SessionContext::require_user`
// before touching its body, so anonymous requests get a 401 ahead of any
// validation error. Update and delete additionally require ownership, which
// the recipe service enforces.

pub mod auth;
pub mod engagement;
pub mod recipes;
pub mod user;

pub use auth::*;
pub use engagement::*;
pub use recipes::*;
pub use user::*;
