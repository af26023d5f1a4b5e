// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (session cookie required)
//
// The session middleware runs for every route and always inserts a
// `SessionContext`; the tiers only differ in whether the handler insists on
// a username.

pub mod extract;
pub mod protected;
pub mod public;
