pub mod rate_limit;
pub mod response;
pub mod session;

pub use rate_limit::{recipe_rate_limit, SlidingWindowLimiter};
pub use response::{ApiResponse, ApiResult};
pub use session::{session_middleware, SessionContext};
