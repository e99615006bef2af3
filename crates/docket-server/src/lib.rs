pub mod handlers;
pub mod rate_limit;
pub mod server;

pub use handlers::ApiError;
pub use rate_limit::{Admission, RateLimitConfig, RateLimitStore};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
