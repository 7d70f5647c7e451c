pub mod audit_log;
pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod request_id;

pub use audit_log::*;
pub use auth::*;
pub use logging::*;
pub use rate_limit::*;
pub use request_id::*;
