pub mod audit_logs;
pub mod users;

pub use audit_logs::*;
pub use users::*;
