pub mod credentials_service;
pub mod record_patcher;

pub use credentials_service::*;
pub use record_patcher::*;
