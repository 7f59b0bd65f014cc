pub mod config;
pub mod error;
pub mod executor;
pub mod mock_data;
pub mod models;
pub mod modules;
pub mod money;
pub mod notify;
pub mod storage;
pub mod views;

pub use config::Config;
pub use error::PortalError;
pub use modules::Portal;
