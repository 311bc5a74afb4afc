pub mod auth;
pub mod blob;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod license;
pub mod stats;
pub mod storage;
pub mod update;
pub mod version;

pub use config::HubConfig;
pub use error::{HubError, Result};
pub use storage::Storage;
