pub mod config;
pub mod fix;
pub mod issue;
pub mod store;
