//! Common utilities shared across uplift crates.

pub mod dirs;
pub mod http_client;

pub use dirs::{AppDirs, get_app_dirs};
pub use http_client::{
    CONNECT_TIMEOUT, DEFAULT_TIMEOUT, USER_AGENT, create_client_builder,
    create_client_with_timeout, create_default_client,
};
