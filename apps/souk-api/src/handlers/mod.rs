//! Handlers 模块

pub mod account;
pub mod admin;
pub mod auth;
pub mod metrics;

pub use account::*;
pub use admin::*;
pub use auth::*;
pub use metrics::*;
