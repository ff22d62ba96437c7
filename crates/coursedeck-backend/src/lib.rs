pub mod access;
pub mod config;
pub mod courses;
pub mod db;
pub mod error;
pub mod ingest;
pub mod uploads;
pub mod users;

pub use access::Actor;
pub use config::Config;
pub use db::DbPool;
pub use error::{AppError, AppResult};
