pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod local_center;
pub mod model;
pub mod output;
pub mod paths;
pub mod scheduler;
pub mod store;
pub mod templates;
