pub mod backend;
pub mod db;
pub mod error;
pub mod events;
pub mod jobs;
pub mod log;
pub mod material;
pub mod schemas;
pub mod store;
pub mod time;
