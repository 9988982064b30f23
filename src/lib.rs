pub mod controller;
pub mod db;
pub mod server;
pub mod store;
pub mod types;
