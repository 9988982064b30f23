//! Persistence contracts and the config store built on them.

mod config_store;
mod crud;
mod error;

pub use config_store::{ConfigStore, StoreTimeouts, CONFIG_COLLECTION};
pub use crud::Crud;
pub use error::StoreError;
