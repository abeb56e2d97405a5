use const_format::concatcp;
use openpath_lib::ModelError;

pub mod analysis;
pub mod database;
mod data_manager;
pub mod map_data;
pub mod push;
pub mod statistics;
pub mod study_config;
pub mod tokens;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "openpath.db");

#[derive(Debug, thiserror::Error)]
pub enum DataManagerError {
    #[error("database error: {0}")]
    Database(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ModelError> for DataManagerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidPermissions(_) => DataManagerError::Config(err.to_string()),
            ModelError::InvalidZone(_) | ModelError::InvalidDateRange(_) => DataManagerError::InvalidInput(err.to_string()),
        }
    }
}
