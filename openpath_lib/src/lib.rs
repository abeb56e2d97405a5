pub mod columns;
pub mod location_ping;
pub mod motion_mode;
pub mod permissions;
pub mod segment_crossing;
pub mod survey;
pub mod table;
pub mod time_range;
pub mod token;
pub mod trip;
pub mod user;
pub mod zone;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid zone: {0}")]
    InvalidZone(String),
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("invalid permissions: {0}")]
    InvalidPermissions(String),
}
