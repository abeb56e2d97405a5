use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    columns::{required_named_trip_columns, NamedColumn, REQUIRED_TRIP_COL, VALID_TRAJECTORY_COLS, VALID_TRIP_COLS, VALID_UUIDS_COLS},
    ModelError,
};

/// What a study lets its administrators see and do. Read from the
/// `admin_dashboard` block of the study config; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Permissions {
    pub overview_users: bool,
    pub overview_active_users: bool,
    pub overview_trips: bool,
    pub overview_signup_trends: bool,
    pub overview_trips_trend: bool,

    pub data_uuids: bool,
    pub data_trips: bool,
    pub data_demographics: bool,
    pub data_trajectories: bool,
    pub data_uuids_columns_exclude: Vec<String>,
    pub data_trips_columns_exclude: Vec<String>,
    pub data_trajectories_columns_exclude: Vec<String>,
    pub additional_trip_columns: Vec<NamedColumn>,

    pub token_generate: bool,
    pub token_prefix: Option<String>,

    pub push_send: bool,
    pub options_uuids: bool,
    pub options_emails: bool,

    pub map_trip_lines: bool,
    pub map_heatmap: bool,
    pub map_bubble: bool,

    pub segment_trip_time: bool,
    pub segment_trip_time_full_trips: bool,
    /// Fewer distinct users than this and a segment analysis reports nothing.
    pub segment_trip_time_min_users: usize,

    /// Users left out of every aggregate, e.g. test phones.
    pub excluded_uuids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StudyConfig {
    #[serde(default)]
    admin_dashboard: Permissions,
}

impl Permissions {
    /// Grants everything. Used when no study config is configured.
    pub fn permissive() -> Self {
        Self {
            overview_users: true,
            overview_active_users: true,
            overview_trips: true,
            overview_signup_trends: true,
            overview_trips_trend: true,
            data_uuids: true,
            data_trips: true,
            data_demographics: true,
            data_trajectories: true,
            token_generate: true,
            push_send: true,
            options_uuids: true,
            options_emails: true,
            map_trip_lines: true,
            map_heatmap: true,
            map_bubble: true,
            segment_trip_time: true,
            segment_trip_time_full_trips: true,
            ..Default::default()
        }
    }

    /// Parses a whole study config document and validates its permissions.
    pub fn from_study_config(json: &str) -> Result<Self, ModelError> {
        let config: StudyConfig = serde_json::from_str(json)
            .map_err(|err| ModelError::InvalidPermissions(err.to_string()))?;
        config.admin_dashboard.validated()
    }

    pub fn validated(self) -> Result<Self, ModelError> {
        check_columns("data_trips_columns_exclude", &self.data_trips_columns_exclude, &VALID_TRIP_COLS)?;
        check_columns("data_uuids_columns_exclude", &self.data_uuids_columns_exclude, &VALID_UUIDS_COLS)?;
        check_columns("data_trajectories_columns_exclude", &self.data_trajectories_columns_exclude, &VALID_TRAJECTORY_COLS)?;

        for column in &self.additional_trip_columns {
            if column.label.is_empty() || column.path.is_empty() {
                return Err(ModelError::InvalidPermissions(format!("additional trip column {column:?} needs a label and a path")));
            }
        }

        Ok(self)
    }

    /// Trip columns left after exclusion. `user_id` always stays.
    pub fn allowed_trip_columns(&self) -> BTreeSet<&'static str> {
        let mut columns = allowed(&VALID_TRIP_COLS, &self.data_trips_columns_exclude);
        columns.insert(REQUIRED_TRIP_COL);
        columns
    }

    pub fn allowed_uuids_columns(&self) -> BTreeSet<&'static str> {
        allowed(&VALID_UUIDS_COLS, &self.data_uuids_columns_exclude)
    }

    pub fn allowed_trajectory_columns(&self) -> BTreeSet<&'static str> {
        allowed(&VALID_TRAJECTORY_COLS, &self.data_trajectories_columns_exclude)
    }

    /// Required named columns followed by the study's additional ones.
    pub fn all_named_trip_columns(&self) -> Vec<NamedColumn> {
        let mut columns = required_named_trip_columns();
        columns.extend(self.additional_trip_columns.iter().cloned());
        columns
    }

    /// Prefix prepended to generated tokens, including the separator.
    pub fn token_prefix(&self) -> String {
        match &self.token_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_"),
            _ => String::new(),
        }
    }
}

fn check_columns(field: &str, columns: &[String], valid: &[&str]) -> Result<(), ModelError> {
    match columns.iter().find(|column| !valid.contains(&column.as_str())) {
        Some(column) => Err(ModelError::InvalidPermissions(format!("{field} names unknown column '{column}'"))),
        None => Ok(()),
    }
}

fn allowed(valid: &[&'static str], excluded: &[String]) -> BTreeSet<&'static str> {
    valid.iter()
        .copied()
        .filter(|column| !excluded.iter().any(|excluded| excluded == column))
        .collect()
}
