//! Column names of the tables shown to administrators. Paths are dotted
//! addresses into the stored documents.

use serde::{Deserialize, Serialize};

/// A column shown under `label`, read from `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub label: String,
    pub path: String,
}

pub const REQUIRED_NAMED_TRIP_COLS: [(&str, &str); 4] = [
    ("trip_start_time_str", "data.start_fmt_time"),
    ("trip_end_time_str", "data.end_fmt_time"),
    ("start_coordinates", "data.start_loc.coordinates"),
    ("end_coordinates", "data.end_loc.coordinates"),
];

pub const MULTILABEL_NAMED_TRIP_COLS: [(&str, &str); 3] = [
    ("mode_confirm", "data.user_input.mode_confirm"),
    ("purpose_confirm", "data.user_input.purpose_confirm"),
    ("replaced_mode", "data.user_input.replaced_mode"),
];

/// Trip column that exclusion never removes.
pub const REQUIRED_TRIP_COL: &str = "user_id";

pub const VALID_TRIP_COLS: [&str; 10] = [
    "data.start_ts",
    "data.start_local_dt.timezone",
    "data.start_fmt_time",
    "data.end_ts",
    "data.end_fmt_time",
    "data.duration",
    "data.distance",
    "data.start_loc.coordinates",
    "data.end_loc.coordinates",
    "user_id",
];

pub const VALID_UUIDS_COLS: [&str; 13] = [
    "user_token",
    "user_id",
    "update_ts",
    "total_trips",
    "labeled_trips",
    "first_trip",
    "last_trip",
    "last_call",
    "platform",
    "manufacturer",
    "app_version",
    "os_version",
    "phone_lang",
];

pub const VALID_TRAJECTORY_COLS: [&str; 8] = [
    "user_id",
    "data.section",
    "data.ts",
    "data.fmt_time",
    "data.idx",
    "data.mode",
    "data.latitude",
    "data.longitude",
];

/// Survey-tool bookkeeping that never reaches the demographics table. Matched
/// against the full path and against its last segment.
pub const EXCLUDED_DEMOGRAPHICS_COLS: [&str; 15] = [
    "data.xmlResponse",
    "data.name",
    "data.version",
    "data.label",
    "xmlns:jr",
    "xmlns:orx",
    "id",
    "start",
    "end",
    "attrxmlns:jr",
    "attrxmlns:orx",
    "attrid",
    "__version__",
    "attrversion",
    "instanceID",
];

pub fn required_named_trip_columns() -> Vec<NamedColumn> {
    REQUIRED_NAMED_TRIP_COLS
        .iter()
        .map(|(label, path)| NamedColumn { label: label.to_string(), path: path.to_string() })
        .collect()
}
