pub const USERS_TABLE_NAME: &str = "Users";
pub const USER_ID: &str = "user_id";
pub const USER_TOKEN: &str = "user_token";
pub const UPDATE_TS: &str = "update_ts";
pub const TOTAL_TRIPS: &str = "total_trips";
pub const LABELED_TRIPS: &str = "labeled_trips";
pub const FIRST_TRIP: &str = "first_trip";
pub const LAST_TRIP: &str = "last_trip";
pub const LAST_CALL: &str = "last_call";
pub const PLATFORM: &str = "platform";
pub const MANUFACTURER: &str = "manufacturer";
pub const APP_VERSION: &str = "app_version";
pub const OS_VERSION: &str = "os_version";
pub const PHONE_LANG: &str = "phone_lang";

pub const CONFIRMED_TRIPS_TABLE_NAME: &str = "ConfirmedTrips";
pub const TRIP_ID: &str = "trip_id";
// User id
pub const START_TS: &str = "start_ts";
pub const END_TS: &str = "end_ts";
pub const START_FMT_TIME: &str = "start_fmt_time";
pub const END_FMT_TIME: &str = "end_fmt_time";
pub const TIMEZONE: &str = "timezone";
pub const START_LON: &str = "start_lon";
pub const START_LAT: &str = "start_lat";
pub const END_LON: &str = "end_lon";
pub const END_LAT: &str = "end_lat";
pub const DISTANCE: &str = "distance";
pub const DURATION: &str = "duration";
pub const MODE_CONFIRM: &str = "mode_confirm";
pub const PURPOSE_CONFIRM: &str = "purpose_confirm";
pub const REPLACED_MODE: &str = "replaced_mode";

pub const RECREATED_LOCATIONS_TABLE_NAME: &str = "RecreatedLocations";
pub const LOCATION_ID: &str = "location_id";
pub const SECTION_ID: &str = "section_id";
// User id
pub const TS: &str = "ts";
pub const FMT_TIME: &str = "fmt_time";
pub const LONGITUDE: &str = "longitude";
pub const LATITUDE: &str = "latitude";
pub const IDX: &str = "idx";
pub const MODE: &str = "mode";

pub const SURVEY_RESPONSES_TABLE_NAME: &str = "SurveyResponses";
pub const RESPONSE_ID: &str = "response_id";
// User id, ts
pub const RESPONSE: &str = "response";

pub const TOKENS_TABLE_NAME: &str = "Tokens";
pub const TOKEN: &str = "token";
pub const CREATED_AT: &str = "created_at";
