use std::{path::Path, str::FromStr};

use const_format::concatcp;
use openpath_lib::{
    location_ping::LocationPing, survey::SurveyResponse, time_range::TimeRange, token::Token, trip::ConfirmedTrip,
    user::UserEntry,
};
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, Pool, Sqlite, SqlitePool,
};

use crate::DataManagerError;

use super::constants::*;

/// SQLite store holding the collections the dashboard reads.
#[derive(Clone)]
pub struct AdminDatabase {
    pool: Pool<Sqlite>,
}

impl AdminDatabase {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {path:?}: {err}")))?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// A private in-memory database, gone when the pool is dropped.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| DataManagerError::Database(format!("Invalid in-memory options: {err}")))?;

        // A single connection that never expires keeps the memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to open in-memory database: {err}")))?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", USERS_TABLE_NAME, "(",
                USER_ID,       " TEXT PRIMARY KEY,",
                USER_TOKEN,    " TEXT NOT NULL,",
                UPDATE_TS,     " INTEGER NOT NULL,",
                TOTAL_TRIPS,   " INTEGER NOT NULL DEFAULT 0,",
                LABELED_TRIPS, " INTEGER NOT NULL DEFAULT 0,",
                FIRST_TRIP,    " INTEGER,",
                LAST_TRIP,     " INTEGER,",
                LAST_CALL,     " INTEGER,",
                PLATFORM,      " TEXT,",
                MANUFACTURER,  " TEXT,",
                APP_VERSION,   " TEXT,",
                OS_VERSION,    " TEXT,",
                PHONE_LANG,    " TEXT);

            CREATE TABLE IF NOT EXISTS ", CONFIRMED_TRIPS_TABLE_NAME, "(",
                TRIP_ID,         " INTEGER PRIMARY KEY AUTOINCREMENT,",
                USER_ID,         " TEXT NOT NULL,",
                START_TS,        " INTEGER NOT NULL,",
                END_TS,          " INTEGER NOT NULL,",
                START_FMT_TIME,  " TEXT NOT NULL,",
                END_FMT_TIME,    " TEXT NOT NULL,",
                TIMEZONE,        " TEXT NOT NULL,",
                START_LON,       " REAL NOT NULL,",
                START_LAT,       " REAL NOT NULL,",
                END_LON,         " REAL NOT NULL,",
                END_LAT,         " REAL NOT NULL,",
                DISTANCE,        " REAL NOT NULL,",
                DURATION,        " REAL NOT NULL,",
                MODE_CONFIRM,    " TEXT,",
                PURPOSE_CONFIRM, " TEXT,",
                REPLACED_MODE,   " TEXT);

            CREATE INDEX IF NOT EXISTS idx_trips_start_ts ON ", CONFIRMED_TRIPS_TABLE_NAME, "(", START_TS, ");

            CREATE TABLE IF NOT EXISTS ", RECREATED_LOCATIONS_TABLE_NAME, "(",
                LOCATION_ID, " INTEGER PRIMARY KEY AUTOINCREMENT,",
                SECTION_ID,  " TEXT NOT NULL,",
                USER_ID,     " TEXT NOT NULL,",
                TS,          " INTEGER NOT NULL,",
                FMT_TIME,    " TEXT NOT NULL,",
                LONGITUDE,   " REAL NOT NULL,",
                LATITUDE,    " REAL NOT NULL,",
                IDX,         " INTEGER NOT NULL,",
                MODE,        " INTEGER NOT NULL);

            CREATE INDEX IF NOT EXISTS idx_locations_ts ON ", RECREATED_LOCATIONS_TABLE_NAME, "(", TS, ");
            CREATE INDEX IF NOT EXISTS idx_locations_lat_lon ON ", RECREATED_LOCATIONS_TABLE_NAME, "(", LATITUDE, ", ", LONGITUDE, ");

            CREATE TABLE IF NOT EXISTS ", SURVEY_RESPONSES_TABLE_NAME, "(",
                RESPONSE_ID, " INTEGER PRIMARY KEY AUTOINCREMENT,",
                USER_ID,     " TEXT NOT NULL,",
                TS,          " INTEGER NOT NULL,",
                RESPONSE,    " TEXT NOT NULL);

            CREATE TABLE IF NOT EXISTS ", TOKENS_TABLE_NAME, "(",
                TOKEN,      " TEXT PRIMARY KEY,",
                CREATED_AT, " INTEGER NOT NULL)"))
            .await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {err}")))
            .map(|_| ())
    }

    pub async fn insert_users(&self, users: &[UserEntry]) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await
            .map_err(|err| DataManagerError::Database(format!("Failed to begin transaction: {err}")))?;

        for user in users {
            query(concatcp!("
                INSERT OR REPLACE INTO ", USERS_TABLE_NAME, "(",
                USER_ID, ", ", USER_TOKEN, ", ", UPDATE_TS, ", ", TOTAL_TRIPS, ", ", LABELED_TRIPS, ", ",
                FIRST_TRIP, ", ", LAST_TRIP, ", ", LAST_CALL, ", ", PLATFORM, ", ", MANUFACTURER, ", ",
                APP_VERSION, ", ", OS_VERSION, ", ", PHONE_LANG, ")
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"))
                .bind(&user.user_id)
                .bind(&user.user_token)
                .bind(user.update_ts.timestamp_millis())
                .bind(user.total_trips)
                .bind(user.labeled_trips)
                .bind(user.first_trip.map(|ts| ts.timestamp_millis()))
                .bind(user.last_trip.map(|ts| ts.timestamp_millis()))
                .bind(user.last_call.map(|ts| ts.timestamp_millis()))
                .bind(&user.platform)
                .bind(&user.manufacturer)
                .bind(&user.app_version)
                .bind(&user.os_version)
                .bind(&user.phone_lang)
                .execute(&mut *tx).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert user {}: {err}", user.user_id)))?;
        }

        tx.commit().await
            .map_err(|err| DataManagerError::Database(format!("Failed to commit users: {err}")))
    }

    pub async fn get_users(&self) -> Result<Vec<UserEntry>, DataManagerError> {
        query_as::<_, UserEntry>(concatcp!("SELECT * FROM ", USERS_TABLE_NAME, " ORDER BY ", UPDATE_TS, ", ", USER_ID))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get users: {err}")))
    }

    pub async fn get_users_updated_in(&self, range: &TimeRange) -> Result<Vec<UserEntry>, DataManagerError> {
        let (start, end) = range.millis();
        query_as::<_, UserEntry>(concatcp!("
            SELECT * FROM ", USERS_TABLE_NAME, "
            WHERE ", UPDATE_TS, " >= ?1 AND ", UPDATE_TS, " <= ?2
            ORDER BY ", UPDATE_TS, ", ", USER_ID))
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get users: {err}")))
    }

    pub async fn insert_trips(&self, trips: &[ConfirmedTrip]) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await
            .map_err(|err| DataManagerError::Database(format!("Failed to begin transaction: {err}")))?;

        for trip in trips {
            query(concatcp!("
                INSERT INTO ", CONFIRMED_TRIPS_TABLE_NAME, "(",
                TRIP_ID, ", ", USER_ID, ", ", START_TS, ", ", END_TS, ", ", START_FMT_TIME, ", ", END_FMT_TIME, ", ",
                TIMEZONE, ", ", START_LON, ", ", START_LAT, ", ", END_LON, ", ", END_LAT, ", ", DISTANCE, ", ",
                DURATION, ", ", MODE_CONFIRM, ", ", PURPOSE_CONFIRM, ", ", REPLACED_MODE, ")
                VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"))
                .bind(&trip.user_id)
                .bind(trip.start_ts.timestamp_millis())
                .bind(trip.end_ts.timestamp_millis())
                .bind(&trip.start_fmt_time)
                .bind(&trip.end_fmt_time)
                .bind(&trip.timezone)
                .bind(trip.start_coordinates[0])
                .bind(trip.start_coordinates[1])
                .bind(trip.end_coordinates[0])
                .bind(trip.end_coordinates[1])
                .bind(trip.distance)
                .bind(trip.duration)
                .bind(&trip.mode_confirm)
                .bind(&trip.purpose_confirm)
                .bind(&trip.replaced_mode)
                .execute(&mut *tx).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert trip: {err}")))?;
        }

        tx.commit().await
            .map_err(|err| DataManagerError::Database(format!("Failed to commit trips: {err}")))
    }

    pub async fn get_trips_in(&self, range: &TimeRange) -> Result<Vec<ConfirmedTrip>, DataManagerError> {
        let (start, end) = range.millis();
        query_as::<_, ConfirmedTrip>(concatcp!("
            SELECT * FROM ", CONFIRMED_TRIPS_TABLE_NAME, "
            WHERE ", START_TS, " >= ?1 AND ", START_TS, " <= ?2
            ORDER BY ", START_TS, ", ", TRIP_ID))
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get trips: {err}")))
    }

    pub async fn insert_locations(&self, pings: &[LocationPing]) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await
            .map_err(|err| DataManagerError::Database(format!("Failed to begin transaction: {err}")))?;

        for ping in pings {
            query(concatcp!("
                INSERT INTO ", RECREATED_LOCATIONS_TABLE_NAME, "(",
                LOCATION_ID, ", ", SECTION_ID, ", ", USER_ID, ", ", TS, ", ", FMT_TIME, ", ",
                LONGITUDE, ", ", LATITUDE, ", ", IDX, ", ", MODE, ")
                VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"))
                .bind(&ping.section_id)
                .bind(&ping.user_id)
                .bind(ping.timestamp.timestamp_millis())
                .bind(&ping.fmt_time)
                .bind(ping.longitude)
                .bind(ping.latitude)
                .bind(ping.idx)
                .bind(ping.mode.code())
                .execute(&mut *tx).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert location: {err}")))?;
        }

        tx.commit().await
            .map_err(|err| DataManagerError::Database(format!("Failed to commit locations: {err}")))
    }

    /// Pings inside a lon/lat box and time range, in storage order. The box
    /// spans either of two longitude intervals so it can cross ±180°.
    pub async fn get_locations_in_box(
        &self,
        range: &TimeRange,
        longitudes: [(f64, f64); 2],
        min_lat: f64,
        max_lat: f64,
    ) -> Result<Vec<LocationPing>, DataManagerError> {
        let (start, end) = range.millis();
        let [(west_min, west_max), (east_min, east_max)] = longitudes;
        query_as::<_, LocationPing>(concatcp!("
            SELECT * FROM ", RECREATED_LOCATIONS_TABLE_NAME, "
            WHERE ", TS, " >= ?1 AND ", TS, " <= ?2
              AND (", LONGITUDE, " BETWEEN ?3 AND ?4 OR ", LONGITUDE, " BETWEEN ?5 AND ?6)
              AND ", LATITUDE, " BETWEEN ?7 AND ?8
            ORDER BY ", LOCATION_ID))
            .bind(start)
            .bind(end)
            .bind(west_min)
            .bind(west_max)
            .bind(east_min)
            .bind(east_max)
            .bind(min_lat)
            .bind(max_lat)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get locations: {err}")))
    }

    pub async fn get_locations_in(&self, range: &TimeRange) -> Result<Vec<LocationPing>, DataManagerError> {
        let (start, end) = range.millis();
        query_as::<_, LocationPing>(concatcp!("
            SELECT * FROM ", RECREATED_LOCATIONS_TABLE_NAME, "
            WHERE ", TS, " >= ?1 AND ", TS, " <= ?2
            ORDER BY ", TS, ", ", LOCATION_ID))
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get locations: {err}")))
    }

    pub async fn insert_survey_responses(&self, responses: &[SurveyResponse]) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await
            .map_err(|err| DataManagerError::Database(format!("Failed to begin transaction: {err}")))?;

        for response in responses {
            query(concatcp!("
                INSERT INTO ", SURVEY_RESPONSES_TABLE_NAME, "(", RESPONSE_ID, ", ", USER_ID, ", ", TS, ", ", RESPONSE, ")
                VALUES (NULL, ?1, ?2, ?3)"))
                .bind(&response.user_id)
                .bind(response.timestamp.timestamp_millis())
                .bind(response.response.to_string())
                .execute(&mut *tx).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert survey response: {err}")))?;
        }

        tx.commit().await
            .map_err(|err| DataManagerError::Database(format!("Failed to commit survey responses: {err}")))
    }

    pub async fn get_survey_responses(&self) -> Result<Vec<SurveyResponse>, DataManagerError> {
        query_as::<_, SurveyResponse>(concatcp!("SELECT * FROM ", SURVEY_RESPONSES_TABLE_NAME, " ORDER BY ", TS, ", ", RESPONSE_ID))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get survey responses: {err}")))
    }

    pub async fn insert_tokens(&self, tokens: &[Token]) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await
            .map_err(|err| DataManagerError::Database(format!("Failed to begin transaction: {err}")))?;

        for token in tokens {
            query(concatcp!("INSERT INTO ", TOKENS_TABLE_NAME, "(", TOKEN, ", ", CREATED_AT, ") VALUES (?1, ?2)"))
                .bind(&token.token)
                .bind(token.created_at.timestamp_millis())
                .execute(&mut *tx).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert token: {err}")))?;
        }

        tx.commit().await
            .map_err(|err| DataManagerError::Database(format!("Failed to commit tokens: {err}")))
    }

    pub async fn get_tokens(&self) -> Result<Vec<Token>, DataManagerError> {
        query_as::<_, Token>(concatcp!("SELECT * FROM ", TOKENS_TABLE_NAME, " ORDER BY ", CREATED_AT, ", rowid"))
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get tokens: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use openpath_lib::motion_mode::MotionMode;

    use super::*;

    fn ping(section: &str, idx: i64, lon: f64, lat: f64) -> LocationPing {
        LocationPing {
            section_id: section.into(),
            user_id: "user".into(),
            timestamp: Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, idx as u32).unwrap(),
            fmt_time: "2023-05-01T08:00:00+00:00".into(),
            longitude: lon,
            latitude: lat,
            idx,
            mode: MotionMode::Bus,
        }
    }

    #[tokio::test]
    async fn locations_round_trip_through_box_query() {
        let db = AdminDatabase::connect_in_memory().await.unwrap();
        db.insert_locations(&[ping("a", 0, 10.0, 55.0), ping("a", 1, 11.0, 55.0), ping("b", 0, 10.05, 55.05)]).await.unwrap();

        let found = db.get_locations_in_box(&TimeRange::unbounded(), [(9.9, 10.1); 2], 54.9, 55.1).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ping("a", 0, 10.0, 55.0));
        assert_eq!(found[1].section_id, "b");
        assert_eq!(found[1].mode, MotionMode::Bus);
    }

    #[tokio::test]
    async fn users_are_replaced_by_id() {
        let db = AdminDatabase::connect_in_memory().await.unwrap();
        let ts = Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap();

        db.insert_users(&[UserEntry::new("u1".into(), "old@example.com".into(), ts)]).await.unwrap();
        db.insert_users(&[UserEntry::new("u1".into(), "new@example.com".into(), ts)]).await.unwrap();

        let users = db.get_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_token, "new@example.com");
    }

    #[tokio::test]
    async fn survey_responses_keep_their_json() {
        let db = AdminDatabase::connect_in_memory().await.unwrap();
        let response = SurveyResponse {
            user_id: "u1".into(),
            timestamp: Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap(),
            response: serde_json::json!({ "age": 30, "household": { "size": 2 } }),
        };

        db.insert_survey_responses(std::slice::from_ref(&response)).await.unwrap();

        assert_eq!(db.get_survey_responses().await.unwrap(), vec![response]);
    }
}
