use std::path::{Path, PathBuf};

use openpath_lib::{
    columns::EXCLUDED_DEMOGRAPHICS_COLS,
    location_ping::LocationPing,
    permissions::Permissions,
    survey::SurveyResponse,
    table::{drop_columns, flatten, project, Row},
    time_range::TimeRange,
    token::Token,
    trip::ConfirmedTrip,
    user::UserEntry,
};

use crate::{database::db::AdminDatabase, DataManagerError, DATABASE_PATH};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: AdminDatabase,
}

/// The public interface for all dashboard data.
impl DataManager {
    pub async fn start(database_path: &Path) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if let Some(data_dir) = database_path.parent() {
            if !data_dir.as_os_str().is_empty() && !data_dir.exists() {
                std::fs::create_dir_all(data_dir)
                    .map_err(|err| DataManagerError::Database(format!("Failed to create data directory {data_dir:?}: {err}")))?;
            }
        }

        let database = AdminDatabase::connect(database_path).await?;
        tracing::info!("Opened database at {:?}", database_path);

        Ok(DataManager { database })
    }

    pub async fn in_memory() -> Result<Self, DataManagerError> {
        Ok(DataManager {
            database: AdminDatabase::connect_in_memory().await?,
        })
    }

    /// `data/openpath.db` under the project root.
    pub fn default_database_path() -> Result<PathBuf, DataManagerError> {
        let root = project_root::get_project_root()
            .map_err(|err| DataManagerError::Config(format!("Failed to find project root: {err}")))?;
        Ok(root.join(DATABASE_PATH))
    }

    pub async fn insert_users(&self, users: &[UserEntry]) -> Result<(), DataManagerError> {
        self.database.insert_users(users).await
    }

    pub async fn insert_trips(&self, trips: &[ConfirmedTrip]) -> Result<(), DataManagerError> {
        self.database.insert_trips(trips).await
    }

    pub async fn insert_locations(&self, pings: &[LocationPing]) -> Result<(), DataManagerError> {
        self.database.insert_locations(pings).await
    }

    pub async fn insert_survey_responses(&self, responses: &[SurveyResponse]) -> Result<(), DataManagerError> {
        self.database.insert_survey_responses(responses).await
    }

    pub async fn get_users(&self) -> Result<Vec<UserEntry>, DataManagerError> {
        self.database.get_users().await
    }

    pub async fn get_trips(&self, range: &TimeRange) -> Result<Vec<ConfirmedTrip>, DataManagerError> {
        self.database.get_trips_in(range).await
    }

    /// Users registered in `range`, limited to the columns the study allows.
    pub async fn query_uuids(&self, permissions: &Permissions, range: &TimeRange) -> Result<Vec<Row>, DataManagerError> {
        let columns = permissions.allowed_uuids_columns();
        let users = self.database.get_users_updated_in(range).await?;

        Ok(users.iter()
            .map(|user| project(&user.to_document(), columns.iter().copied(), &[]))
            .collect())
    }

    /// Confirmed trips starting in `range`, with the allowed plain columns and
    /// every named column.
    pub async fn query_confirmed_trips(&self, permissions: &Permissions, range: &TimeRange) -> Result<Vec<Row>, DataManagerError> {
        let columns = permissions.allowed_trip_columns();
        let named = permissions.all_named_trip_columns();
        let trips = self.database.get_trips_in(range).await?;

        Ok(trips.iter()
            .map(|trip| project(&trip.to_document(), columns.iter().copied(), &named))
            .collect())
    }

    pub async fn query_demographics(&self) -> Result<Vec<Row>, DataManagerError> {
        let responses = self.database.get_survey_responses().await?;

        Ok(responses.iter()
            .map(|response| drop_columns(flatten(&response.to_document()), EXCLUDED_DEMOGRAPHICS_COLS))
            .collect())
    }

    pub async fn query_trajectories(&self, permissions: &Permissions, range: &TimeRange) -> Result<Vec<Row>, DataManagerError> {
        let columns = permissions.allowed_trajectory_columns();
        let pings = self.database.get_locations_in(range).await?;

        Ok(pings.iter()
            .map(|ping| project(&ping.to_document(), columns.iter().copied(), &[]))
            .collect())
    }

    pub async fn query_tokens(&self) -> Result<Vec<Token>, DataManagerError> {
        self.database.get_tokens().await
    }
}
