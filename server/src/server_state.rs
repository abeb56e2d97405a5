use openpath_data_management::{study_config::load_permissions, DataManager, DataManagerError};
use openpath_lib::permissions::Permissions;
use tokio::sync::RwLock;

use crate::config::ServerConfig;

pub struct ServerState {
    pub data_manager: DataManager,
    pub config: ServerConfig,
    // Swapped on refresh.
    pub permissions: RwLock<Permissions>,
}

impl ServerState {
    pub async fn new(data_manager: DataManager, config: ServerConfig) -> Result<Self, DataManagerError> {
        let permissions = fetch_permissions(&config).await?;
        Ok(ServerState {
            data_manager,
            config,
            permissions: RwLock::new(permissions),
        })
    }

    pub async fn permissions(&self) -> Permissions {
        self.permissions.read().await.clone()
    }

    /// Re-reads the study config. The old permissions stay on failure.
    pub async fn refresh_permissions(&self) -> Result<Permissions, DataManagerError> {
        let permissions = fetch_permissions(&self.config).await?;
        *self.permissions.write().await = permissions.clone();
        tracing::info!("Refreshed study permissions");
        Ok(permissions)
    }
}

async fn fetch_permissions(config: &ServerConfig) -> Result<Permissions, DataManagerError> {
    match config.study_source() {
        Some((config_path, study_name)) => load_permissions(config_path, study_name).await,
        None => {
            tracing::warn!("No study config configured, granting every permission");
            Ok(Permissions::permissive())
        }
    }
}
