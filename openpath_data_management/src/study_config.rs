use std::path::Path;

use openpath_lib::permissions::Permissions;

use crate::DataManagerError;

pub const CONFIG_SUFFIX: &str = ".nrel-op.json";

/// Where the study config for `study_name` lives under `config_path`.
pub fn config_location(config_path: &str, study_name: &str) -> String {
    format!("{config_path}{study_name}{CONFIG_SUFFIX}")
}

/// Fetches the study config and reads its permissions. `config_path` is either
/// an http(s) URL prefix or a local directory prefix.
pub async fn load_permissions(config_path: &str, study_name: &str) -> Result<Permissions, DataManagerError> {
    let location = config_location(config_path, study_name);
    tracing::info!("Loading study config from {}", location);

    let text = if location.starts_with("http://") || location.starts_with("https://") {
        fetch(&location).await?
    } else {
        tokio::fs::read_to_string(Path::new(&location)).await
            .map_err(|err| DataManagerError::Config(format!("Failed to read {location}: {err}")))?
    };

    Ok(Permissions::from_study_config(&text)?)
}

async fn fetch(url: &str) -> Result<String, DataManagerError> {
    let response = reqwest::get(url).await
        .and_then(|response| response.error_for_status())
        .map_err(|err| DataManagerError::Config(format!("Failed to fetch {url}: {err}")))?;

    response.text().await
        .map_err(|err| DataManagerError::Config(format!("Failed to read body of {url}: {err}")))
}
