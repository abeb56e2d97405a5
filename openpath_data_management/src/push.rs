use std::collections::{BTreeSet, HashMap};

use openpath_lib::user::UserEntry;
use serde::{Deserialize, Serialize};

use crate::{DataManager, DataManagerError};

/// Who a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "lowercase")]
pub enum Receivers {
    All,
    /// Login tokens, e-mail addresses on older deployments.
    Emails(Vec<String>),
    Uuids(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub receivers: Receivers,
    pub title: String,
    pub message: String,
}

/// Resolved recipients of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPlan {
    pub recipients: Vec<String>,
    /// Requested receivers with no registered user.
    pub skipped: Vec<String>,
    pub log: String,
}

impl DataManager {
    pub async fn prepare_push(&self, request: &PushRequest) -> Result<PushPlan, DataManagerError> {
        let users = self.database.get_users().await?;
        let plan = plan_push(request, &users)?;

        tracing::info!("{}", plan.log);
        if !plan.skipped.is_empty() {
            tracing::warn!("Skipped {} unknown push receivers", plan.skipped.len());
        }

        Ok(plan)
    }
}

pub fn plan_push(request: &PushRequest, users: &[UserEntry]) -> Result<PushPlan, DataManagerError> {
    if request.title.trim().is_empty() {
        return Err(DataManagerError::InvalidInput("push title must not be empty".into()));
    }
    if request.message.trim().is_empty() {
        return Err(DataManagerError::InvalidInput("push message must not be empty".into()));
    }

    let (recipients, skipped): (BTreeSet<String>, Vec<String>) = match &request.receivers {
        Receivers::All => (users.iter().map(|user| user.user_id.clone()).collect(), Vec::new()),
        Receivers::Uuids(ids) => {
            let known: BTreeSet<&str> = users.iter().map(|user| user.user_id.as_str()).collect();
            resolve(ids, |id| known.get(id.as_str()).map(|id| id.to_string()))
        }
        Receivers::Emails(emails) => {
            let by_token: HashMap<&str, &str> = users.iter()
                .map(|user| (user.user_token.as_str(), user.user_id.as_str()))
                .collect();
            resolve(emails, |email| by_token.get(email.as_str()).map(|id| id.to_string()))
        }
    };

    let recipients: Vec<String> = recipients.into_iter().collect();
    let log = format!(
        "Push \"{}\" to {} recipient(s): {}",
        request.title,
        recipients.len(),
        request.message
    );

    Ok(PushPlan { recipients, skipped, log })
}

fn resolve(requested: &[String], lookup: impl Fn(&String) -> Option<String>) -> (BTreeSet<String>, Vec<String>) {
    let mut found = BTreeSet::new();
    let mut skipped = Vec::new();
    for receiver in requested {
        match lookup(receiver) {
            Some(user_id) => {
                found.insert(user_id);
            }
            None => skipped.push(receiver.clone()),
        }
    }
    (found, skipped)
}
