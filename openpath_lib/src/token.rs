use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

pub const MIN_TOKEN_LENGTH: usize = 3;
pub const MAX_TOKEN_LENGTH: usize = 100;
/// Largest batch a single request may generate.
pub const MAX_TOKEN_COUNT: usize = 10_000;

/// An enrollment token handed to a participant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Token {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Rendering of the random part of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    #[default]
    #[serde(alias = "url safe")]
    Urlsafe,
    Hex,
    Base64,
}

impl std::str::FromStr for TokenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urlsafe" | "url safe" => Ok(TokenFormat::Urlsafe),
            "hex" => Ok(TokenFormat::Hex),
            "base64" => Ok(TokenFormat::Base64),
            other => Err(format!("unknown token format '{other}', expected urlsafe, hex or base64")),
        }
    }
}

/// Parameters of one token generation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub program: String,
    /// Number of random bytes per token.
    pub length: usize,
    pub count: usize,
    #[serde(default)]
    pub format: TokenFormat,
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for Token {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let ts: i64 = row.try_get("created_at")?;
        Ok(Self {
            token: row.try_get("token")?,
            created_at: crate::time_range::datetime_from_millis(ts)
                .ok_or_else(|| sqlx::Error::Decode(format!("created_at {ts} out of range").into()))?,
        })
    }
}
