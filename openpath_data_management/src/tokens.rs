use std::collections::HashSet;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::Utc;
use openpath_lib::{
    permissions::Permissions,
    token::{Token, TokenFormat, TokenRequest, MAX_TOKEN_COUNT, MAX_TOKEN_LENGTH, MIN_TOKEN_LENGTH},
};
use rand::RngCore;

use crate::{DataManager, DataManagerError};

/// Draws per requested token before giving up on finding unused ones.
const ATTEMPTS_PER_TOKEN: usize = 16;

impl DataManager {
    /// Generates a batch of enrollment tokens and stores them.
    pub async fn generate_tokens(&self, permissions: &Permissions, request: &TokenRequest) -> Result<Vec<Token>, DataManagerError> {
        let existing: HashSet<String> = self.database.get_tokens().await?
            .into_iter()
            .map(|token| token.token)
            .collect();

        let tokens = generate_tokens_for_program(&permissions.token_prefix(), request, &existing)?;

        self.database.insert_tokens(&tokens).await?;
        tracing::info!("Generated {} tokens for program {}", tokens.len(), request.program);

        Ok(tokens)
    }
}

/// A batch of distinct tokens, none of which is in `existing`.
pub fn generate_tokens_for_program(prefix: &str, request: &TokenRequest, existing: &HashSet<String>) -> Result<Vec<Token>, DataManagerError> {
    if request.program.is_empty() {
        return Err(DataManagerError::InvalidInput("program must not be empty".into()));
    }
    if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&request.length) {
        return Err(DataManagerError::InvalidInput(format!(
            "token length must be between {MIN_TOKEN_LENGTH} and {MAX_TOKEN_LENGTH}, got {}",
            request.length
        )));
    }
    if request.count > MAX_TOKEN_COUNT {
        return Err(DataManagerError::InvalidInput(format!(
            "at most {MAX_TOKEN_COUNT} tokens per request, got {}",
            request.count
        )));
    }

    let created_at = Utc::now();
    let mut batch: HashSet<String> = HashSet::with_capacity(request.count);
    let mut tokens = Vec::with_capacity(request.count);
    let mut attempts = request.count * ATTEMPTS_PER_TOKEN;

    while tokens.len() < request.count {
        if attempts == 0 {
            return Err(DataManagerError::InvalidInput(format!(
                "could not find {} unused tokens of length {}, use a longer length",
                request.count, request.length
            )));
        }
        attempts -= 1;

        let token = format!("{prefix}{}_{}", request.program, random_token(request.length, request.format));
        if existing.contains(&token) || !batch.insert(token.clone()) {
            tracing::debug!("Discarding duplicate token");
            continue;
        }
        tokens.push(Token { token, created_at });
    }

    Ok(tokens)
}

/// `length` random bytes rendered in `format`.
pub fn random_token(length: usize, format: TokenFormat) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);

    match format {
        TokenFormat::Urlsafe => URL_SAFE_NO_PAD.encode(&bytes),
        TokenFormat::Hex => hex::encode(&bytes),
        TokenFormat::Base64 => STANDARD.encode(&bytes),
    }
}
