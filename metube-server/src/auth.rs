/* This file is part of the MeTube project - https://github.com/mini-bomba/MeTube
*
*  Copyright (C) 2024-2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest};
use anyhow::{anyhow, Context};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::state::AppConfig;
use crate::utils;

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("Failed to hash password: {err}"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

pub fn issue_token(user_id: &str, config: &AppConfig) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_owned(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.auth_secret.as_bytes()),
    ).context("Failed to sign the session token")
}

pub fn validate_token(token: &str, config: &AppConfig) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.auth_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    ).ok().map(|data| data.claims)
}

/// The authenticated principal, extracted from the bearer token.
/// Handlers taking this reject unauthenticated requests with a 401.
pub struct Authenticated {
    pub user_id: Arc<str>,
}

fn unauthorized(msg: &'static str) -> utils::Error {
    utils::Error::from(anyhow!(msg)).set_status(StatusCode::UNAUTHORIZED)
}

impl FromRequest for Authenticated {
    type Error = utils::Error;
    type Future = Ready<utils::Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = (|| {
            let config = req.app_data::<web::Data<AppConfig>>()
                .ok_or_else(|| utils::Error::from(anyhow!("AppConfig is missing from app data")))?;
            let token = req.headers().get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or_else(|| unauthorized("Missing bearer token"))?;
            let claims = validate_token(token, config)
                .ok_or_else(|| unauthorized("Invalid or expired token"))?;
            Ok(Authenticated { user_id: claims.sub.into() })
        })();
        ready(result)
    }
}
