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
use std::path::PathBuf;
use std::sync::RwLock;

use actix_web::web;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Store;

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub static_content_path: PathBuf,
    pub listen: ListenConfig,
    pub auth_secret: String,
    pub token_ttl_hours: i64,
    #[serde(skip, default = "Utc::now")]
    pub startup_timestamp: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut buffer = [0u8; 32];
        getrandom::fill(&mut buffer).expect("should be able to generate an auth secret");
        Self {
            db_path: PathBuf::from("./db.json"),
            static_content_path: PathBuf::from("./static"),
            listen: ListenConfig::default(),
            auth_secret: URL_SAFE_NO_PAD.encode(buffer),
            token_ttl_hours: 24,
            startup_timestamp: Utc::now(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub tcp: Option<(String, u16)>,
    pub unix: Option<String>,
    pub unix_mode: Option<u32>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            tcp: Some(("0.0.0.0".to_owned(), 5000)),
            unix: None,
            unix_mode: None,
        }
    }
}

pub type StoreLock = web::Data<RwLock<Store>>;
