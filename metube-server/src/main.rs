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
use std::{sync::RwLock, fs::{File, Permissions, set_permissions}, io::{Read, Write, self}, os::unix::prelude::PermissionsExt};
use actix_files::{Files, NamedFile};
use actix_web::{HttpServer, App, web, dev::{ServiceResponse, fn_service, ServiceRequest}, middleware::NormalizePath};
use anyhow::{Context, bail};
use env_logger::Env;
use log::info;

mod auth;
mod routes;
mod state;
mod store;
mod utils;
use state::*;
use store::Store;

const CONFIG_PATH: &str = "config.toml";


#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config: web::Data<AppConfig> = web::Data::new(match File::open(CONFIG_PATH) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents).with_context(|| format!("Failed to read {CONFIG_PATH}"))?;
            let cfg: AppConfig = toml::from_str(&contents).with_context(|| format!("Failed to deserialize contents of {CONFIG_PATH}"))?;
            if cfg.listen.tcp.is_none() && cfg.listen.unix.is_none() {
                bail!("Invalid configuration - no tcp port or unix socket path specified");
            }
            cfg
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let cfg = AppConfig::default();
            let serialized = toml::to_string(&cfg).context("Failed to serialize default AppConfig as TOML")?;
            let mut file = File::options().write(true).create_new(true).open(CONFIG_PATH).with_context(|| format!("Failed to create {CONFIG_PATH}"))?;
            write!(file, "{serialized}").with_context(|| format!("Failed to write serialized default AppConfig to {CONFIG_PATH}"))?;
            cfg
        },
        Err(e) => {
            return Err(e).context(format!("Failed to open {CONFIG_PATH}"));
        }
    });
    info!("Loading store...");
    let store: web::Data<RwLock<Store>> = {
        let store = Store::load(config.db_path.clone()).context("Initial store load failed")?;
        info!("Store ready: {} users, {} comments", store.db.users.len(), store.db.comment_count());
        web::Data::new(RwLock::new(store))
    };

    let mut server = {
        let config = config.clone();
        HttpServer::new(move || {
            let config2 = config.clone();
            App::new()
                .wrap(NormalizePath::trim())
                .app_data(config.clone())
                .app_data(store.clone())
                .service(web::scope("/api")
                    .configure(routes::configure)
                )
                .service(
                    Files::new("/", config.static_content_path.as_path())
                        .index_file("index.html")
                        .default_handler(fn_service(move |req: ServiceRequest| {
                            let config = config2.clone();
                            async move {
                                let (req, _) = req.into_parts();
                                let index_file = config.static_content_path.join("index.html");
                                let file = NamedFile::open_async(index_file.as_path()).await?;
                                let resp = file.into_response(&req);
                                Ok(ServiceResponse::new(req, resp))
                            }
                        }))
                )
        })
    };
    if let Some((ref ip, port)) = config.listen.tcp {
        let ip_str = ip.as_str();
        server = server.bind((ip_str, port)).with_context(|| format!("Failed to bind to tcp port {ip_str}:{port}"))?;
        info!("Listening on {ip_str}:{port}");
    };
    if let Some(ref path) = config.listen.unix {
        let path_str = path.as_str();
        server = server.bind_uds(path_str).with_context(|| format!("Failed to bind to unix socket {path_str}"))?;
        if let Some(mode) = config.listen.unix_mode {
            let perms = Permissions::from_mode(mode);
            set_permissions(path_str, perms).with_context(|| format!("Failed to change mode of unix socket {path_str} to {mode}"))?;
        }
        info!("Listening on {path_str}");
    };
    server.run()
    .await
    .context("Error while running the server")
}

mod built_info {
    // Contents generated by buildscript, using built
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
