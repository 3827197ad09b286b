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
#![allow(clippy::needless_pass_by_value)]
use std::sync::LazyLock;

use actix_web::{delete, get, http::StatusCode, post, put, web, Responder};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::info;
use metube_api::sync::*;
use regex::Regex;
use uuid::Uuid;

use crate::auth::{self, Authenticated};
use crate::built_info;
use crate::state::{AppConfig, StoreLock};
use crate::store::{Database, UserDoc};
use crate::utils;

pub const STORE_READ_ERR:  &str = "Failed to acquire Store for reading";
pub const STORE_WRITE_ERR: &str = "Failed to acquire Store for writing";

pub const COMMENT_MAX_LEN: usize = 1000;

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\d_-]{11}$").expect("VIDEO_ID_REGEX should be valid"));
static UUID_REGEX:     LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{8}\-(?:[0-9a-f]{4}-){3}[0-9a-f]{12}$").expect("UUID_REGEX should be valid"));

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(helo)
       .service(signup)
       .service(login)
       .service(get_profile)
       .service(get_status)
       .service(get_user_data)
       .service(add_watch_later)
       .service(remove_watch_later)
       .service(add_history)
       .service(remove_history)
       .service(clear_history)
       .service(add_liked_video)
       .service(remove_liked_video)
       .service(get_playlists)
       .service(create_playlist)
       .service(rename_playlist)
       .service(delete_playlist)
       .service(add_playlist_video)
       .service(remove_playlist_video)
       .service(get_comments)
       .service(post_comment)
       .service(edit_comment)
       .service(delete_comment)
       .service(like_comment)
       .service(dislike_comment);
}

type JsonResult<T> = utils::Result<web::Json<T>>;

fn api_error(status: StatusCode, msg: String) -> utils::Error {
    utils::Error::from(anyhow!(msg)).set_status(status)
}

fn check_video_id(id: &str) -> utils::Result<()> {
    if VIDEO_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(api_error(StatusCode::BAD_REQUEST, format!("'{id}' is not a valid video id")))
    }
}

fn check_comment_text(text: &str) -> utils::Result<()> {
    if text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Comments cannot be empty".to_owned()));
    }
    if text.chars().count() > COMMENT_MAX_LEN {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("Comments are limited to {COMMENT_MAX_LEN} characters")));
    }
    Ok(())
}

/// The user document behind a validated token. A token whose user has been
/// deleted since issuance gets a 401, forcing re-authentication.
fn current_user<'db>(db: &'db mut Database, auth: &Authenticated) -> utils::Result<&'db mut UserDoc> {
    db.user_mut(&auth.user_id)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "User no longer exists".to_owned()))
}

#[get("/")]
async fn helo() -> impl Responder {
    "hi"
}

#[get("/status")]
async fn get_status(store: StoreLock, config: web::Data<AppConfig>) -> JsonResult<StatusResponse> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    Ok(web::Json(StatusResponse {
        users: Some(store.db.users.len()),
        comments: Some(store.db.comment_count()),
        server_version: Some(built_info::PKG_VERSION.into()),
        server_git_hash: built_info::GIT_COMMIT_HASH.map(Into::into),
        server_git_dirty: built_info::GIT_DIRTY,
        server_build_timestamp: DateTime::parse_from_rfc2822(built_info::BUILT_TIME_UTC).ok().map(|t| t.timestamp()),
        server_startup_timestamp: Some(config.startup_timestamp.timestamp()),
    }))
}

#[post("/signup")]
async fn signup(store: StoreLock, config: web::Data<AppConfig>, body: web::Json<SignupRequest>) -> JsonResult<AuthResponse> {
    let body = body.into_inner();
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(api_error(StatusCode::BAD_REQUEST, "A valid email is required".to_owned()));
    }
    if body.username.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "A username is required".to_owned()));
    }
    if body.password.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "A password is required".to_owned()));
    }

    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    if store.db.find_user_by_email(&body.email).is_some() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Email already exists".to_owned()));
    }
    let user = UserDoc {
        id: Uuid::new_v4().to_string().into(),
        email: body.email,
        username: body.username,
        password_hash: auth::hash_password(&body.password)?,
        data: UserData::default(),
    };
    let token = auth::issue_token(&user.id, &config)?;
    let response = AuthResponse { token: token.into(), user: user.public() };
    info!("New account registered: {}", user.username);
    store.db.users.push(user);
    store.persist()?;
    Ok(web::Json(response))
}

#[post("/login")]
async fn login(store: StoreLock, config: web::Data<AppConfig>, body: web::Json<LoginRequest>) -> JsonResult<AuthResponse> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    // a missing account and a wrong password are indistinguishable on purpose
    let user = store.db.find_user_by_email(&body.email)
        .filter(|user| auth::verify_password(&body.password, &user.password_hash))
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Invalid credentials".to_owned()))?;
    let token = auth::issue_token(&user.id, &config)?;
    Ok(web::Json(AuthResponse { token: token.into(), user: user.public() }))
}

#[get("/profile")]
async fn get_profile(store: StoreLock, auth: Authenticated) -> JsonResult<User> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    let user = store.db.user(&auth.user_id)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "User no longer exists".to_owned()))?;
    Ok(web::Json(user.public()))
}

#[get("/user-data")]
async fn get_user_data(store: StoreLock, auth: Authenticated) -> JsonResult<UserData> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    let user = store.db.user(&auth.user_id)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "User no longer exists".to_owned()))?;
    Ok(web::Json(user.data.clone()))
}

#[post("/watch-later")]
async fn add_watch_later(store: StoreLock, auth: Authenticated, body: web::Json<WatchLaterItem>) -> JsonResult<Vec<WatchLaterItem>> {
    let item = body.into_inner();
    check_video_id(&item.id)?;
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.add_watch_later(item);
    let updated = user.data.watch_later.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/watch-later/{id}")]
async fn remove_watch_later(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Vec<WatchLaterItem>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.remove_watch_later(&path);
    let updated = user.data.watch_later.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[post("/history")]
async fn add_history(store: StoreLock, auth: Authenticated, body: web::Json<HistoryItem>) -> JsonResult<Vec<HistoryItem>> {
    let item = body.into_inner();
    check_video_id(&item.id)?;
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.add_history(item);
    let updated = user.data.history.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/history/{id}")]
async fn remove_history(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Vec<HistoryItem>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.remove_history(&path);
    let updated = user.data.history.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/history")]
async fn clear_history(store: StoreLock, auth: Authenticated) -> JsonResult<Vec<HistoryItem>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.clear_history();
    store.persist()?;
    Ok(web::Json(Vec::new()))
}

#[post("/liked-videos")]
async fn add_liked_video(store: StoreLock, auth: Authenticated, body: web::Json<LikedVideoItem>) -> JsonResult<Vec<LikedVideoItem>> {
    let item = body.into_inner();
    check_video_id(&item.id)?;
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.add_liked(item);
    let updated = user.data.liked_videos.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/liked-videos/{id}")]
async fn remove_liked_video(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Vec<LikedVideoItem>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.remove_liked(&path);
    let updated = user.data.liked_videos.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[get("/playlists")]
async fn get_playlists(store: StoreLock, auth: Authenticated) -> JsonResult<Vec<Playlist>> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    let user = store.db.user(&auth.user_id)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "User no longer exists".to_owned()))?;
    Ok(web::Json(user.data.playlists.clone()))
}

#[post("/playlists")]
async fn create_playlist(store: StoreLock, auth: Authenticated, body: web::Json<Playlist>) -> JsonResult<Vec<Playlist>> {
    let playlist = body.into_inner();
    if playlist.name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Playlist names cannot be empty".to_owned()));
    }
    if !UUID_REGEX.is_match(&playlist.id) {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("'{}' is not a valid playlist id", playlist.id)));
    }
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.add_playlist(playlist);
    let updated = user.data.playlists.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[put("/playlists/{id}")]
async fn rename_playlist(store: StoreLock, auth: Authenticated, path: web::Path<String>, body: web::Json<PlaylistRename>) -> JsonResult<Playlist> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Playlist names cannot be empty".to_owned()));
    }
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    let playlist = user.playlist_mut(&path)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Playlist not found".to_owned()))?;
    playlist.name = name.into();
    let updated = playlist.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/playlists/{id}")]
async fn delete_playlist(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Vec<Playlist>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    user.remove_playlist(&path);
    let updated = user.data.playlists.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[post("/playlists/{id}/videos")]
async fn add_playlist_video(store: StoreLock, auth: Authenticated, path: web::Path<String>, body: web::Json<PlaylistVideo>) -> JsonResult<Playlist> {
    let video = body.into_inner();
    check_video_id(&video.id)?;
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    let updated = user.add_playlist_video(&path, video)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Playlist not found".to_owned()))?
        .clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/playlists/{id}/videos/{video_id}")]
async fn remove_playlist_video(store: StoreLock, auth: Authenticated, path: web::Path<(String, String)>) -> JsonResult<Playlist> {
    let (playlist_id, video_id) = path.into_inner();
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?;
    let updated = user.remove_playlist_video(&playlist_id, &video_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Playlist not found".to_owned()))?
        .clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[get("/comments/{video_id}")]
async fn get_comments(store: StoreLock, path: web::Path<String>) -> JsonResult<Vec<Comment>> {
    let store = store.read().map_err(|_| anyhow!(STORE_READ_ERR))?;
    Ok(web::Json(store.db.comments_for(&path).to_vec()))
}

#[post("/comments")]
async fn post_comment(store: StoreLock, auth: Authenticated, body: web::Json<NewComment>) -> JsonResult<Comment> {
    let body = body.into_inner();
    check_comment_text(&body.text)?;
    check_video_id(&body.video_id)?;
    if !UUID_REGEX.is_match(&body.id) {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("'{}' is not a valid comment id", body.id)));
    }

    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let user = current_user(&mut store.db, &auth)?.public();
    if store.db.comment_exists(&body.id) {
        return Err(api_error(StatusCode::CONFLICT, format!("Comment {} already exists", body.id)));
    }
    if let Some(ref parent_id) = body.parent_comment_id {
        let parent_is_top_level = store.db.comments_for(&body.video_id).iter()
            .any(|c| c.id == *parent_id && c.parent_comment_id.is_none());
        if !parent_is_top_level {
            return Err(api_error(StatusCode::BAD_REQUEST, "Replies must target an existing top-level comment".to_owned()));
        }
    }

    let now = Utc::now().timestamp_millis();
    let comment = Comment {
        id: body.id,
        video_id: body.video_id,
        user_id: user.id,
        username: user.username,
        text: body.text,
        parent_comment_id: body.parent_comment_id,
        likes: Vec::new(),
        dislikes: Vec::new(),
        is_edited: false,
        created_at: now,
        updated_at: now,
    };
    store.db.add_comment(comment.clone());
    store.persist()?;
    Ok(web::Json(comment))
}

#[put("/comments/{id}")]
async fn edit_comment(store: StoreLock, auth: Authenticated, path: web::Path<String>, body: web::Json<CommentEdit>) -> JsonResult<Comment> {
    check_comment_text(&body.text)?;
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let comment = store.db.find_comment_mut(&path)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Comment not found".to_owned()))?;
    if comment.user_id != auth.user_id {
        return Err(api_error(StatusCode::FORBIDDEN, "You can only edit your own comments".to_owned()));
    }
    comment.text = body.text.clone();
    comment.is_edited = true;
    comment.updated_at = Utc::now().timestamp_millis();
    let updated = comment.clone();
    store.persist()?;
    Ok(web::Json(updated))
}

#[delete("/comments/{id}")]
async fn delete_comment(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Vec<Comment>> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    let Some(comment) = store.db.find_comment(&path) else {
        // deletes are idempotent
        return Ok(web::Json(Vec::new()));
    };
    if comment.user_id != auth.user_id {
        return Err(api_error(StatusCode::FORBIDDEN, "You can only delete your own comments".to_owned()));
    }
    let (video_id, _removed) = store.db.delete_comment(&path)
        .expect("comment was just looked up");
    let remaining = store.db.comments_for(&video_id).to_vec();
    store.persist()?;
    Ok(web::Json(remaining))
}

#[post("/comments/{id}/like")]
async fn like_comment(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Comment> {
    vote_comment(store, auth, &path, true)
}

#[post("/comments/{id}/dislike")]
async fn dislike_comment(store: StoreLock, auth: Authenticated, path: web::Path<String>) -> JsonResult<Comment> {
    vote_comment(store, auth, &path, false)
}

fn vote_comment(store: StoreLock, auth: Authenticated, comment_id: &str, like: bool) -> JsonResult<Comment> {
    let mut store = store.write().map_err(|_| anyhow!(STORE_WRITE_ERR))?;
    current_user(&mut store.db, &auth)?;
    let updated = store.db.vote_comment(comment_id, &auth.user_id, like)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Comment not found".to_owned()))?
        .clone();
    store.persist()?;
    Ok(web::Json(updated))
}
