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
// NOTE: This file is used as a template for metube-api::sync and ::unsync modules.
//       The RcStr type will be defined externally with the correct smart pointer variant for the
//       module.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: RcStr,
    pub email: RcStr,
    pub username: RcStr,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: RcStr,
    pub password: RcStr,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: RcStr,
    pub password: RcStr,
    pub username: RcStr,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub token: RcStr,
    pub user: User,
}

/// The canonical video shape. Items arriving from the various metadata API
/// surfaces are normalized into this before they reach any collection.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail: RcStr,
    pub channel_title: RcStr,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchLaterItem {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail: RcStr,
    pub channel_title: RcStr,
    pub added_at: i64,
}

impl WatchLaterItem {
    pub fn from_video(video: &VideoRef, added_at: i64) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            thumbnail: video.thumbnail.clone(),
            channel_title: video.channel_title.clone(),
            added_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail: RcStr,
    pub channel_title: RcStr,
    pub watched_at: i64,
}

impl HistoryItem {
    pub fn from_video(video: &VideoRef, watched_at: i64) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            thumbnail: video.thumbnail.clone(),
            channel_title: video.channel_title.clone(),
            watched_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LikedVideoItem {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail: RcStr,
    pub channel_title: RcStr,
    pub liked_at: i64,
}

impl LikedVideoItem {
    pub fn from_video(video: &VideoRef, liked_at: i64) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            thumbnail: video.thumbnail.clone(),
            channel_title: video.channel_title.clone(),
            liked_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlaylistVideo {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail: RcStr,
    pub channel_title: RcStr,
    pub added_at: i64,
}

impl PlaylistVideo {
    pub fn from_video(video: &VideoRef, added_at: i64) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            thumbnail: video.thumbnail.clone(),
            channel_title: video.channel_title.clone(),
            added_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: RcStr,
    pub name: RcStr,
    #[serde(default)]
    pub description: Option<RcStr>,
    #[serde(default)]
    pub videos: Vec<PlaylistVideo>,
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlaylistRename {
    pub name: RcStr,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Comment {
    pub id: RcStr,
    pub video_id: RcStr,
    pub user_id: RcStr,
    pub username: RcStr,
    pub text: RcStr,
    #[serde(default)]
    pub parent_comment_id: Option<RcStr>,
    /// User ids that liked this comment. Mutually exclusive with `dislikes`.
    #[serde(default)]
    pub likes: Vec<RcStr>,
    #[serde(default)]
    pub dislikes: Vec<RcStr>,
    #[serde(default)]
    pub is_edited: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub id: RcStr,
    pub video_id: RcStr,
    pub text: RcStr,
    #[serde(default)]
    pub parent_comment_id: Option<RcStr>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub text: RcStr,
}

/// Everything the server holds for one user, fetched wholesale on login.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UserData {
    pub watch_later: Vec<WatchLaterItem>,
    pub history: Vec<HistoryItem>,
    pub liked_videos: Vec<LikedVideoItem>,
    pub playlists: Vec<Playlist>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StatusResponse {
    // store stats
    pub users: Option<usize>,
    pub comments: Option<usize>,
    // general server build data
    pub server_version: Option<RcStr>,
    pub server_git_hash: Option<RcStr>,
    pub server_git_dirty: Option<bool>,
    pub server_build_timestamp: Option<i64>,
    pub server_startup_timestamp: Option<i64>,
}
