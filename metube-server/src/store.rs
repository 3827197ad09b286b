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
//! The document store: every user document embeds that user's collections,
//! plus one comment thread per video. The whole store is one JSON file,
//! loaded at startup and rewritten (temp file + rename) after each
//! mutation. The server applies the same dedupe/cap/order rules as the
//! client - it is the authoritative side.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use metube_api::sync::*;
use serde::{Deserialize, Serialize};

pub const HISTORY_CAP: usize = 100;

#[derive(Serialize, Deserialize, Clone)]
pub struct UserDoc {
    pub id: Arc<str>,
    pub email: Arc<str>,
    pub username: Arc<str>,
    pub password_hash: String,
    #[serde(default)]
    pub data: UserData,
}

impl UserDoc {
    pub fn public(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }

    /// Prepends unless the id is already present (idempotent set-with-recency)
    pub fn add_watch_later(&mut self, item: WatchLaterItem) {
        if !self.data.watch_later.iter().any(|i| i.id == item.id) {
            self.data.watch_later.insert(0, item);
        }
    }

    pub fn remove_watch_later(&mut self, id: &str) {
        self.data.watch_later.retain(|i| i.id.as_ref() != id);
    }

    /// Re-watching moves the entry to the front; the list keeps the 100
    /// most recent entries
    pub fn add_history(&mut self, item: HistoryItem) {
        self.data.history.retain(|i| i.id != item.id);
        self.data.history.insert(0, item);
        self.data.history.truncate(HISTORY_CAP);
    }

    pub fn remove_history(&mut self, id: &str) {
        self.data.history.retain(|i| i.id.as_ref() != id);
    }

    pub fn clear_history(&mut self) {
        self.data.history.clear();
    }

    pub fn add_liked(&mut self, item: LikedVideoItem) {
        if !self.data.liked_videos.iter().any(|i| i.id == item.id) {
            self.data.liked_videos.insert(0, item);
        }
    }

    pub fn remove_liked(&mut self, id: &str) {
        self.data.liked_videos.retain(|i| i.id.as_ref() != id);
    }

    pub fn add_playlist(&mut self, playlist: Playlist) {
        if !self.data.playlists.iter().any(|p| p.id == playlist.id) {
            self.data.playlists.insert(0, playlist);
        }
    }

    pub fn remove_playlist(&mut self, id: &str) {
        self.data.playlists.retain(|p| p.id.as_ref() != id);
    }

    pub fn playlist_mut(&mut self, id: &str) -> Option<&mut Playlist> {
        self.data.playlists.iter_mut().find(|p| p.id.as_ref() == id)
    }

    /// Appends unless the video is already in the playlist.
    /// Returns `None` when the playlist does not exist.
    pub fn add_playlist_video(&mut self, playlist_id: &str, video: PlaylistVideo) -> Option<&Playlist> {
        let playlist = self.playlist_mut(playlist_id)?;
        if !playlist.videos.iter().any(|v| v.id == video.id) {
            playlist.videos.push(video);
        }
        Some(playlist)
    }

    pub fn remove_playlist_video(&mut self, playlist_id: &str, video_id: &str) -> Option<&Playlist> {
        let playlist = self.playlist_mut(playlist_id)?;
        playlist.videos.retain(|v| v.id.as_ref() != video_id);
        Some(playlist)
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Database {
    pub users: Vec<UserDoc>,
    /// Comment threads keyed by video id. Top-level comments are newest
    /// first, replies sit behind their parents in posting order.
    pub comments: HashMap<Arc<str>, Vec<Comment>>,
}

impl Database {
    pub fn find_user_by_email(&self, email: &str) -> Option<&UserDoc> {
        self.users.iter().find(|u| u.email.as_ref() == email)
    }

    pub fn user(&self, id: &str) -> Option<&UserDoc> {
        self.users.iter().find(|u| u.id.as_ref() == id)
    }

    pub fn user_mut(&mut self, id: &str) -> Option<&mut UserDoc> {
        self.users.iter_mut().find(|u| u.id.as_ref() == id)
    }

    pub fn comments_for(&self, video_id: &str) -> &[Comment] {
        self.comments.get(video_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.values().map(Vec::len).sum()
    }

    pub fn find_comment(&self, id: &str) -> Option<&Comment> {
        self.comments.values().flatten().find(|c| c.id.as_ref() == id)
    }

    pub fn find_comment_mut(&mut self, id: &str) -> Option<&mut Comment> {
        self.comments.values_mut().flatten().find(|c| c.id.as_ref() == id)
    }

    pub fn comment_exists(&self, id: &str) -> bool {
        self.find_comment(id).is_some()
    }

    pub fn add_comment(&mut self, comment: Comment) {
        let thread = self.comments.entry(comment.video_id.clone()).or_default();
        if comment.parent_comment_id.is_some() {
            thread.push(comment);
        } else {
            thread.insert(0, comment);
        }
    }

    /// Removes a comment and, for a top-level one, all of its replies.
    /// Returns the video id and the number of removed comments.
    pub fn delete_comment(&mut self, id: &str) -> Option<(Arc<str>, usize)> {
        let video_id = self.find_comment(id)?.video_id.clone();
        let thread = self.comments.get_mut(&video_id)?;
        let before = thread.len();
        thread.retain(|c| c.id.as_ref() != id && c.parent_comment_id.as_deref() != Some(id));
        let removed = before - thread.len();
        if thread.is_empty() {
            self.comments.remove(&video_id);
        }
        Some((video_id, removed))
    }

    /// Toggles a user's vote on a comment. The two membership sets stay
    /// mutually exclusive; voting the same way twice removes the vote.
    pub fn vote_comment(&mut self, id: &str, user_id: &Arc<str>, like: bool) -> Option<&Comment> {
        let comment = self.find_comment_mut(id)?;
        let (toggled, other) = if like {
            (&mut comment.likes, &mut comment.dislikes)
        } else {
            (&mut comment.dislikes, &mut comment.likes)
        };
        if let Some(pos) = toggled.iter().position(|u| u == user_id) {
            toggled.remove(pos);
        } else {
            other.retain(|u| u != user_id);
            toggled.push(user_id.clone());
        }
        Some(comment)
    }
}

pub struct Store {
    path: PathBuf,
    pub db: Database,
}

impl Store {
    /// Loads the store from disk; a missing file yields an empty store
    pub fn load(path: PathBuf) -> anyhow::Result<Store> {
        let db = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to deserialize contents of {}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Database::default(),
            Err(e) => {
                return Err(e).context(format!("Failed to read {}", path.display()));
            },
        };
        Ok(Store { path, db })
    }

    /// Writes the store back to disk, atomically via a temp file
    pub fn persist(&self) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&self.db).context("Failed to serialize the store")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move {} into place", tmp_path.display()))?;
        Ok(())
    }
}
