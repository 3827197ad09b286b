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
//! The application-state container.
//!
//! One [`UserDataStore`] holds the session and every collection; the UI
//! layer constructs exactly one and passes it down instead of reaching into
//! ambient globals. On sign-in the server's copy of each synchronized
//! collection replaces the local one wholesale - additions made while
//! anonymous are not merged (known limitation; they stay in the cache until
//! overwritten, they are not corrupted silently).

use std::rc::Rc;

use log::warn;
use metube_api::unsync::{LoginRequest, SignupRequest, VideoRef};

use crate::cache::LocalCache;
use crate::collections::*;
use crate::comments::Comments;
use crate::error::{CollectionError, RemoteError, RemoteErrorKind};
use crate::playlists::Playlists;
use crate::remote::Api;
use crate::session::Session;
use crate::utils::now_millis;

pub struct UserDataStore {
    api: Rc<Api>,
    session: Session,
    watch_later: WatchLater,
    history: History,
    liked_videos: LikedVideos,
    playlists: Playlists,
    search_history: SearchHistory,
    comments: Comments,
}

impl UserDataStore {
    pub fn new(api_base: reqwest::Url, cache: LocalCache) -> Self {
        let api = Api::new(api_base);
        let session = Session::restore(&cache);
        Self {
            watch_later: watch_later(&cache, &session, &api),
            history: history(&cache, &session, &api),
            liked_videos: liked_videos(&cache, &session, &api),
            playlists: Playlists::new(&cache, &session, &api),
            search_history: search_history(&cache, &session),
            comments: Comments::new(&session, &api),
            api,
            session,
        }
    }

    /// Store wired to the browser's localStorage and the default API base
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        Self::new(crate::constants::DEFAULT_API_BASE.clone(), LocalCache::browser())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn watch_later(&self) -> &WatchLater {
        &self.watch_later
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn liked_videos(&self) -> &LikedVideos {
        &self.liked_videos
    }

    pub fn playlists(&self) -> &Playlists {
        &self.playlists
    }

    pub fn search_history(&self) -> &SearchHistory {
        &self.search_history
    }

    pub fn comments(&self) -> &Comments {
        &self.comments
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        let auth = self.api.login(&LoginRequest {
            email: email.into(),
            password: password.into(),
        }).await?;
        self.session.authenticate(auth);
        self.load_from_remote().await;
        Ok(())
    }

    pub async fn signup(&self, email: &str, password: &str, username: &str) -> Result<(), RemoteError> {
        let auth = self.api.signup(&SignupRequest {
            email: email.into(),
            password: password.into(),
            username: username.into(),
        }).await?;
        self.session.authenticate(auth);
        self.load_from_remote().await;
        Ok(())
    }

    /// Back to anonymous mode; collections keep their last-known local data
    pub fn logout(&self) {
        self.session.logout();
    }

    /// Replaces every synchronized collection with the server's copy.
    ///
    /// Runs once per sign-in. On failure the local (possibly stale) data is
    /// kept and the error is only logged - a broken first fetch must not
    /// take the app down.
    pub async fn load_from_remote(&self) {
        let Some(token) = self.session.token() else {
            return;
        };
        match self.api.user_data(&token).await {
            Ok(data) => {
                self.watch_later.replace_all(data.watch_later);
                self.history.replace_all(data.history);
                self.liked_videos.replace_all(data.liked_videos);
                self.playlists.replace_all(data.playlists);
            },
            Err(err) => {
                warn!("Failed to load user data from the server, keeping local copies: {err}");
                if err.kind == RemoteErrorKind::Unauthorized {
                    self.session.expire();
                }
            },
        }
    }

    // Convenience wrappers that stamp timestamps at the boundary

    pub async fn add_to_watch_later(&self, video: &VideoRef) -> Result<(), CollectionError> {
        self.watch_later.add(metube_api::unsync::WatchLaterItem::from_video(video, now_millis())).await
    }

    pub async fn add_to_history(&self, video: &VideoRef) -> Result<(), CollectionError> {
        self.history.add(metube_api::unsync::HistoryItem::from_video(video, now_millis())).await
    }

    pub async fn add_to_liked_videos(&self, video: &VideoRef) -> Result<(), CollectionError> {
        self.liked_videos.add(metube_api::unsync::LikedVideoItem::from_video(video, now_millis())).await
    }

    pub async fn add_search_term(&self, term: &str) -> Result<(), CollectionError> {
        self.search_history.add(SearchTerm::new(term)).await
    }
}
