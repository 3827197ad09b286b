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
//! The concrete synchronized lists: watch later, watch history, liked
//! videos and search history. Each one is a [`CollectionPolicy`] value over
//! the generic manager; playlists and comments have their own modules.

use std::num::NonZeroUsize;
use std::rc::Rc;

use cloneable_errors::{anyhow, ErrorContext};
use metube_api::unsync::{HistoryItem, LikedVideoItem, VideoRef, WatchLaterItem};
use serde::{Deserialize, Serialize};

use crate::cache::LocalCache;
use crate::constants::*;
use crate::remote::{Api, ListEndpoint};
use crate::session::Session;
use crate::sync::{CollectionPolicy, CollectionRecord, DuplicateRule, InsertPosition, SyncedCollection};

pub type WatchLater = SyncedCollection<WatchLaterItem, ListEndpoint<WatchLaterItem>>;
pub type History = SyncedCollection<HistoryItem, ListEndpoint<HistoryItem>>;
pub type LikedVideos = SyncedCollection<LikedVideoItem, ListEndpoint<LikedVideoItem>>;
pub type SearchHistory = SyncedCollection<SearchTerm, ListEndpoint<SearchTerm>>;

fn validate_video_id(id: &str) -> Result<(), ErrorContext> {
    if VIDEO_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(anyhow!("'{id}' is not a valid video id"))
    }
}

impl CollectionRecord for WatchLaterItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ErrorContext> {
        validate_video_id(&self.id)
    }
}

impl CollectionRecord for HistoryItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ErrorContext> {
        validate_video_id(&self.id)
    }
}

impl CollectionRecord for LikedVideoItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ErrorContext> {
        validate_video_id(&self.id)
    }
}

/// One search history entry. Identity is the term itself, compared
/// case-insensitively, so re-searching "Rust" moves "rust" to the front.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchTerm(pub Rc<str>);

impl SearchTerm {
    /// Builds a trimmed term. Validation rejects terms that trim to nothing.
    pub fn new(term: &str) -> Self {
        Self(term.trim().into())
    }
}

impl CollectionRecord for SearchTerm {
    fn id(&self) -> &str {
        &self.0
    }

    fn matches(&self, id: &str) -> bool {
        self.0.eq_ignore_ascii_case(id)
    }

    fn validate(&self) -> Result<(), ErrorContext> {
        if self.0.is_empty() {
            Err(anyhow!("Search terms cannot be empty"))
        } else {
            Ok(())
        }
    }
}

pub fn watch_later(cache: &LocalCache, session: &Session, api: &Rc<Api>) -> WatchLater {
    SyncedCollection::new(
        KEY_WATCH_LATER,
        CollectionPolicy {
            cap: None,
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::Reject,
        },
        cache.clone(),
        session.clone(),
        Some(ListEndpoint::new(api.clone(), "watch-later")),
    )
}

pub fn history(cache: &LocalCache, session: &Session, api: &Rc<Api>) -> History {
    SyncedCollection::new(
        KEY_HISTORY,
        CollectionPolicy {
            cap: NonZeroUsize::new(HISTORY_CAP),
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::MoveToFront,
        },
        cache.clone(),
        session.clone(),
        Some(ListEndpoint::new(api.clone(), "history")),
    )
}

pub fn liked_videos(cache: &LocalCache, session: &Session, api: &Rc<Api>) -> LikedVideos {
    SyncedCollection::new(
        KEY_LIKED_VIDEOS,
        CollectionPolicy {
            cap: None,
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::Reject,
        },
        cache.clone(),
        session.clone(),
        Some(ListEndpoint::new(api.clone(), "liked-videos")),
    )
}

/// Search history never syncs - it stays on the device
pub fn search_history(cache: &LocalCache, session: &Session) -> SearchHistory {
    SyncedCollection::new(
        KEY_SEARCH_HISTORY,
        CollectionPolicy {
            cap: NonZeroUsize::new(SEARCH_HISTORY_CAP),
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::MoveToFront,
        },
        cache.clone(),
        session.clone(),
        None,
    )
}

/// Entries of `history` matching a partial query, for the search dropdown
pub fn filtered_history(history: &SearchHistory, query: &str) -> Vec<SearchTerm> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return history.items();
    }
    history.items().into_iter()
        .filter(|term| term.0.to_lowercase().contains(&query))
        .collect()
}

pub(crate) fn validate_video_ref(video: &VideoRef) -> Result<(), ErrorContext> {
    validate_video_id(&video.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    use crate::error::CollectionError;
    use crate::utils::now_millis;

    fn setup() -> (LocalCache, Session) {
        let cache = LocalCache::in_memory();
        let session = Session::restore(&cache);
        (cache, session)
    }

    fn video(n: usize) -> VideoRef {
        VideoRef {
            id: format!("video{n:06}").into(),
            title: format!("Video #{n}").into(),
            thumbnail: format!("https://img.example.com/{n}.jpg").into(),
            channel_title: "Some Channel".into(),
        }
    }

    #[test]
    fn history_is_capped_at_100_most_recent() {
        let (cache, session) = setup();
        let api = Api::new(DEFAULT_API_BASE.clone());
        let col = history(&cache, &session, &api);

        for n in 0..105 {
            block_on(col.add(HistoryItem::from_video(&video(n), now_millis()))).unwrap();
        }
        let items = col.items();
        assert_eq!(items.len(), 100);
        // most recent first, oldest five evicted
        assert_eq!(&*items[0].id, "video000104");
        assert_eq!(&*items[99].id, "video000005");
    }

    #[test]
    fn rewatching_moves_to_front_without_growing() {
        let (cache, session) = setup();
        let api = Api::new(DEFAULT_API_BASE.clone());
        let col = history(&cache, &session, &api);

        for n in 0..3 {
            block_on(col.add(HistoryItem::from_video(&video(n), now_millis()))).unwrap();
        }
        block_on(col.add(HistoryItem::from_video(&video(1), now_millis()))).unwrap();
        let items = col.items();
        assert_eq!(items.len(), 3);
        assert_eq!(&*items[0].id, "video000001");
    }

    #[test]
    fn invalid_video_id_fails_validation() {
        let (cache, session) = setup();
        let api = Api::new(DEFAULT_API_BASE.clone());
        let col = watch_later(&cache, &session, &api);

        let bad = WatchLaterItem {
            id: "nope".into(),
            title: "Bad".into(),
            thumbnail: "https://img.example.com/bad.jpg".into(),
            channel_title: "Some Channel".into(),
            added_at: now_millis(),
        };
        let err = block_on(col.add(bad)).unwrap_err();
        assert!(matches!(err, CollectionError::Validation(_)));
        assert!(col.is_empty());
    }

    #[test]
    fn search_history_dedupes_case_insensitively() {
        let (cache, session) = setup();
        let col = search_history(&cache, &session);

        block_on(col.add(SearchTerm::new("rust tutorials"))).unwrap();
        block_on(col.add(SearchTerm::new("cooking"))).unwrap();
        block_on(col.add(SearchTerm::new("Rust Tutorials"))).unwrap();
        let items = col.items();
        assert_eq!(items.len(), 2);
        assert_eq!(&*items[0].0, "Rust Tutorials");
    }

    #[test]
    fn search_history_trims_and_rejects_empty_terms() {
        let (cache, session) = setup();
        let col = search_history(&cache, &session);

        block_on(col.add(SearchTerm::new("  spaced out  "))).unwrap();
        assert_eq!(&*col.items()[0].0, "spaced out");

        let err = block_on(col.add(SearchTerm::new("   "))).unwrap_err();
        assert!(matches!(err, CollectionError::Validation(_)));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn search_history_caps_at_20() {
        let (cache, session) = setup();
        let col = search_history(&cache, &session);

        for n in 0..25 {
            block_on(col.add(SearchTerm::new(&format!("query {n}")))).unwrap();
        }
        assert_eq!(col.len(), 20);
        assert!(!col.contains("query 0"));
        assert!(col.contains("query 24"));
    }

    #[test]
    fn filtered_history_matches_substrings() {
        let (cache, session) = setup();
        let col = search_history(&cache, &session);

        block_on(col.add(SearchTerm::new("rust tutorials"))).unwrap();
        block_on(col.add(SearchTerm::new("cooking show"))).unwrap();

        let hits = filtered_history(&col, "RUST");
        assert_eq!(hits.len(), 1);
        assert_eq!(&*hits[0].0, "rust tutorials");
        assert_eq!(filtered_history(&col, "").len(), 2);
    }
}
