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
//! The playlists manager: the plain list operations come from
//! [`SyncedCollection`]; the nested per-playlist mutations (rename, video
//! membership) go through the same stage/commit coordinator.

use std::rc::Rc;

use cloneable_errors::{anyhow, ErrorContext};
use metube_api::unsync::{Playlist, PlaylistRename, PlaylistVideo, VideoRef};
use uuid::Uuid;

use crate::cache::LocalCache;
use crate::collections::validate_video_ref;
use crate::constants::KEY_PLAYLISTS;
use crate::error::CollectionError;
use crate::remote::{Api, PlaylistsEndpoint, PlaylistsRemote};
use crate::session::Session;
use crate::sync::{CollectionPolicy, CollectionRecord, DuplicateRule, InsertPosition, SyncedCollection};

impl CollectionRecord for Playlist {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ErrorContext> {
        if self.name.trim().is_empty() {
            Err(anyhow!("Playlist names cannot be empty"))
        } else {
            Ok(())
        }
    }
}

pub struct Playlists<R = PlaylistsEndpoint> {
    list: SyncedCollection<Playlist, R>,
}

impl<R> Clone for Playlists<R> {
    fn clone(&self) -> Self {
        Self { list: self.list.clone() }
    }
}

impl Playlists {
    pub fn new(cache: &LocalCache, session: &Session, api: &Rc<Api>) -> Self {
        Self::with_remote(cache, session, Some(PlaylistsEndpoint::new(api.clone())))
    }
}

impl<R> Playlists<R>
where R: PlaylistsRemote
{
    pub fn with_remote(cache: &LocalCache, session: &Session, remote: Option<R>) -> Self {
        Self {
            list: SyncedCollection::new(
                KEY_PLAYLISTS,
                CollectionPolicy {
                    cap: None,
                    insert: InsertPosition::Front,
                    on_duplicate: DuplicateRule::Reject,
                },
                cache.clone(),
                session.clone(),
                remote,
            ),
        }
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.list.items()
    }

    pub fn get(&self, id: &str) -> Option<Playlist> {
        self.list.get(id)
    }

    /// Creates an empty playlist and returns its id
    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<Rc<str>, CollectionError> {
        let playlist = Playlist {
            id: Uuid::new_v4().to_string().into(),
            name: name.trim().into(),
            description: description.map(Into::into),
            videos: Vec::new(),
            created_at: crate::utils::now_millis(),
        };
        let id = playlist.id.clone();
        self.list.add(playlist).await?;
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> Result<(), CollectionError> {
        self.list.remove(id).await
    }

    /// Renames a playlist. Unlike removal, renaming a missing playlist is an
    /// error - there is nothing sensible to apply the new name to.
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<(), CollectionError> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(CollectionError::Validation(anyhow!("Playlist names cannot be empty")));
        }
        let mut items = self.list.items();
        let Some(playlist) = items.iter_mut().find(|p| p.id.as_ref() == id) else {
            return Err(CollectionError::NotFound { id: id.into() });
        };
        playlist.name = name.into();

        let staged = self.list.stage(items);
        let call = self.list.remote_session().map(|(remote, token)| {
            let id: Rc<str> = id.into();
            let body = PlaylistRename { name: name.into() };
            async move { remote.rename(&token, &id, &body).await }
        });
        self.list.commit(staged, call).await
    }

    pub async fn add_video(&self, playlist_id: &str, video: &VideoRef) -> Result<(), CollectionError> {
        validate_video_ref(video).map_err(CollectionError::Validation)?;
        let mut items = self.list.items();
        let Some(playlist) = items.iter_mut().find(|p| p.id.as_ref() == playlist_id) else {
            return Err(CollectionError::NotFound { id: playlist_id.into() });
        };
        if playlist.videos.iter().any(|v| v.id == video.id) {
            return Err(CollectionError::Duplicate { id: video.id.clone() });
        }
        let entry = PlaylistVideo::from_video(video, crate::utils::now_millis());
        playlist.videos.push(entry.clone());

        let staged = self.list.stage(items);
        let playlist_id: Rc<str> = playlist_id.into();
        let call = self.list.remote_session().map(|(remote, token)| async move {
            remote.insert_video(&token, &playlist_id, &entry).await
        });
        self.list.commit(staged, call).await
    }

    /// Removing from a missing playlist, or removing a video that isn't in
    /// it, is a benign no-op
    pub async fn remove_video(&self, playlist_id: &str, video_id: &str) -> Result<(), CollectionError> {
        let mut items = self.list.items();
        let Some(playlist) = items.iter_mut().find(|p| p.id.as_ref() == playlist_id) else {
            return Ok(());
        };
        let Some(pos) = playlist.videos.iter().position(|v| v.id.as_ref() == video_id) else {
            return Ok(());
        };
        playlist.videos.remove(pos);

        let staged = self.list.stage(items);
        let playlist_id: Rc<str> = playlist_id.into();
        let video_id: Rc<str> = video_id.into();
        let call = self.list.remote_session().map(|(remote, token)| async move {
            remote.remove_video(&token, &playlist_id, &video_id).await
        });
        self.list.commit(staged, call).await
    }

    /// Wholesale replacement with the server's copy on session start
    pub fn replace_all(&self, playlists: Vec<Playlist>) {
        self.list.replace_all(playlists);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use futures::executor::block_on;
    use metube_api::unsync::{AuthResponse, User};

    use crate::error::{RemoteError, RemoteErrorKind};
    use crate::remote::RemoteCollection;

    #[derive(Default)]
    struct MockRemote {
        fail: Cell<bool>,
        calls: RefCell<Vec<String>>,
    }

    impl MockRemote {
        fn run(&self, call: String) -> Result<(), RemoteError> {
            self.calls.borrow_mut().push(call);
            if self.fail.get() {
                Err(RemoteError {
                    kind: RemoteErrorKind::Server,
                    context: anyhow!("scripted failure"),
                })
            } else {
                Ok(())
            }
        }
    }

    impl RemoteCollection<Playlist> for Rc<MockRemote> {
        async fn insert(&self, _token: &str, item: &Playlist) -> Result<(), RemoteError> {
            self.run(format!("insert {}", item.id))
        }

        async fn remove(&self, _token: &str, id: &str) -> Result<(), RemoteError> {
            self.run(format!("remove {id}"))
        }

        async fn clear(&self, _token: &str) -> Result<(), RemoteError> {
            self.run("clear".to_owned())
        }
    }

    impl PlaylistsRemote for Rc<MockRemote> {
        async fn rename(&self, _token: &str, id: &str, body: &PlaylistRename) -> Result<(), RemoteError> {
            self.run(format!("rename {id} to {}", body.name))
        }

        async fn insert_video(&self, _token: &str, playlist_id: &str, video: &PlaylistVideo) -> Result<(), RemoteError> {
            self.run(format!("insert_video {playlist_id}/{}", video.id))
        }

        async fn remove_video(&self, _token: &str, playlist_id: &str, video_id: &str) -> Result<(), RemoteError> {
            self.run(format!("remove_video {playlist_id}/{video_id}"))
        }
    }

    fn video(id: &str) -> VideoRef {
        VideoRef {
            id: id.into(),
            title: format!("Video {id}").into(),
            thumbnail: format!("https://img.example.com/{id}.jpg").into(),
            channel_title: "Some Channel".into(),
        }
    }

    fn anonymous() -> (Session, Playlists<Rc<MockRemote>>, Rc<MockRemote>) {
        let cache = LocalCache::in_memory();
        let session = Session::restore(&cache);
        let remote = Rc::new(MockRemote::default());
        let playlists = Playlists::with_remote(&cache, &session, Some(remote.clone()));
        (session, playlists, remote)
    }

    fn authenticated() -> (Session, Playlists<Rc<MockRemote>>, Rc<MockRemote>) {
        let (session, playlists, remote) = anonymous();
        session.authenticate(AuthResponse {
            token: "test-token".into(),
            user: User {
                id: "user-1".into(),
                email: "user@example.com".into(),
                username: "user".into(),
            },
        });
        (session, playlists, remote)
    }

    #[test]
    fn create_prepends_an_empty_playlist() {
        let (_session, playlists, remote) = anonymous();

        let first = block_on(playlists.create("First", None)).unwrap();
        let second = block_on(playlists.create("Second", Some("desc"))).unwrap();
        let items = playlists.playlists();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second);
        assert_eq!(items[1].id, first);
        assert!(items[0].videos.is_empty());
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn create_rejects_blank_names() {
        let (_session, playlists, _remote) = anonymous();
        let err = block_on(playlists.create("   ", None)).unwrap_err();
        assert!(matches!(err, CollectionError::Validation(_)));
        assert!(playlists.playlists().is_empty());
    }

    #[test]
    fn rename_updates_the_local_copy() {
        let (_session, playlists, _remote) = anonymous();
        let id = block_on(playlists.create("Old name", None)).unwrap();

        block_on(playlists.rename(&id, "New name")).unwrap();
        assert_eq!(&*playlists.get(&id).unwrap().name, "New name");
    }

    #[test]
    fn rename_of_a_missing_playlist_is_an_error() {
        let (_session, playlists, _remote) = anonymous();
        let err = block_on(playlists.rename("missing", "whatever")).unwrap_err();
        assert!(matches!(err, CollectionError::NotFound { .. }));
    }

    #[test]
    fn rename_syncs_remotely_when_signed_in() {
        let (_session, playlists, remote) = authenticated();
        let id = block_on(playlists.create("Old name", None)).unwrap();

        block_on(playlists.rename(&id, "New name")).unwrap();
        assert!(remote.calls.borrow().iter().any(|c| c.starts_with("rename")));
    }

    #[test]
    fn failed_rename_reverts_the_name() {
        let (_session, playlists, remote) = authenticated();
        let id = block_on(playlists.create("Old name", None)).unwrap();

        remote.fail.set(true);
        let err = block_on(playlists.rename(&id, "New name")).unwrap_err();
        assert!(matches!(err, CollectionError::RemoteSync(_)));
        assert_eq!(&*playlists.get(&id).unwrap().name, "Old name");
    }

    #[test]
    fn add_video_appends_and_rejects_duplicates() {
        let (_session, playlists, _remote) = anonymous();
        let id = block_on(playlists.create("Mix", None)).unwrap();

        block_on(playlists.add_video(&id, &video("aaaaaaaaaaa"))).unwrap();
        block_on(playlists.add_video(&id, &video("bbbbbbbbbbb"))).unwrap();
        let err = block_on(playlists.add_video(&id, &video("aaaaaaaaaaa"))).unwrap_err();
        assert!(matches!(err, CollectionError::Duplicate { .. }));

        let playlist = playlists.get(&id).unwrap();
        assert_eq!(playlist.videos.len(), 2);
        assert_eq!(&*playlist.videos[0].id, "aaaaaaaaaaa");
        assert_eq!(&*playlist.videos[1].id, "bbbbbbbbbbb");
    }

    #[test]
    fn failed_add_video_reverts_the_membership() {
        let (_session, playlists, remote) = authenticated();
        let id = block_on(playlists.create("Mix", None)).unwrap();

        remote.fail.set(true);
        let err = block_on(playlists.add_video(&id, &video("aaaaaaaaaaa"))).unwrap_err();
        assert!(matches!(err, CollectionError::RemoteSync(_)));
        assert!(playlists.get(&id).unwrap().videos.is_empty());
    }

    #[test]
    fn remove_video_tolerates_missing_targets() {
        let (_session, playlists, remote) = authenticated();
        let id = block_on(playlists.create("Mix", None)).unwrap();

        block_on(playlists.remove_video(&id, "aaaaaaaaaaa")).unwrap();
        block_on(playlists.remove_video("missing", "aaaaaaaaaaa")).unwrap();
        // no remote traffic for either no-op
        assert_eq!(remote.calls.borrow().iter().filter(|c| c.starts_with("remove_video")).count(), 0);
    }

    #[test]
    fn delete_removes_the_playlist() {
        let (_session, playlists, _remote) = anonymous();
        let id = block_on(playlists.create("Mix", None)).unwrap();
        block_on(playlists.delete(&id)).unwrap();
        assert!(playlists.playlists().is_empty());
    }
}
