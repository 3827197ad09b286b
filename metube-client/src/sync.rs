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
//! The generic synchronized collection.
//!
//! One [`SyncedCollection`] keeps a named list consistent between the local
//! cache and the remote store: every mutation is applied to the local copy
//! synchronously (the optimistic update the UI sees immediately), then
//! confirmed against the server. A failed confirmation rolls the local copy
//! back to the pre-operation snapshot - exactly once, and only if no later
//! operation has moved the collection on in the meantime.
//!
//! Without a session (or without a remote binding - search history) the
//! local cache is the system of record and no requests are made.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::num::NonZeroUsize;
use std::rc::Rc;

use cloneable_errors::ErrorContext;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::LocalCache;
use crate::error::{CollectionError, RemoteError, RemoteErrorKind};
use crate::remote::RemoteCollection;
use crate::session::Session;

/// A record that can live in a [`SyncedCollection`]
pub trait CollectionRecord: Clone + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> &str;

    /// Whether this record is the one identified by `id`.
    /// Collections with fuzzier identity (search history) override this.
    fn matches(&self, id: &str) -> bool {
        self.id() == id
    }

    /// Shape check, run before any state is touched
    fn validate(&self) -> Result<(), ErrorContext> {
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Front,
    Back,
}

/// What `add` does when the id is already present
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRule {
    /// Fail with [`CollectionError::Duplicate`]; the collection is unchanged
    Reject,
    /// Drop the old entry and insert the new one at the configured position
    MoveToFront,
}

/// Per-collection ordering/dedupe/cap configuration.
/// Each concrete list is one of these values, not a code fork.
#[derive(Clone, Copy)]
pub struct CollectionPolicy {
    /// Entries beyond the cap are evicted from the far end after insertion
    pub cap: Option<NonZeroUsize>,
    pub insert: InsertPosition,
    pub on_duplicate: DuplicateRule,
}

/// Pre-operation snapshot captured by [`SyncedCollection::stage`].
/// Consumed by `commit`, which rolls it back on remote failure.
pub(crate) struct Staged<T> {
    snapshot: Vec<T>,
    revision: u64,
}

struct CollectionInner<T, R> {
    storage_key: &'static str,
    policy: CollectionPolicy,
    items: RefCell<Vec<T>>,
    /// Bumped on every local apply; rollbacks are skipped if the revision
    /// has moved past the staged one
    revision: Cell<u64>,
    cache: LocalCache,
    session: Session,
    remote: Option<R>,
}

pub struct SyncedCollection<T, R> {
    inner: Rc<CollectionInner<T, R>>,
}

impl<T, R> Clone for SyncedCollection<T, R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, R> SyncedCollection<T, R>
where
    T: CollectionRecord,
    R: RemoteCollection<T>,
{
    /// Creates the collection, seeding it from the local cache
    pub fn new(
        storage_key: &'static str,
        policy: CollectionPolicy,
        cache: LocalCache,
        session: Session,
        remote: Option<R>,
    ) -> Self {
        let items: Vec<T> = cache.read(storage_key);
        Self {
            inner: Rc::new(CollectionInner {
                storage_key,
                policy,
                items: RefCell::new(items),
                revision: Cell::new(0),
                cache,
                session,
                remote,
            }),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.items.borrow().iter().any(|item| item.matches(id))
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.items.borrow().iter().find(|item| item.matches(id)).cloned()
    }

    /// Adds an item under the collection's policy
    pub async fn add(&self, item: T) -> Result<(), CollectionError> {
        item.validate().map_err(CollectionError::Validation)?;
        let mut items = self.items();
        match (items.iter().position(|i| i.matches(item.id())), self.inner.policy.on_duplicate) {
            (Some(_), DuplicateRule::Reject) => {
                return Err(CollectionError::Duplicate { id: item.id().into() });
            },
            (Some(pos), DuplicateRule::MoveToFront) => {
                items.remove(pos);
            },
            (None, _) => {},
        }
        match self.inner.policy.insert {
            InsertPosition::Front => items.insert(0, item.clone()),
            InsertPosition::Back => items.push(item.clone()),
        }
        if let Some(cap) = self.inner.policy.cap {
            let cap = cap.get();
            if items.len() > cap {
                match self.inner.policy.insert {
                    InsertPosition::Front => items.truncate(cap),
                    InsertPosition::Back => {
                        items.drain(..items.len() - cap);
                    },
                }
            }
        }

        let staged = self.stage(items);
        let call = self.remote_session().map(|(remote, token)| async move {
            remote.insert(&token, &item).await
        });
        self.commit(staged, call).await
    }

    /// Removes an item by id. An absent id is a benign no-op.
    pub async fn remove(&self, id: &str) -> Result<(), CollectionError> {
        let mut items = self.items();
        let Some(pos) = items.iter().position(|i| i.matches(id)) else {
            return Ok(());
        };
        items.remove(pos);

        let staged = self.stage(items);
        let id: Rc<str> = id.into();
        let call = self.remote_session().map(|(remote, token)| async move {
            remote.remove(&token, &id).await
        });
        self.commit(staged, call).await
    }

    /// Empties the collection
    pub async fn clear(&self) -> Result<(), CollectionError> {
        if self.is_empty() {
            return Ok(());
        }
        let staged = self.stage(Vec::new());
        let call = self.remote_session().map(|(remote, token)| async move {
            remote.clear(&token).await
        });
        self.commit(staged, call).await
    }

    /// Replaces the local copy wholesale with the server's.
    /// Called once per session start; the server is authoritative.
    pub fn replace_all(&self, items: Vec<T>) {
        self.stage(items);
    }

    /// Applies `new_items` as the optimistic local state (memory + cache)
    /// and captures the pre-operation snapshot
    pub(crate) fn stage(&self, new_items: Vec<T>) -> Staged<T> {
        let snapshot = self.inner.items.replace(new_items);
        self.inner.revision.set(self.inner.revision.get() + 1);
        self.inner.cache.write(self.inner.storage_key, &*self.inner.items.borrow());
        Staged { snapshot, revision: self.inner.revision.get() }
    }

    /// Runs the remote half of a staged mutation.
    ///
    /// `None` means local-only mode (no session, or no remote binding) - the
    /// staged state simply stands. On failure the snapshot is rolled back
    /// exactly once, unless a later operation has already advanced the
    /// collection; a rejected credential additionally expires the session.
    pub(crate) async fn commit<Fut>(&self, staged: Staged<T>, remote_call: Option<Fut>) -> Result<(), CollectionError>
    where Fut: Future<Output = Result<(), RemoteError>>
    {
        let Some(call) = remote_call else {
            return Ok(());
        };
        match call.await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Remote sync of {} failed, rolling back: {err}", self.inner.storage_key);
                self.rollback(staged);
                if err.kind == RemoteErrorKind::Unauthorized {
                    self.inner.session.expire();
                }
                Err(CollectionError::RemoteSync(err))
            },
        }
    }

    pub(crate) fn remote_session(&self) -> Option<(&R, Rc<str>)> {
        let remote = self.inner.remote.as_ref()?;
        let token = self.inner.session.token()?;
        Some((remote, token))
    }

    fn rollback(&self, staged: Staged<T>) {
        if self.inner.revision.get() != staged.revision {
            // a later operation won; reverting now would clobber it
            warn!("Skipping rollback of {}: the collection has moved on", self.inner.storage_key);
            return;
        }
        self.inner.revision.set(self.inner.revision.get() + 1);
        *self.inner.items.borrow_mut() = staged.snapshot;
        self.inner.cache.write(self.inner.storage_key, &*self.inner.items.borrow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use futures::channel::oneshot;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use metube_api::unsync::{AuthResponse, User, WatchLaterItem};

    use crate::constants::KEY_WATCH_LATER;

    enum Behavior {
        Succeed,
        Fail(RemoteErrorKind),
        Wait(oneshot::Receiver<Result<(), RemoteError>>),
    }

    #[derive(Default)]
    struct MockRemote {
        script: RefCell<VecDeque<Behavior>>,
        calls: RefCell<Vec<String>>,
    }

    impl MockRemote {
        fn push(&self, behavior: Behavior) {
            self.script.borrow_mut().push_back(behavior);
        }

        async fn run(&self, call: String) -> Result<(), RemoteError> {
            self.calls.borrow_mut().push(call);
            let behavior = self.script.borrow_mut().pop_front();
            match behavior {
                None | Some(Behavior::Succeed) => Ok(()),
                Some(Behavior::Fail(kind)) => Err(RemoteError {
                    kind,
                    context: cloneable_errors::anyhow!("scripted failure"),
                }),
                Some(Behavior::Wait(receiver)) => receiver.await.expect("behavior sender dropped"),
            }
        }
    }

    impl<T: CollectionRecord> RemoteCollection<T> for Rc<MockRemote> {
        async fn insert(&self, _token: &str, item: &T) -> Result<(), RemoteError> {
            self.run(format!("insert {}", item.id())).await
        }

        async fn remove(&self, _token: &str, id: &str) -> Result<(), RemoteError> {
            self.run(format!("remove {id}")).await
        }

        async fn clear(&self, _token: &str) -> Result<(), RemoteError> {
            self.run("clear".to_owned()).await
        }
    }

    fn video(id: &str) -> WatchLaterItem {
        WatchLaterItem {
            id: id.into(),
            title: format!("Video {id}").into(),
            thumbnail: format!("https://img.example.com/{id}.jpg").into(),
            channel_title: "Some Channel".into(),
            added_at: 1_700_000_000_000,
        }
    }

    fn anonymous_session() -> (LocalCache, Session) {
        let cache = LocalCache::in_memory();
        let session = Session::restore(&cache);
        (cache, session)
    }

    fn authenticated_session() -> (LocalCache, Session) {
        let (cache, session) = anonymous_session();
        session.authenticate(AuthResponse {
            token: "test-token".into(),
            user: User {
                id: "user-1".into(),
                email: "user@example.com".into(),
                username: "user".into(),
            },
        });
        (cache, session)
    }

    fn watch_later_policy() -> CollectionPolicy {
        CollectionPolicy {
            cap: None,
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::Reject,
        }
    }

    fn collection(
        cache: &LocalCache,
        session: &Session,
        policy: CollectionPolicy,
        remote: Option<Rc<MockRemote>>,
    ) -> SyncedCollection<WatchLaterItem, Rc<MockRemote>> {
        SyncedCollection::new(KEY_WATCH_LATER, policy, cache.clone(), session.clone(), remote)
    }

    #[test]
    fn add_then_remove_restores_pre_add_state() {
        let (cache, session) = anonymous_session();
        let col = collection(&cache, &session, watch_later_policy(), None);

        block_on(col.add(video("dQw4w9WgXcQ"))).unwrap();
        assert!(col.contains("dQw4w9WgXcQ"));
        block_on(col.remove("dQw4w9WgXcQ")).unwrap();
        assert!(col.is_empty());
        assert!(cache.read::<Vec<WatchLaterItem>>(KEY_WATCH_LATER).is_empty());
    }

    #[test]
    fn duplicate_add_is_rejected_without_growing() {
        let (cache, session) = anonymous_session();
        let col = collection(&cache, &session, watch_later_policy(), None);

        block_on(col.add(video("dQw4w9WgXcQ"))).unwrap();
        let err = block_on(col.add(video("dQw4w9WgXcQ"))).unwrap_err();
        assert!(matches!(err, CollectionError::Duplicate { .. }));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn move_to_front_reorders_without_growing() {
        let (cache, session) = anonymous_session();
        let policy = CollectionPolicy {
            cap: NonZeroUsize::new(3),
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::MoveToFront,
        };
        let col = collection(&cache, &session, policy, None);

        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"] {
            block_on(col.add(video(id))).unwrap();
        }
        block_on(col.add(video("aaaaaaaaaaa"))).unwrap();
        let ids: Vec<_> = col.items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(&*ids[0], "aaaaaaaaaaa");
        assert_eq!(&*ids[1], "ccccccccccc");
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let (cache, session) = anonymous_session();
        let policy = CollectionPolicy {
            cap: NonZeroUsize::new(3),
            insert: InsertPosition::Front,
            on_duplicate: DuplicateRule::MoveToFront,
        };
        let col = collection(&cache, &session, policy, None);

        for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd"] {
            block_on(col.add(video(id))).unwrap();
        }
        assert_eq!(col.len(), 3);
        assert!(!col.contains("aaaaaaaaaaa"));
        assert!(col.contains("ddddddddddd"));
    }

    #[test]
    fn anonymous_mutations_skip_the_remote() {
        let (cache, session) = anonymous_session();
        let remote = Rc::new(MockRemote::default());
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        block_on(col.add(video("dQw4w9WgXcQ"))).unwrap();
        block_on(col.remove("dQw4w9WgXcQ")).unwrap();
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn successful_remote_sync_retains_the_item() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        block_on(col.add(video("dQw4w9WgXcQ"))).unwrap();
        assert!(col.contains("dQw4w9WgXcQ"));
        assert_eq!(*remote.calls.borrow(), vec!["insert dQw4w9WgXcQ".to_owned()]);
    }

    #[test]
    fn failed_remote_sync_reverts_the_item() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        remote.push(Behavior::Fail(RemoteErrorKind::Server));
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        let err = block_on(col.add(video("dQw4w9WgXcQ"))).unwrap_err();
        assert!(matches!(err, CollectionError::RemoteSync(_)));
        assert!(col.is_empty());
        assert!(cache.read::<Vec<WatchLaterItem>>(KEY_WATCH_LATER).is_empty());
    }

    #[test]
    fn failed_remove_reinserts_the_item() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        block_on(col.add(video("dQw4w9WgXcQ"))).unwrap();
        remote.push(Behavior::Fail(RemoteErrorKind::Server));
        let err = block_on(col.remove("dQw4w9WgXcQ")).unwrap_err();
        assert!(matches!(err, CollectionError::RemoteSync(_)));
        assert!(col.contains("dQw4w9WgXcQ"));
    }

    #[test]
    fn failed_clear_restores_everything() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        block_on(col.add(video("aaaaaaaaaaa"))).unwrap();
        block_on(col.add(video("bbbbbbbbbbb"))).unwrap();
        remote.push(Behavior::Fail(RemoteErrorKind::Server));
        assert!(block_on(col.clear()).is_err());
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn removing_an_absent_id_is_a_noop() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        block_on(col.remove("dQw4w9WgXcQ")).unwrap();
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn rejected_credential_expires_the_session() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        remote.push(Behavior::Fail(RemoteErrorKind::Unauthorized));
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        assert!(block_on(col.add(video("dQw4w9WgXcQ"))).is_err());
        assert!(!session.is_authenticated());
        // local data was still reverted
        assert!(col.is_empty());
    }

    #[test]
    fn replace_all_is_wholesale() {
        let (cache, session) = anonymous_session();
        let col = collection(&cache, &session, watch_later_policy(), None);

        block_on(col.add(video("aaaaaaaaaaa"))).unwrap();
        col.replace_all(vec![video("bbbbbbbbbbb"), video("ccccccccccc")]);
        assert!(!col.contains("aaaaaaaaaaa"));
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn late_failure_does_not_clobber_a_later_mutation() {
        let (cache, session) = authenticated_session();
        let remote = Rc::new(MockRemote::default());
        let (sender, receiver) = oneshot::channel();
        remote.push(Behavior::Wait(receiver));
        remote.push(Behavior::Succeed);
        let col = collection(&cache, &session, watch_later_policy(), Some(remote.clone()));

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        {
            let col = col.clone();
            spawner.spawn_local(async move {
                let _ = col.add(video("aaaaaaaaaaa")).await;
            }).unwrap();
        }
        pool.run_until_stalled();
        // first add is applied optimistically, suspended on the remote call
        assert!(col.contains("aaaaaaaaaaa"));

        {
            let col = col.clone();
            spawner.spawn_local(async move {
                col.add(video("bbbbbbbbbbb")).await.unwrap();
            }).unwrap();
        }
        pool.run_until_stalled();
        assert!(col.contains("bbbbbbbbbbb"));

        // the first operation now fails - its rollback must be skipped,
        // since the collection has been mutated since the snapshot
        sender.send(Err(RemoteError {
            kind: RemoteErrorKind::Server,
            context: cloneable_errors::anyhow!("scripted failure"),
        })).unwrap();
        pool.run_until_stalled();
        assert!(col.contains("bbbbbbbbbbb"));
    }
}
