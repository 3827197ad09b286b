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
//! Per-video comment threads.
//!
//! Threads live in memory only (they are shared data, not personal data, so
//! they are never cached across restarts) and follow the same
//! optimistic-apply/rollback protocol as the synchronized lists, keyed by
//! video. Reads are public; every mutation requires a session. One level of
//! nesting: a reply always targets a top-level comment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use cloneable_errors::anyhow;
use log::warn;
use metube_api::unsync::{Comment, CommentEdit, NewComment, User};
use uuid::Uuid;

use crate::constants::COMMENT_MAX_LEN;
use crate::error::{CollectionError, RemoteError, RemoteErrorKind};
use crate::remote::{Api, CommentVote, CommentsEndpoint, CommentsRemote};
use crate::session::Session;
use crate::utils::now_millis;

#[derive(Default)]
struct Thread {
    comments: Vec<Comment>,
    revision: u64,
}

struct StagedThread {
    video_id: Rc<str>,
    snapshot: Vec<Comment>,
    revision: u64,
}

struct CommentsInner<R> {
    threads: RefCell<HashMap<Rc<str>, Thread>>,
    session: Session,
    remote: R,
}

pub struct Comments<R = CommentsEndpoint> {
    inner: Rc<CommentsInner<R>>,
}

impl<R> Clone for Comments<R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

fn validate_text(text: &str) -> Result<(), CollectionError> {
    if text.trim().is_empty() {
        Err(CollectionError::Validation(anyhow!("Comments cannot be empty")))
    } else if text.chars().count() > COMMENT_MAX_LEN {
        Err(CollectionError::Validation(anyhow!("Comments are limited to {COMMENT_MAX_LEN} characters")))
    } else {
        Ok(())
    }
}

impl Comments {
    pub fn new(session: &Session, api: &Rc<Api>) -> Self {
        Self::with_remote(session, CommentsEndpoint::new(api.clone()))
    }
}

impl<R> Comments<R>
where R: CommentsRemote
{
    pub fn with_remote(session: &Session, remote: R) -> Self {
        Self {
            inner: Rc::new(CommentsInner {
                threads: RefCell::new(HashMap::new()),
                session: session.clone(),
                remote,
            }),
        }
    }

    /// The locally known thread for a video, flat (replies carry
    /// `parent_comment_id`)
    pub fn comments(&self, video_id: &str) -> Vec<Comment> {
        self.inner.threads.borrow()
            .get(video_id)
            .map(|thread| thread.comments.clone())
            .unwrap_or_default()
    }

    /// Loads a video's thread from the server, replacing the local copy.
    /// On failure the previously loaded thread (if any) is kept.
    pub async fn fetch(&self, video_id: &str) -> Result<Vec<Comment>, CollectionError> {
        match self.inner.remote.fetch(video_id).await {
            Ok(comments) => {
                self.apply(video_id, comments.clone());
                Ok(comments)
            },
            Err(err) => Err(CollectionError::RemoteSync(err)),
        }
    }

    /// Posts a comment, or a reply when `parent_comment_id` is given.
    /// Returns the server's canonical copy.
    pub async fn add(&self, video_id: &str, text: &str, parent_comment_id: Option<&str>) -> Result<Comment, CollectionError> {
        let (token, user) = self.credentials()?;
        validate_text(text)?;

        let mut comments = self.comments(video_id);
        if let Some(parent_id) = parent_comment_id {
            let parent_is_top_level = comments.iter()
                .any(|c| c.id.as_ref() == parent_id && c.parent_comment_id.is_none());
            if !parent_is_top_level {
                return Err(CollectionError::Validation(anyhow!("Replies must target an existing top-level comment")));
            }
        }

        let now = now_millis();
        let comment = Comment {
            id: Uuid::new_v4().to_string().into(),
            video_id: video_id.into(),
            user_id: user.id,
            username: user.username,
            text: text.into(),
            parent_comment_id: parent_comment_id.map(Into::into),
            likes: Vec::new(),
            dislikes: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        };
        if comment.parent_comment_id.is_some() {
            comments.push(comment.clone());
        } else {
            comments.insert(0, comment.clone());
        }

        let staged = self.apply(video_id, comments);
        let body = NewComment {
            id: comment.id.clone(),
            video_id: comment.video_id.clone(),
            text: comment.text.clone(),
            parent_comment_id: comment.parent_comment_id.clone(),
        };
        let canonical = self.commit(staged, self.inner.remote.post(&token, &body)).await?;
        self.reconcile(video_id, canonical.clone());
        Ok(canonical)
    }

    /// Edits one of the current user's comments
    pub async fn edit(&self, video_id: &str, comment_id: &str, text: &str) -> Result<Comment, CollectionError> {
        let (token, user) = self.credentials()?;
        validate_text(text)?;

        let mut comments = self.comments(video_id);
        let Some(comment) = comments.iter_mut().find(|c| c.id.as_ref() == comment_id) else {
            return Err(CollectionError::NotFound { id: comment_id.into() });
        };
        if comment.user_id != user.id {
            return Err(CollectionError::Auth);
        }
        comment.text = text.into();
        comment.is_edited = true;
        comment.updated_at = now_millis();

        let staged = self.apply(video_id, comments);
        let body = CommentEdit { text: text.into() };
        let canonical = self.commit(staged, self.inner.remote.edit(&token, comment_id, &body)).await?;
        self.reconcile(video_id, canonical.clone());
        Ok(canonical)
    }

    /// Deletes one of the current user's comments. Deleting a top-level
    /// comment takes its replies with it; a missing target is a no-op.
    pub async fn delete(&self, video_id: &str, comment_id: &str) -> Result<(), CollectionError> {
        let (token, user) = self.credentials()?;

        let comments = self.comments(video_id);
        let Some(target) = comments.iter().find(|c| c.id.as_ref() == comment_id) else {
            return Ok(());
        };
        if target.user_id != user.id {
            return Err(CollectionError::Auth);
        }
        let remaining = comments.into_iter()
            .filter(|c| c.id.as_ref() != comment_id && c.parent_comment_id.as_deref() != Some(comment_id))
            .collect();

        let staged = self.apply(video_id, remaining);
        self.commit(staged, self.inner.remote.delete(&token, comment_id)).await
    }

    pub async fn like(&self, video_id: &str, comment_id: &str) -> Result<Comment, CollectionError> {
        self.vote(video_id, comment_id, CommentVote::Like).await
    }

    pub async fn dislike(&self, video_id: &str, comment_id: &str) -> Result<Comment, CollectionError> {
        self.vote(video_id, comment_id, CommentVote::Dislike).await
    }

    async fn vote(&self, video_id: &str, comment_id: &str, vote: CommentVote) -> Result<Comment, CollectionError> {
        let (token, user) = self.credentials()?;

        let mut comments = self.comments(video_id);
        let Some(comment) = comments.iter_mut().find(|c| c.id.as_ref() == comment_id) else {
            return Err(CollectionError::NotFound { id: comment_id.into() });
        };
        // recompute both membership sets; voting again toggles off, voting
        // the other way moves the user across. The sets are what gets
        // applied, not count deltas, so repeated syncs cannot drift.
        let uid = user.id;
        let (toggled, other) = match vote {
            CommentVote::Like => (&mut comment.likes, &mut comment.dislikes),
            CommentVote::Dislike => (&mut comment.dislikes, &mut comment.likes),
        };
        if let Some(pos) = toggled.iter().position(|u| *u == uid) {
            toggled.remove(pos);
        } else {
            other.retain(|u| *u != uid);
            toggled.push(uid);
        }

        let staged = self.apply(video_id, comments);
        let canonical = self.commit(staged, self.inner.remote.vote(&token, comment_id, vote)).await?;
        self.reconcile(video_id, canonical.clone());
        Ok(canonical)
    }

    fn credentials(&self) -> Result<(Rc<str>, User), CollectionError> {
        match (self.inner.session.token(), self.inner.session.user()) {
            (Some(token), Some(user)) => Ok((token, user)),
            _ => Err(CollectionError::Auth),
        }
    }

    fn apply(&self, video_id: &str, comments: Vec<Comment>) -> StagedThread {
        let mut threads = self.inner.threads.borrow_mut();
        let thread = threads.entry(video_id.into()).or_default();
        let snapshot = std::mem::replace(&mut thread.comments, comments);
        thread.revision += 1;
        StagedThread {
            video_id: video_id.into(),
            snapshot,
            revision: thread.revision,
        }
    }

    fn rollback(&self, staged: StagedThread) {
        let mut threads = self.inner.threads.borrow_mut();
        let Some(thread) = threads.get_mut(&staged.video_id) else {
            return;
        };
        if thread.revision != staged.revision {
            // a later operation won; reverting now would clobber it
            warn!("Skipping comment rollback for video {}: the thread has moved on", staged.video_id);
            return;
        }
        thread.comments = staged.snapshot;
        thread.revision += 1;
    }

    /// Replaces the optimistic copy of one comment with the server's
    /// canonical copy, if it is still present
    fn reconcile(&self, video_id: &str, canonical: Comment) {
        let mut threads = self.inner.threads.borrow_mut();
        let Some(thread) = threads.get_mut(video_id) else {
            return;
        };
        if let Some(slot) = thread.comments.iter_mut().find(|c| c.id == canonical.id) {
            *slot = canonical;
            thread.revision += 1;
        }
    }

    async fn commit<Fut, Out>(&self, staged: StagedThread, call: Fut) -> Result<Out, CollectionError>
    where Fut: Future<Output = Result<Out, RemoteError>>
    {
        match call.await {
            Ok(out) => Ok(out),
            Err(err) => {
                warn!("Remote sync of comments on video {} failed, rolling back: {err}", staged.video_id);
                self.rollback(staged);
                if err.kind == RemoteErrorKind::Unauthorized {
                    self.inner.session.expire();
                }
                Err(CollectionError::RemoteSync(err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    use futures::executor::block_on;
    use metube_api::unsync::AuthResponse;

    use crate::cache::LocalCache;

    #[derive(Default)]
    struct MockRemote {
        fail: Cell<bool>,
        calls: RefCell<Vec<String>>,
        fetch_result: RefCell<Vec<Comment>>,
        /// Scripted canonical copies returned by edit/vote, oldest first
        responses: RefCell<VecDeque<Comment>>,
    }

    impl MockRemote {
        fn check(&self, call: String) -> Result<(), RemoteError> {
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

    impl CommentsRemote for Rc<MockRemote> {
        async fn fetch(&self, video_id: &str) -> Result<Vec<Comment>, RemoteError> {
            self.check(format!("fetch {video_id}"))?;
            Ok(self.fetch_result.borrow().clone())
        }

        async fn post(&self, _token: &str, comment: &NewComment) -> Result<Comment, RemoteError> {
            self.check(format!("post {}", comment.id))?;
            let now = 1_700_000_000_000;
            Ok(Comment {
                id: comment.id.clone(),
                video_id: comment.video_id.clone(),
                user_id: "user-1".into(),
                username: "user".into(),
                text: comment.text.clone(),
                parent_comment_id: comment.parent_comment_id.clone(),
                likes: Vec::new(),
                dislikes: Vec::new(),
                is_edited: false,
                created_at: now,
                updated_at: now,
            })
        }

        async fn edit(&self, _token: &str, id: &str, _body: &CommentEdit) -> Result<Comment, RemoteError> {
            self.check(format!("edit {id}"))?;
            Ok(self.responses.borrow_mut().pop_front().expect("no scripted edit response"))
        }

        async fn delete(&self, _token: &str, id: &str) -> Result<(), RemoteError> {
            self.check(format!("delete {id}"))
        }

        async fn vote(&self, _token: &str, id: &str, vote: CommentVote) -> Result<Comment, RemoteError> {
            let verb = match vote {
                CommentVote::Like => "like",
                CommentVote::Dislike => "dislike",
            };
            self.check(format!("{verb} {id}"))?;
            Ok(self.responses.borrow_mut().pop_front().expect("no scripted vote response"))
        }
    }

    const VIDEO: &str = "dQw4w9WgXcQ";

    fn comment(id: &str, user_id: &str, parent: Option<&str>) -> Comment {
        Comment {
            id: id.into(),
            video_id: VIDEO.into(),
            user_id: user_id.into(),
            username: user_id.into(),
            text: format!("comment {id}").into(),
            parent_comment_id: parent.map(Into::into),
            likes: Vec::new(),
            dislikes: Vec::new(),
            is_edited: false,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    fn anonymous() -> (Session, Comments<Rc<MockRemote>>, Rc<MockRemote>) {
        let cache = LocalCache::in_memory();
        let session = Session::restore(&cache);
        let remote = Rc::new(MockRemote::default());
        let comments = Comments::with_remote(&session, remote.clone());
        (session, comments, remote)
    }

    fn signed_in() -> (Session, Comments<Rc<MockRemote>>, Rc<MockRemote>) {
        let (session, comments, remote) = anonymous();
        session.authenticate(AuthResponse {
            token: "test-token".into(),
            user: User {
                id: "user-1".into(),
                email: "user@example.com".into(),
                username: "user".into(),
            },
        });
        (session, comments, remote)
    }

    #[test]
    fn mutations_require_a_session() {
        let (_session, comments, remote) = anonymous();
        let err = block_on(comments.add(VIDEO, "hello", None)).unwrap_err();
        assert!(matches!(err, CollectionError::Auth));
        assert!(comments.comments(VIDEO).is_empty());
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn text_limits_are_enforced_before_any_state_change() {
        let (_session, comments, remote) = signed_in();
        assert!(matches!(
            block_on(comments.add(VIDEO, "   ", None)).unwrap_err(),
            CollectionError::Validation(_)
        ));
        assert!(matches!(
            block_on(comments.add(VIDEO, &"x".repeat(1001), None)).unwrap_err(),
            CollectionError::Validation(_)
        ));
        assert!(comments.comments(VIDEO).is_empty());
        assert!(remote.calls.borrow().is_empty());
    }

    #[test]
    fn top_level_comments_prepend_and_replies_append() {
        let (_session, comments, _remote) = signed_in();
        let first = block_on(comments.add(VIDEO, "first", None)).unwrap();
        let second = block_on(comments.add(VIDEO, "second", None)).unwrap();
        let reply = block_on(comments.add(VIDEO, "a reply", Some(&first.id))).unwrap();

        let thread = comments.comments(VIDEO);
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].id, second.id);
        assert_eq!(thread[1].id, first.id);
        assert_eq!(thread[2].id, reply.id);
        assert_eq!(reply.parent_comment_id.as_deref(), Some(&*first.id));
    }

    #[test]
    fn replies_to_replies_are_rejected() {
        let (_session, comments, _remote) = signed_in();
        let top = block_on(comments.add(VIDEO, "top", None)).unwrap();
        let reply = block_on(comments.add(VIDEO, "reply", Some(&top.id))).unwrap();

        let err = block_on(comments.add(VIDEO, "nested", Some(&reply.id))).unwrap_err();
        assert!(matches!(err, CollectionError::Validation(_)));
        assert_eq!(comments.comments(VIDEO).len(), 2);
    }

    #[test]
    fn failed_post_reverts_the_thread() {
        let (_session, comments, remote) = signed_in();
        remote.fail.set(true);
        let err = block_on(comments.add(VIDEO, "hello", None)).unwrap_err();
        assert!(matches!(err, CollectionError::RemoteSync(_)));
        assert!(comments.comments(VIDEO).is_empty());
    }

    #[test]
    fn deleting_a_top_level_comment_cascades_to_replies() {
        let (_session, comments, remote) = signed_in();
        remote.fetch_result.replace(vec![
            comment("c1", "user-1", None),
            comment("c2", "someone-else", None),
            comment("r1", "someone-else", Some("c1")),
            comment("r2", "user-1", Some("c1")),
        ]);
        block_on(comments.fetch(VIDEO)).unwrap();

        block_on(comments.delete(VIDEO, "c1")).unwrap();
        let thread = comments.comments(VIDEO);
        assert_eq!(thread.len(), 1);
        assert_eq!(&*thread[0].id, "c2");
    }

    #[test]
    fn foreign_comments_cannot_be_deleted_or_edited() {
        let (_session, comments, remote) = signed_in();
        remote.fetch_result.replace(vec![comment("c1", "someone-else", None)]);
        block_on(comments.fetch(VIDEO)).unwrap();

        assert!(matches!(
            block_on(comments.delete(VIDEO, "c1")).unwrap_err(),
            CollectionError::Auth
        ));
        assert!(matches!(
            block_on(comments.edit(VIDEO, "c1", "hijacked")).unwrap_err(),
            CollectionError::Auth
        ));
        assert_eq!(comments.comments(VIDEO).len(), 1);
        // neither mutation reached the remote
        assert_eq!(remote.calls.borrow().len(), 1);
    }

    #[test]
    fn liking_while_disliked_moves_the_user_across() {
        let (_session, comments, remote) = signed_in();
        let mut seeded = comment("c1", "someone-else", None);
        seeded.dislikes = vec!["user-1".into(), "other".into()];
        remote.fetch_result.replace(vec![seeded]);
        block_on(comments.fetch(VIDEO)).unwrap();

        let mut canonical = comment("c1", "someone-else", None);
        canonical.likes = vec!["user-1".into()];
        canonical.dislikes = vec!["other".into()];
        remote.responses.borrow_mut().push_back(canonical);

        let updated = block_on(comments.like(VIDEO, "c1")).unwrap();
        assert_eq!(updated.likes.len(), 1);
        assert_eq!(updated.dislikes.len(), 1);
        let local = &comments.comments(VIDEO)[0];
        assert!(local.likes.iter().any(|u| &**u == "user-1"));
        assert!(!local.dislikes.iter().any(|u| &**u == "user-1"));
    }

    #[test]
    fn liking_twice_toggles_back_off() {
        let (_session, comments, remote) = signed_in();
        remote.fetch_result.replace(vec![comment("c1", "someone-else", None)]);
        block_on(comments.fetch(VIDEO)).unwrap();

        let mut liked = comment("c1", "someone-else", None);
        liked.likes = vec!["user-1".into()];
        remote.responses.borrow_mut().push_back(liked);
        remote.responses.borrow_mut().push_back(comment("c1", "someone-else", None));

        block_on(comments.like(VIDEO, "c1")).unwrap();
        assert_eq!(comments.comments(VIDEO)[0].likes.len(), 1);
        block_on(comments.like(VIDEO, "c1")).unwrap();
        assert!(comments.comments(VIDEO)[0].likes.is_empty());
    }

    #[test]
    fn failed_vote_reverts_the_membership() {
        let (_session, comments, remote) = signed_in();
        remote.fetch_result.replace(vec![comment("c1", "someone-else", None)]);
        block_on(comments.fetch(VIDEO)).unwrap();

        remote.fail.set(true);
        assert!(block_on(comments.like(VIDEO, "c1")).is_err());
        assert!(comments.comments(VIDEO)[0].likes.is_empty());
    }

    #[test]
    fn failed_fetch_keeps_the_existing_thread() {
        let (_session, comments, remote) = signed_in();
        remote.fetch_result.replace(vec![comment("c1", "someone-else", None)]);
        block_on(comments.fetch(VIDEO)).unwrap();

        remote.fail.set(true);
        assert!(block_on(comments.fetch(VIDEO)).is_err());
        assert_eq!(comments.comments(VIDEO).len(), 1);
    }
}
