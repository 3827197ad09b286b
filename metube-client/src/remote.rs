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
//! The client-side gateway to the MeTube server.
//!
//! [`Api`] translates collection operations into authenticated requests; the
//! traits on top of it are the seams the managers are tested through. Every
//! call is a single attempt - the managers' revert-on-failure is the only
//! resilience mechanism.

use std::marker::PhantomData;
use std::rc::Rc;

use cloneable_errors::{anyhow, ErrContext};
use metube_api::unsync::*;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::REQWEST_CLIENT;
use crate::error::RemoteError;
use crate::utils::ReqwestUrlExt;

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let context = match response.text().await {
        Ok(ref body) if !body.is_empty() => anyhow!("The server returned a '{status}' status code with the following body:\n{body}"),
        _ => anyhow!("The server returned a '{status}' status code"),
    };
    Err(RemoteError::from_status(status, context))
}

async fn send(builder: RequestBuilder) -> Result<Response, RemoteError> {
    let response = builder
        .header("Accept", "application/json")
        .send().await
        .map_err(|err| RemoteError::transport(err.context("Failed to send the request")))?;
    check_status(response).await
}

async fn recv_json<T>(builder: RequestBuilder) -> Result<T, RemoteError>
where T: DeserializeOwned
{
    send(builder).await?
        .json().await
        .map_err(|err| RemoteError::transport(err.context("Failed to deserialize response")))
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CommentVote {
    Like,
    Dislike,
}

impl CommentVote {
    fn segment(self) -> &'static str {
        match self {
            CommentVote::Like => "like",
            CommentVote::Dislike => "dislike",
        }
    }
}

/// Typed access to the server's `/api` endpoints
pub struct Api {
    base: Url,
}

impl Api {
    pub fn new(base: Url) -> Rc<Self> {
        Rc::new(Self { base })
    }

    fn url(&self, segments: &[&str]) -> Url {
        self.base.join_segments(segments).expect("the API base should be a valid base URL")
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, RemoteError> {
        recv_json(REQWEST_CLIENT.post(self.url(&["login"])).json(request)).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, RemoteError> {
        recv_json(REQWEST_CLIENT.post(self.url(&["signup"])).json(request)).await
    }

    pub async fn user_data(&self, token: &str) -> Result<UserData, RemoteError> {
        recv_json(REQWEST_CLIENT.get(self.url(&["user-data"])).bearer_auth(token)).await
    }

    pub async fn status(&self) -> Result<StatusResponse, RemoteError> {
        recv_json(REQWEST_CLIENT.get(self.url(&["status"]))).await
    }
}

/// Remote half of one synchronized list.
///
/// Methods return only success/failure; the optimistic local state is already
/// what the server will hold, so response bodies are not needed.
#[allow(async_fn_in_trait)]  // for local use only
pub trait RemoteCollection<T> {
    async fn insert(&self, token: &str, item: &T) -> Result<(), RemoteError>;
    async fn remove(&self, token: &str, id: &str) -> Result<(), RemoteError>;
    async fn clear(&self, token: &str) -> Result<(), RemoteError>;
}

/// [`RemoteCollection`] binding for the plain list endpoints
/// (`POST /{list}`, `DELETE /{list}/{id}`, `DELETE /{list}`)
pub struct ListEndpoint<T> {
    api: Rc<Api>,
    segment: &'static str,
    _item: PhantomData<T>,
}

impl<T> Clone for ListEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            segment: self.segment,
            _item: PhantomData,
        }
    }
}

impl<T> ListEndpoint<T> {
    pub fn new(api: Rc<Api>, segment: &'static str) -> Self {
        Self { api, segment, _item: PhantomData }
    }
}

impl<T> RemoteCollection<T> for ListEndpoint<T>
where T: Serialize
{
    async fn insert(&self, token: &str, item: &T) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.post(self.api.url(&[self.segment])).bearer_auth(token).json(item)).await.map(drop)
    }

    async fn remove(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.delete(self.api.url(&[self.segment, id])).bearer_auth(token)).await.map(drop)
    }

    async fn clear(&self, token: &str) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.delete(self.api.url(&[self.segment])).bearer_auth(token)).await.map(drop)
    }
}

/// Remote half of the playlists collection: the plain list operations plus
/// the nested per-playlist ones
#[allow(async_fn_in_trait)]  // for local use only
pub trait PlaylistsRemote: RemoteCollection<Playlist> {
    async fn rename(&self, token: &str, id: &str, body: &PlaylistRename) -> Result<(), RemoteError>;
    async fn insert_video(&self, token: &str, playlist_id: &str, video: &PlaylistVideo) -> Result<(), RemoteError>;
    async fn remove_video(&self, token: &str, playlist_id: &str, video_id: &str) -> Result<(), RemoteError>;
}

#[derive(Clone)]
pub struct PlaylistsEndpoint {
    api: Rc<Api>,
    list: ListEndpoint<Playlist>,
}

impl PlaylistsEndpoint {
    pub fn new(api: Rc<Api>) -> Self {
        Self {
            list: ListEndpoint::new(api.clone(), "playlists"),
            api,
        }
    }
}

impl RemoteCollection<Playlist> for PlaylistsEndpoint {
    async fn insert(&self, token: &str, item: &Playlist) -> Result<(), RemoteError> {
        self.list.insert(token, item).await
    }

    async fn remove(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        self.list.remove(token, id).await
    }

    async fn clear(&self, token: &str) -> Result<(), RemoteError> {
        self.list.clear(token).await
    }
}

impl PlaylistsRemote for PlaylistsEndpoint {
    async fn rename(&self, token: &str, id: &str, body: &PlaylistRename) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.put(self.api.url(&["playlists", id])).bearer_auth(token).json(body)).await.map(drop)
    }

    async fn insert_video(&self, token: &str, playlist_id: &str, video: &PlaylistVideo) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.post(self.api.url(&["playlists", playlist_id, "videos"])).bearer_auth(token).json(video)).await.map(drop)
    }

    async fn remove_video(&self, token: &str, playlist_id: &str, video_id: &str) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.delete(self.api.url(&["playlists", playlist_id, "videos", video_id])).bearer_auth(token)).await.map(drop)
    }
}

/// Remote half of the per-video comment threads.
///
/// Unlike the list endpoints, comment mutations return the server's canonical
/// copy of the affected comment - membership of the vote sets is
/// reconstructed client-side first, then reconciled with the server's copy.
#[allow(async_fn_in_trait)]  // for local use only
pub trait CommentsRemote {
    async fn fetch(&self, video_id: &str) -> Result<Vec<Comment>, RemoteError>;
    async fn post(&self, token: &str, comment: &NewComment) -> Result<Comment, RemoteError>;
    async fn edit(&self, token: &str, id: &str, body: &CommentEdit) -> Result<Comment, RemoteError>;
    async fn delete(&self, token: &str, id: &str) -> Result<(), RemoteError>;
    async fn vote(&self, token: &str, id: &str, vote: CommentVote) -> Result<Comment, RemoteError>;
}

#[derive(Clone)]
pub struct CommentsEndpoint {
    api: Rc<Api>,
}

impl CommentsEndpoint {
    pub fn new(api: Rc<Api>) -> Self {
        Self { api }
    }
}

impl CommentsRemote for CommentsEndpoint {
    async fn fetch(&self, video_id: &str) -> Result<Vec<Comment>, RemoteError> {
        recv_json(REQWEST_CLIENT.get(self.api.url(&["comments", video_id]))).await
    }

    async fn post(&self, token: &str, comment: &NewComment) -> Result<Comment, RemoteError> {
        recv_json(REQWEST_CLIENT.post(self.api.url(&["comments"])).bearer_auth(token).json(comment)).await
    }

    async fn edit(&self, token: &str, id: &str, body: &CommentEdit) -> Result<Comment, RemoteError> {
        recv_json(REQWEST_CLIENT.put(self.api.url(&["comments", id])).bearer_auth(token).json(body)).await
    }

    async fn delete(&self, token: &str, id: &str) -> Result<(), RemoteError> {
        send(REQWEST_CLIENT.delete(self.api.url(&["comments", id])).bearer_auth(token)).await.map(drop)
    }

    async fn vote(&self, token: &str, id: &str, vote: CommentVote) -> Result<Comment, RemoteError> {
        recv_json(REQWEST_CLIENT.post(self.api.url(&["comments", id, vote.segment()])).bearer_auth(token)).await
    }
}
