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
use std::cell::RefCell;
use std::rc::Rc;

use log::info;
use metube_api::unsync::{AuthResponse, User};

use crate::cache::LocalCache;
use crate::constants::{KEY_TOKEN, KEY_USER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The server rejected the stored credential; the user has to sign in again
    Expired,
}

enum SessionState {
    Anonymous,
    Authenticated { token: Rc<str>, user: User },
}

struct SessionInner {
    cache: LocalCache,
    state: RefCell<SessionState>,
    listeners: RefCell<Vec<Rc<dyn Fn(SessionEvent)>>>,
}

/// The current principal, or none.
///
/// Collections consult this to decide between local-only and local+remote
/// mode. Cheaply cloneable; all clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Session {
    /// Restores the last session from the cache, if one was stored
    pub fn restore(cache: &LocalCache) -> Self {
        let token: Option<Rc<str>> = cache.read_opt(KEY_TOKEN);
        let user: Option<User> = cache.read_opt(KEY_USER);
        let state = match (token, user) {
            (Some(token), Some(user)) => SessionState::Authenticated { token, user },
            _ => SessionState::Anonymous,
        };
        Self {
            inner: Rc::new(SessionInner {
                cache: cache.clone(),
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Authenticated { .. })
    }

    /// The bearer credential for remote calls, if a session exists
    pub fn token(&self) -> Option<Rc<str>> {
        match *self.inner.state.borrow() {
            SessionState::Authenticated { ref token, .. } => Some(token.clone()),
            SessionState::Anonymous => None,
        }
    }

    /// The authenticated user's id, if a session exists
    pub fn principal(&self) -> Option<Rc<str>> {
        match *self.inner.state.borrow() {
            SessionState::Authenticated { ref user, .. } => Some(user.id.clone()),
            SessionState::Anonymous => None,
        }
    }

    pub fn user(&self) -> Option<User> {
        match *self.inner.state.borrow() {
            SessionState::Authenticated { ref user, .. } => Some(user.clone()),
            SessionState::Anonymous => None,
        }
    }

    /// Enters the Authenticated state and persists the credential
    pub fn authenticate(&self, auth: AuthResponse) {
        self.inner.cache.write(KEY_TOKEN, &auth.token);
        self.inner.cache.write(KEY_USER, &auth.user);
        *self.inner.state.borrow_mut() = SessionState::Authenticated {
            token: auth.token,
            user: auth.user,
        };
        self.emit(SessionEvent::SignedIn);
    }

    /// Returns to the Anonymous state. Collection data stays local.
    pub fn logout(&self) {
        self.clear();
        self.emit(SessionEvent::SignedOut);
    }

    /// Drops a credential the server no longer accepts.
    ///
    /// Called by the sync layer on a 401; no-op when already anonymous.
    pub fn expire(&self) {
        if !self.is_authenticated() {
            return;
        }
        info!("Stored credential was rejected by the server, signing out");
        self.clear();
        self.emit(SessionEvent::Expired);
    }

    pub fn on_change(&self, listener: Rc<dyn Fn(SessionEvent)>) {
        self.inner.listeners.borrow_mut().push(listener);
    }

    fn clear(&self) {
        self.inner.cache.remove(KEY_TOKEN);
        self.inner.cache.remove(KEY_USER);
        *self.inner.state.borrow_mut() = SessionState::Anonymous;
    }

    fn emit(&self, event: SessionEvent) {
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }
}
