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
use std::fmt::Display;
use std::rc::Rc;

use cloneable_errors::ErrorContext;
use reqwest::StatusCode;

/// HTTP status category of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RemoteErrorKind {
    /// 401 - the credential was missing or rejected
    Unauthorized,
    /// 403 - the credential was fine, but the resource belongs to someone else
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// any other non-2xx response
    Server,
    /// the request never produced a response
    Transport,
}

/// A failed call against the remote collection store.
///
/// Carries the response category so the manager can decide between plain
/// revert and revert-plus-session-expiry.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub context: ErrorContext,
}

impl RemoteError {
    pub fn transport(context: ErrorContext) -> Self {
        Self { kind: RemoteErrorKind::Transport, context }
    }

    pub fn from_status(status: StatusCode, context: ErrorContext) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED => RemoteErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => RemoteErrorKind::Forbidden,
            StatusCode::NOT_FOUND => RemoteErrorKind::NotFound,
            StatusCode::CONFLICT => RemoteErrorKind::Conflict,
            _ => RemoteErrorKind::Server,
        };
        Self { kind, context }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind, self.context)
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.context)
    }
}

/// Everything a collection operation can fail with
#[derive(Debug, Clone)]
pub enum CollectionError {
    /// Input failed shape/length validation; nothing was changed
    Validation(ErrorContext),
    /// The id is already present and this operation requires uniqueness
    Duplicate { id: Rc<str> },
    /// The target id is absent where the operation requires it to exist
    NotFound { id: Rc<str> },
    /// A mutation that requires a session was attempted while anonymous
    Auth,
    /// The remote call failed; the optimistic local update has been rolled back
    RemoteSync(RemoteError),
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionError::Validation(ctx) => write!(f, "Validation failed: {ctx}"),
            CollectionError::Duplicate { id } => write!(f, "Item {id} is already in this collection"),
            CollectionError::NotFound { id } => write!(f, "Item {id} is not in this collection"),
            CollectionError::Auth => write!(f, "This operation requires signing in"),
            CollectionError::RemoteSync(err) => write!(f, "Remote sync failed, local changes were rolled back: {err}"),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectionError::Validation(ctx) => Some(ctx),
            CollectionError::RemoteSync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RemoteError> for CollectionError {
    fn from(value: RemoteError) -> Self {
        CollectionError::RemoteSync(value)
    }
}
