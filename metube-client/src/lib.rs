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
//! Headless core of the MeTube web client: the per-user collections
//! (watch later, watch history, liked videos, playlists, search history,
//! comments), kept in sync between browser-local storage and the MeTube
//! server under the optimistic-update protocol.
//!
//! Everything here is single-threaded; the UI layer mounts a
//! [`store::UserDataStore`] and drives it from DOM events.

pub mod cache;
pub mod collections;
pub mod comments;
pub mod constants;
pub mod error;
pub mod playlists;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;
pub mod utils;

pub use metube_api::unsync as api_types;
