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
use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url};

pub static REQWEST_CLIENT: LazyLock<Client> = LazyLock::new(Client::new);

pub static DEFAULT_API_BASE: LazyLock<Url> = LazyLock::new(|| Url::parse("http://localhost:5000/api/").expect("should be able to parse the default API base URL"));

// Collection limits

pub const HISTORY_CAP: usize = 100;
pub const SEARCH_HISTORY_CAP: usize = 20;
pub const COMMENT_MAX_LEN: usize = 1000;

// Local storage keys, one per collection

pub const KEY_WATCH_LATER: &str = "watchLater";
pub const KEY_HISTORY: &str = "watchHistory";
pub const KEY_LIKED_VIDEOS: &str = "likedVideos";
pub const KEY_PLAYLISTS: &str = "playlists";
pub const KEY_SEARCH_HISTORY: &str = "searchHistory";
pub const KEY_TOKEN: &str = "token";
pub const KEY_USER: &str = "user";

// Regexes

pub static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\d_-]{11}$").expect("VIDEO_ID_REGEX should be valid"));
