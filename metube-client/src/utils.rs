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
use reqwest::Url;

pub trait ReqwestUrlExt {
    #[allow(clippy::result_unit_err)]
    fn extend_segments<I>(&mut self, segments: I) -> Result<&mut Self, ()>
    where I: IntoIterator,
    I::Item: AsRef<str>;
    #[allow(clippy::result_unit_err)]
    fn join_segments<I>(&self, segments: I) -> Result<Self, ()>
    where I: IntoIterator,
    I::Item: AsRef<str>,
    Self: Sized;
}

impl ReqwestUrlExt for Url {
    fn extend_segments<I>(&mut self, segments: I) -> Result<&mut Self, ()>
        where I: IntoIterator,
        I::Item: AsRef<str>,
    {
        {
            let mut path = self.path_segments_mut()?;
            path.extend(segments);
        }
        Ok(self)
    }
    fn join_segments<I>(&self, segments: I) -> Result<Self, ()>
        where I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.clone();
        url.extend_segments(segments)?;
        Ok(url)
    }
}

/// Current time as unix-epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
