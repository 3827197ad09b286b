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

#[cfg(feature = "sync")]
pub mod sync {
    //! `Arc<str>` variant of the API types, for multithreaded use (the server)
    pub type RcStr = std::sync::Arc<str>;
    include!("types.rs");
}

#[cfg(feature = "unsync")]
pub mod unsync {
    //! `Rc<str>` variant of the API types, for single-threaded use (the client)
    pub type RcStr = std::rc::Rc<str>;
    include!("types.rs");
}
