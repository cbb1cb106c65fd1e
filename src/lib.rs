#![warn(rust_2018_idioms)]

//! Translation between SDP text (RFC 4566 plus the WebRTC extensions) and
//! the Jingle XML content model (XEP-0166 family), with incremental
//! source-add/source-remove diffing between successive session descriptions.

pub mod compact;
pub mod description;
pub mod differ;
pub mod jingle;
pub mod util;

mod error;

pub use description::media::{Direction, MediaSourceInfo, MediaType, SsrcGroup, SsrcInfo};
pub use description::session::SessionDescription;
pub use differ::SdpDiffer;
pub use error::{Error, Result};
