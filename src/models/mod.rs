//! Data models for the forum backend.
//!
//! Wire format is camelCase JSON; timestamps are RFC 3339 strings.

mod comment;
mod post;
mod tag;
mod user;

pub use comment::*;
pub use post::*;
pub use tag::*;
pub use user::*;
