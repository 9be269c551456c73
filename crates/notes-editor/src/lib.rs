mod bubble;
mod config;
mod error;
mod fetch;
mod geometry;
mod gesture;
mod gutter;
mod ingest;
mod session;
mod slash;
mod theme;
pub mod views;

pub use crate::bubble::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::fetch::*;
pub use crate::geometry::*;
pub use crate::gesture::*;
pub use crate::gutter::*;
pub use crate::ingest::*;
pub use crate::session::*;
pub use crate::slash::*;
pub use crate::theme::*;
