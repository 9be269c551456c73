mod attrs;
mod block;
mod core;
mod editing;
mod list;
mod marks;
mod normalize;
mod ops;
mod outline;
mod schema;
mod table;
mod tree;
mod value;

pub use crate::attrs::*;
pub use crate::block::*;
pub use crate::core::*;
pub use crate::editing::*;
pub use crate::list::*;
pub use crate::marks::*;
pub use crate::normalize::*;
pub use crate::ops::*;
pub use crate::outline::*;
pub use crate::schema::*;
pub use crate::table::*;
pub use crate::tree::*;
pub use crate::value::*;
