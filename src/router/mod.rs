//! Route compilation and matching
//!
//! Controller metadata is compiled once into a [`RouteTable`]: one list of
//! [`CompiledRoute`]s per HTTP method, scanned linearly at dispatch time so
//! that the first declared route wins.

mod compiler;
mod path;

pub use compiler::{CompiledRoute, RouteCompiler, RouteTable};
pub use path::{PathPattern, WILDCARD_PARAM, join_paths};
