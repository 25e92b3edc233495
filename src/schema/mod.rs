//! Output schemas: parsing, dotted paths and the tree builder.

pub mod builder;
pub mod dotted;
pub mod parse;

pub use builder::{encode, BuildOptions, RenderContext, Schema, EXC_INFO_LEAF};
pub use dotted::{DottedPath, PathDefault};
pub use parse::{default_schema, SchemaInput};
