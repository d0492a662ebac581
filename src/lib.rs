//! `livetree`: a reactive, typed, hierarchical data tree.
//!
//! Arbitrary nested data (maps, sequences, scalars) is stored in a [`Node`]
//! tree, mutated incrementally via JSON-shaped patches (the
//! [`node::patch`] engine), and automatically bound to user-defined object
//! types ([`object`]) whose lifecycle is driven by changes to the
//! underlying data. A [`path`] DSL addresses nodes by structural paths and
//! predicates, a [`query`] engine projects subtrees, and [`watcher`]s let
//! pull-style consumers accumulate deltas since their last poll. [`Tree`]
//! orchestrates the whole cascade.
//!
//! Concrete datasource backends, the remote-worker HTTP loop, dynamic
//! plugin loading, logging and configuration loaders are shallow glue
//! around this core — see [`datasource`], [`action`], [`eval`],
//! [`patch_path`], [`config`] and [`logging`].

pub mod action;
pub mod config;
pub mod datasource;
pub mod eval;
pub mod logging;
pub mod node;
pub mod object;
pub mod patch_path;
pub mod path;
pub mod query;
pub mod tree;
pub mod watcher;

pub use node::{Node, NodeRef};
pub use object::{ObjectType, ObjectTypeBuilder, TypedObject};
pub use tree::Tree;
