/// Script-driven editing of JSON documents on top of `docgraph-history`.
pub mod runner;
pub mod script;

pub use runner::Workspace;
pub use script::{Command, Script};
