//! Flow control runners: entry, exit and branching.

mod end;
mod if_else;
mod start;

pub use end::EndRunner;
pub use if_else::{Branch, IfElseConfig, IfElseRunner};
pub use start::StartRunner;
