//! Text runners: recursive splitting and content loading.

mod loader;
mod splitter;

pub use loader::TextLoaderRunner;
pub use splitter::{SplitterOptions, TextSplitterRunner, split_text};
