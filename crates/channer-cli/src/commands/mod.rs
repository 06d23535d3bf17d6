pub mod common;
pub mod completions;
pub mod data;
pub mod prompt;
pub mod status;
pub mod sync;
pub mod watch;
