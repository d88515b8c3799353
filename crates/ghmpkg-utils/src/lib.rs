pub mod error;
pub mod fs;
pub mod path;
pub mod rewrite;
pub mod time;
