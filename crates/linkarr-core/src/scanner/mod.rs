mod walk;

pub use walk::{compile_ignore_patterns, SourceEntry, SourceWalker};
