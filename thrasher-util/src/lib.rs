//! Utilities

// Modules
pub mod cli;
pub mod logger;
pub mod shorthand;

// Exports
pub use shorthand::{ParseShorthand, ShorthandBase, ShorthandError};
