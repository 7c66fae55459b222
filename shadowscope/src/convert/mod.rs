//! Trace import
//!
//! Turns traces recorded by other tools into drawables bound to a fresh
//! category table.

pub mod chrome_trace;

pub use chrome_trace::{convert_file, convert_str, ConvertedTrace, ThreadKey};
