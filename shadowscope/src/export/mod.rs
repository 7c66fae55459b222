//! Container export and import
//!
//! The container holds the category table and every drawable, real ones
//! and the shadows a pyramid computed, in one binary file.

pub mod logfile;

pub use logfile::{LogFile, LogFileExporter};
