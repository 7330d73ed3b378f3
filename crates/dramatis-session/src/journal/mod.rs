//! Journaling system for recording what happened at the table.

pub mod entry;
pub mod log;

pub use entry::JournalEntry;
pub use log::Journal;
