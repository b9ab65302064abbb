#![forbid(unsafe_code)]

pub mod questions;
pub mod repository;
pub mod sheets;
pub mod sqlite;

pub use questions::{QuestionSource, QuestionSourceError};
pub use repository::{ResponseSheet, SheetHandle, Storage, StorageError};
