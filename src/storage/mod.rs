pub mod db;
pub mod layout;
pub mod models;
mod table;
mod tables;

pub use db::{StateStore, StoreError};
pub use layout::{sanitize_filename, PartialFile, StorageLayout};
pub use table::{Record, Table};
pub use tables::*;
