mod config;
mod core;
mod fragment;
mod ops;
pub mod paste;
mod plugin;
pub mod position;
pub mod url_scan;

pub use crate::config::*;
pub use crate::core::*;
pub use crate::fragment::*;
pub use crate::ops::*;
pub use crate::paste::{
    EditError, EditTransaction, InsertSlot, LinkPasteHandler, MergeStrategy, PasteHost,
    SelectionRange,
};
pub use crate::plugin::*;
pub use crate::position::PositionalTx;
pub use crate::url_scan::{LinkifyScanner, UrlScanner, UrlSpan};
