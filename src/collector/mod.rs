//! System Data Collection
//!
//! Gathers the grounded evidence every diagnostic run is built on: journal
//! logs, resource metrics, and the OS identity. All collectors degrade and
//! annotate instead of failing — downstream stages always receive a result.

pub mod journal;
pub mod os;
pub mod resources;

pub use journal::{LogCollection, collect, collect_window};
