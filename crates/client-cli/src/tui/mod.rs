//! Inbox terminal UI
//!
//! Lines and conversations on the left, the open conversation and the
//! composer on the right.

mod app;

pub use app::App;
