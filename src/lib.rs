pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flatten;
pub mod fs_utils;
pub mod hotkey;
pub mod logging;
pub mod paths;
pub mod popup;
pub mod presenter;
pub mod rotation;
pub mod sink;
pub mod snippet;
pub mod store;
pub mod trigger;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
