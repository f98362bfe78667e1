//! hue-restore - Hue power-loss recovery
//!
//! Hue bulbs come back from a power cut at their factory defaults
//! (on, color temperature 369, full brightness). Run `hue-restore check`
//! periodically: it records every change to the lights while things are
//! normal, and when several bulbs show the factory defaults at once it
//! pushes each of them back to its last recorded state.
//!
//! # Examples
//!
//! ```
//! use hue_restore::models::{ColorMode, LightState};
//! use hue_restore::planner::plan;
//!
//! // what the bulb looked like before the power cut
//! let before = LightState {
//!     reachable: true,
//!     on: true,
//!     colormode: Some(ColorMode::Ct),
//!     ct: Some(300),
//!     bri: Some(200),
//!     ..Default::default()
//! };
//!
//! // and what it looks like now
//! let now = LightState {
//!     ct: Some(369),
//!     bri: Some(254),
//!     ..before.clone()
//! };
//!
//! let command = plan(&now, &before);
//! assert_eq!(serde_json::to_string(&command).unwrap(), r#"{"bri":200,"ct":300}"#);
//! ```
//!
//! # Storage
//!
//! Everything lives in the directory named by `HUE_RESTORE_STORAGE_PATH`
//! (default `.`):
//!
//! - `snapshots.json`: identity, metadata history and state history
//! - `hue-restore.log`: timestamped events
//! - `config.json`: optional settings, and the bridge credential saved
//!   by `hue-restore auth`
//!
//! # CLI
//!
//! ```bash
//! $ hue-restore --help
//! Restores Hue bulb state after a power loss
//!
//! Usage: hue-restore [OPTIONS] <COMMAND>
//!
//! Commands:
//!   check     Run one check cycle (restore after a power loss, otherwise record changes)
//!   auth      Register with the bridge (press its link button first)
//!   unreg     Remove our credential from the bridge
//!   current   Show the lights as the bridge reports them now
//!   previous  Show the last recorded snapshot of every light
//!   lookup    Show the full history of one light, by unique id, index or name
//!   version   Print the version
//!   help      Print this message or the help of the given subcommand(s)
//!
//! Options:
//!   -v, --verbose  Echo the event log to stdout
//!   -d, --debug    Dump intermediate structures
//!   -h, --help     Print help
//!   -V, --version  Print version
//! ```
//!

pub mod bridge;
pub mod config;
pub mod cycle;
pub mod detector;
pub mod journal;
pub mod models;
pub mod planner;
pub mod storage;
pub mod updater;

mod errors;

pub use bridge::{Bridge, HueBridge};
pub use config::Config;
pub use cycle::{Cycle, CycleReport};
pub use errors::{Error, Result};
pub use journal::Journal;
pub use storage::Storage;
