//! Core library for fmirror – mirrors a filtered subset of a watched
//! directory tree into an output directory and keeps it in sync.

mod config;
mod engine;
mod file_op;
mod filter;
mod io;
mod prune;
mod registry;
mod utils;

pub use config::{combine_settings, find_config_paths, ConfigPaths, SyncSettings};
pub use engine::{
    run_command_loop, start_listening, EngineState, SyncController, SyncHandle, SyncTuning,
};
pub use file_op::{event_to_ops, SyncEvent};
pub use filter::SyncFilter;
pub use io::{read_all_with_retry, write_all_with_retry, RetryPolicy};
pub use prune::prune_empty_ancestors;
pub use registry::{InFlightGuard, InFlightRegistry};
pub use utils::{ancestors, dest_path, sanitize};
