// pour-aio/src/lib.rs
//! Blocking IO for pour: archive unpacking, destination filesystem writes and
//! external process execution.

pub mod extract;
pub mod fs;
pub mod process;

pub use extract::{ArchiveFormat, ArchiveUnpacker, Unpacker};
pub use fs::{copy_with_mode, ensure_dir, set_permissions, EXECUTABLE_MODE};
pub use process::{run_command, CommandOutput, CommandSpec};
