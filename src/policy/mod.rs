// ABOUTME: Pre-network policy gates for remote execution.
// ABOUTME: Command allow/block lists and the target host allow-list.

mod command;
mod host;

pub use command::{AllowedCommand, CommandPolicy, ValidationError, contains_line_break};
pub use host::HostPolicy;
