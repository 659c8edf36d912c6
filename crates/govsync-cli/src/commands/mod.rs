pub mod catalog;
pub mod completions;
pub mod explain;
pub mod sync;

/// Exit status once a run has reached the hosting platform and did not fully succeed
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for invocation, argument and configuration errors
pub const EXIT_USAGE: u8 = 2;
