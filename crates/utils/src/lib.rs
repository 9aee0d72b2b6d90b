//! Ambient helpers shared by the agent host and the native agent library.

mod build_info;
pub mod logging;
pub mod version;
