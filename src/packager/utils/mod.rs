//! Shared helpers: filesystem, HTTP and subprocess plumbing.

pub mod fs;
pub mod http;
pub mod process;
