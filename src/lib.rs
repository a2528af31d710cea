pub mod config;
pub mod http;
pub mod runtime;

/// Version reported in the `x-promptfoo-version` header.
pub const VERSION: &str = env!("PROMPTFOO_VERSION");
