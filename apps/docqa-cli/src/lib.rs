//! Wiring shared by the docqa binaries: building collaborators from
//! configuration and the HTTP router.

pub mod server;
pub mod setup;
