//! Production collaborators for NACTA Sync and the command-line wiring
//! around them.

pub mod app;
pub mod doctor;
pub mod driver;
pub mod logging;
pub mod notify;
pub mod processes;
pub mod transport;
