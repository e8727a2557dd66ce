pub mod config;
pub mod drag;
pub mod editor;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod realtime;
pub mod session;
pub mod store;

pub use boardsync_common as model;
