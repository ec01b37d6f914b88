//! The terminal front end of the remote.

mod app;
mod error;
mod remote_console;

pub use app::{RemoteApp, HOLD_TIMEOUT};
pub use error::RemoteGuiError;
pub use remote_console::remote_console;
