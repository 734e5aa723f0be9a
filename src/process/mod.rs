//! External transcoding process contract.
//!
//! The media pipeline itself is an external program (ffmpeg). The supervisor only
//! needs to **launch** it, **poll** its liveness and **stop** it:
//!
//! - [`CommandSpec`] / [`RecordingCommand`] fully-formed command line per encoder family,
//!   with an optional live output to the streaming gateway
//! - [`Launcher`] starts a process from a spec → [`ProcessHandle`] | `LaunchFailure`
//! - [`ProcessHandle`] non-blocking liveness poll, cooperative and forced stop
//! - [`ChildLauncher`] / [`ChildHandle`] the `tokio::process` implementation

mod child;
mod command;
mod handle;

pub use child::{ChildHandle, ChildLauncher};
pub use command::{
    live_publish_url, safe_name, segment_format, CommandSpec, EncoderFamily, RecordingCommand,
};
pub use handle::{Launcher, ProcessHandle};
