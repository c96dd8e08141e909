//! Device bridge: command execution, device listing, server options.

pub mod devices;
pub mod executor;
pub mod options;

pub use devices::{DeviceInfo, DeviceStatus, parse_device_list};
pub use executor::{AdbExecutor, CommandOutput, RemoteExecutor, RemoteProcess, target_args};
pub use options::{DEFAULT_LOCAL_PORT, REMOTE_SERVER_PATH, SERVER_VERSION, ServerOptions};
