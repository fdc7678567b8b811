pub mod ipc;

pub use ipc::{CaptureOutcome, Command, IpcError, Response, StatusInfo, MAX_CAPTURE_TIMEOUT_SECS};
