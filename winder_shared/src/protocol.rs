//! Marlin wire tokens spoken between the host and the winder controller.

/// Controller is ready for the next command.
pub const ACK: &str = "ok";

/// Keep-alive chatter emitted while a long move or a pause is in progress.
pub const BUSY_TOKENS: [&str; 2] = ["echo:busy: processing", "echo:busy: paused for user"];

/// Sent by the controller once an `M0` pause has taken effect.
pub const PAUSE_CONFIRMATION: &str = "//action:notification Click to Resume...";

/// Sent by the controller once an `M108` resume has taken effect.
pub const RESUME_CONFIRMATION: &str = "//action:notification 3D Printer Ready.";

/// Unconditional stop; waits for the user.
pub const PAUSE_COMMAND: &str = "M0";

/// Break out of the wait started by `M0`.
pub const RESUME_COMMAND: &str = "M108";

pub const DEFAULT_BAUD: u32 = 115_200;

/// Classified inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    Ack,
    Busy,
    PauseConfirmed,
    ResumeConfirmed,
    Unrecognized(&'a str),
}

impl<'a> Response<'a> {
    pub fn classify(line: &'a str) -> Self {
        match line {
            ACK => Response::Ack,
            PAUSE_CONFIRMATION => Response::PauseConfirmed,
            RESUME_CONFIRMATION => Response::ResumeConfirmed,
            busy if BUSY_TOKENS.contains(&busy) => Response::Busy,
            other => Response::Unrecognized(other),
        }
    }
}
