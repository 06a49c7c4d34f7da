//! Supporting types for acquisition job events

use serde::{Deserialize, Serialize};

/// Output stream a job log line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    /// Standard output of the acquisition process
    Stdout,
    /// Standard error of the acquisition process
    Stderr,
}

impl LogStream {
    /// Prefix applied to the transport payload so observers can tell severity
    /// apart without a structured field.
    pub fn transport_prefix(&self) -> &'static str {
        match self {
            LogStream::Stdout => "",
            LogStream::Stderr => "ERROR: ",
        }
    }
}
