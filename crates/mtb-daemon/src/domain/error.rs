//! Daemon error types with wire error codes.
//!
//! Codes are part of the client protocol and must stay stable.

use mtb_types::{AddressError, ModuleAddress};
use serde_json::{json, Number, Value};
use thiserror::Error;

/// Wire error codes.
pub mod codes {
    pub const UNKNOWN_COMMAND: u16 = 1020;
    pub const INVALID_REQUEST: u16 = 1021;
    pub const WRITE_ACCESS_DENIED: u16 = 1030;

    pub const MODULE_INVALID_ADDR: u16 = 1100;
    pub const MODULE_NOT_FOUND: u16 = 1101;
    pub const MODULE_FAILED: u16 = 1102;
    pub const MODULE_INVALID_PORT: u16 = 1103;
    pub const MODULE_ALREADY_WRITING: u16 = 1110;

    pub const MODULE_NOT_ANSWERED_CMD_GIVING_UP: u16 = 3102;
}

/// Errors reported to the requesting client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DaemonError {
    /// Address outside `1..=255`, as sent by the client.
    #[error("Invalid module address: {0}")]
    InvalidAddress(Number),

    /// No module is configured at the address.
    #[error("Module {0} does not exist")]
    ModuleNotFound(ModuleAddress),

    /// Module is configured but not present on the bus.
    #[error("Module {0} is failed")]
    ModuleFailed(ModuleAddress),

    /// Port index beyond the module's I/O width.
    #[error("Invalid port {port} of module {address}")]
    InvalidPort { address: ModuleAddress, port: i64 },

    /// The driver is still writing to the module.
    #[error("Module {0} is already being written")]
    ModuleAlreadyWriting(ModuleAddress),

    /// The bus driver gave up on the command.
    #[error("Bus unavailable: {0}")]
    BusUnavailable(String),

    /// The client's host may only read.
    #[error("Write access denied")]
    WriteAccessDenied,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DaemonError {
    /// Numeric code sent to the client.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidAddress(_) => codes::MODULE_INVALID_ADDR,
            Self::ModuleNotFound(_) => codes::MODULE_NOT_FOUND,
            Self::ModuleFailed(_) => codes::MODULE_FAILED,
            Self::InvalidPort { .. } => codes::MODULE_INVALID_PORT,
            Self::ModuleAlreadyWriting(_) => codes::MODULE_ALREADY_WRITING,
            Self::BusUnavailable(_) => codes::MODULE_NOT_ANSWERED_CMD_GIVING_UP,
            Self::WriteAccessDenied => codes::WRITE_ACCESS_DENIED,
            Self::UnknownCommand(_) => codes::UNKNOWN_COMMAND,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
        }
    }

    /// `error` object of a failed response.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        match self {
            Self::InvalidAddress(addr) => error["address"] = json!(addr),
            Self::ModuleNotFound(addr)
            | Self::ModuleFailed(addr)
            | Self::ModuleAlreadyWriting(addr) => error["address"] = json!(addr),
            Self::InvalidPort { address, port } => {
                error["address"] = json!(address);
                error["port"] = json!(port);
            }
            _ => {}
        }
        error
    }
}

impl From<AddressError> for DaemonError {
    fn from(err: AddressError) -> Self {
        Self::InvalidAddress(err.0)
    }
}
