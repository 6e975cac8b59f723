use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown signal `{0}`")]
    UnknownSignal(String),

    #[error("signal `{0}` is an output and cannot be driven")]
    NotAnInput(String),

    #[error("cannot capture `{signal}` before the first clock edge after reset")]
    CaptureBeforeEdge { signal: String },

    #[error("timed out after {edges} edges waiting for `{signal}` == {value:#x}")]
    WaitTimeout {
        signal: String,
        value: u64,
        edges: u64,
    },

    #[error("process `{name}` did not finish within {edges} edges")]
    JoinTimeout { name: String, edges: u64 },

    #[error("unknown process handle {0}")]
    UnknownProcess(usize),

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("waveform trace failed")]
    Trace(#[from] std::io::Error),
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
