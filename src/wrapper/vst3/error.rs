use thiserror::Error;

/// Everything that can go wrong while bridging. Most of these end up as a `kResultFalse` or
/// `kInvalidArgument` for the VST3 host, see [`to_tresult()`][super::util::to_tresult()].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("the plugin has not been initialized")]
    NotInitialized,
    #[error("the plugin could not be created or initialized")]
    InitializationFailed,
    #[error("the plugin is already active")]
    AlreadyActive,
    #[error("the plugin failed to activate")]
    ActivationFailed,
    #[error("the plugin is not active")]
    NotActive,
    #[error("unsupported symbolic sample size {0}")]
    UnsupportedSampleSize(i32),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unknown parameter ID {0:#x}")]
    UnknownParameter(u32),
    #[error("unknown timer ID {0}")]
    UnknownTimer(u32),
    #[error("unknown file descriptor {0}")]
    UnknownFd(i32),
    #[error("there is no open editor view")]
    NoView,
    #[error("not supported")]
    Unsupported,
    #[error("the host rejected the request")]
    Rejected,
    #[error("the plugin failed to start processing")]
    ProcessingStartFailed,
    #[error("the plugin failed to process the block")]
    ProcessingFailed,
    #[error("the plugin could not save or restore its state")]
    StateFailed,
}
