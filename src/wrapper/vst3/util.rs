use vst3_sys::base::{kInvalidArgument, kNotImplemented, kResultFalse, kResultOk, tresult};

use super::error::BridgeError;

/// In VST3 the last bit of a parameter ID is reserved for parameters provided by the host, so the
/// plugin's IDs are masked before they are handed to the host.
///
/// <https://developer.steinberg.help/display/VST/Parameters+and+Automation>
pub const PARAM_ID_MASK: u32 = !(1 << 31);

/// Convert the result of one of the wrapper's functions to the `tresult` the VST3 host expects.
pub fn to_tresult<T>(result: &Result<T, BridgeError>) -> tresult {
    match result {
        Ok(_) => kResultOk,
        Err(BridgeError::InvalidArgument)
        | Err(BridgeError::UnknownParameter(_))
        | Err(BridgeError::UnknownTimer(_))
        | Err(BridgeError::UnknownFd(_))
        | Err(BridgeError::UnsupportedSampleSize(_)) => kInvalidArgument,
        Err(BridgeError::Unsupported) => kNotImplemented,
        Err(_) => kResultFalse,
    }
}
