//! The bridge itself. The VST3 side of the wrapper lives in [`vst3`], while [`util`] contains the
//! parts that are not specific to the outer plugin format.

pub mod util;
pub mod vst3;

pub use self::util::setup_logger;
