//! The VST3 side of the bridge. [`Wrapper`] is the object the VST3 host talks to, and everything
//! else in here converts parts of the CLAP plugin to their VST3 counterparts.

pub mod busses;
pub mod edit_queue;
pub mod error;
pub mod note_expressions;
pub mod param_units;
pub mod params;
pub mod process;
pub mod run_loop;
pub mod state;
pub mod util;
mod wrapper;

pub use self::error::BridgeError;
pub use self::process::{
    AdapterSetup, BufferConfig, ProcessAdapter, ProcessAdapterFactory, ProcessingSetup,
};
pub use self::util::to_tresult;
pub use self::wrapper::{Wrapper, INFINITE_TAIL};
pub use vst3_sys;
