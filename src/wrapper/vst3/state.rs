//! State is passed through to the plugin as is. The host's `IBStream` is read and written directly
//! by the plugin's state extension, so there's no intermediate format.

use std::io::{self, Read, Write};

use super::error::BridgeError;
use crate::plugin::ClapPlugin;

/// Counts the bytes passing through so we can log something useful.
struct Counted<S> {
    stream: S,
    bytes: usize,
}

impl<S: Read> Read for Counted<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.stream.read(buf)?;
        self.bytes += read;

        Ok(read)
    }
}

impl<S: Write> Write for Counted<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.stream.write(buf)?;
        self.bytes += written;

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Let the plugin write its state to `stream`.
pub fn save_state(plugin: &dyn ClapPlugin, stream: &mut dyn Write) -> Result<(), BridgeError> {
    let state = plugin.state().ok_or(BridgeError::Unsupported)?;

    let mut stream = Counted { stream, bytes: 0 };
    if !state.save(&mut stream) {
        bridge_warn!("The plugin failed to save its state");
        return Err(BridgeError::StateFailed);
    }
    stream.flush().map_err(|_| BridgeError::StateFailed)?;

    bridge_trace!("Saved {} bytes of state", stream.bytes);
    Ok(())
}

/// Let the plugin restore its state from `stream`.
pub fn load_state(plugin: &dyn ClapPlugin, stream: &mut dyn Read) -> Result<(), BridgeError> {
    let state = plugin.state().ok_or(BridgeError::Unsupported)?;

    let mut stream = Counted { stream, bytes: 0 };
    if !state.load(&mut stream) {
        bridge_warn!("The plugin failed to restore its state");
        return Err(BridgeError::StateFailed);
    }

    bridge_trace!("Restored {} bytes of state", stream.bytes);
    Ok(())
}
