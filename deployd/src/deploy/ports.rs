//! Port allocation

use std::sync::Mutex;

use crate::errors::PlatformError;

/// Hands out strictly increasing listening ports, never the same one twice
#[derive(Debug)]
pub struct PortAllocator {
    next_port: Mutex<u32>,
}

impl PortAllocator {
    /// Create an allocator whose first port is `next_port`.
    ///
    /// A value past `u16::MAX` means the range is spent.
    pub fn new(next_port: u32) -> Self {
        Self {
            next_port: Mutex::new(next_port),
        }
    }

    /// Allocate a port and advance the counter in one step
    pub fn next(&self) -> Result<u16, PlatformError> {
        let mut next_port = self.next_port.lock().unwrap_or_else(|e| e.into_inner());
        let port = u16::try_from(*next_port)
            .map_err(|_| PlatformError::ValidationError("port range exhausted".to_string()))?;
        *next_port += 1;
        Ok(port)
    }

    /// The raw counter, one past the last port handed out
    pub fn peek(&self) -> u32 {
        *self.next_port.lock().unwrap_or_else(|e| e.into_inner())
    }
}
