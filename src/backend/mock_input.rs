//! Mock input source for testing.
//!
//! Returns whatever input was last stored through a shared handle, so tests
//! and the demo binary can "press" buttons while the device is running.

use log::debug;
use std::sync::{Arc, Mutex};

use crate::backend::InputSource;
use crate::wiimote::types::ControllerInput;

/// Input source fed from a shared, settable value
#[derive(Clone, Debug, Default)]
pub struct MockInputSource {
    input: Arc<Mutex<ControllerInput>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the input returned by subsequent polls
    pub fn set(&self, input: ControllerInput) {
        debug!("[MOCK INPUT] {:?}", input);
        *self.input.lock().unwrap_or_else(|e| e.into_inner()) = input;
    }

    /// Edit the current input in place
    pub fn update(&self, f: impl FnOnce(&mut ControllerInput)) {
        let mut input = self.input.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut input);
        debug!("[MOCK INPUT] {:?}", *input);
    }

    pub fn current(&self) -> ControllerInput {
        *self.input.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl InputSource for MockInputSource {
    fn poll(&mut self) -> ControllerInput {
        self.current()
    }
}
