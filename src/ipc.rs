//! IPC module - shared handles, panel commands, and the user-facing event log

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::ControlPanel;
use crate::control::SimSession;

// ============================================================================
// SHARED STATE - Session and panel handles shared across threads
// ============================================================================

pub type SharedSession = Arc<Mutex<SimSession>>;
pub type SharedPanel = Arc<Mutex<ControlPanel>>;

pub fn shared_session(session: SimSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

pub fn shared_panel(panel: ControlPanel) -> SharedPanel {
    Arc::new(Mutex::new(panel))
}

// ============================================================================
// PANEL COMMANDS - Button presses routed to the control thread
// ============================================================================

#[derive(Clone, Debug)]
pub enum PanelCommand {
    /// Discard both traces and zero the control state.
    Reset,
    /// Compile the given source and swap it in if it parses.
    ApplySetpoint(String),
}

#[derive(Clone)]
pub struct CommandChannel {
    pub tx: Sender<PanelCommand>,
    pub rx: Arc<Receiver<PanelCommand>>,
}

impl CommandChannel {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = bounded(buffer_size);
        Self {
            tx,
            rx: Arc::new(rx),
        }
    }
}

// ============================================================================
// EVENT LOG - Bounded message log surfaced to the user
// ============================================================================

/// Most recent user-facing messages: setpoint compile failures and
/// lifecycle notices. Oldest entries drop off once `max_size` is reached.
#[derive(Clone)]
pub struct EventLog {
    entries: Arc<RwLock<VecDeque<String>>>,
    max_size: usize,
}

impl EventLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    pub fn write(&self, message: String) {
        let mut log = self.entries.write();
        log.push_back(message);
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn read_all(&self) -> Vec<String> {
        self.entries.read().iter().cloned().collect()
    }

    /// The most recent entry, if any (the UI error display shows this).
    pub fn latest(&self) -> Option<String> {
        self.entries.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
