//! Pause/Resume Gate
//!
//! A paused flag plus a one-shot release signal, both behind one lock. Every
//! resume cancels the current token and installs a fresh one, so each token is
//! released exactly once and the next pause waits on a new signal.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

struct GateState {
    paused: bool,
    resumed: CancellationToken,
}

pub struct PauseGate {
    state: Mutex<GateState>,
}

impl PauseGate {
    /// New gate in the running state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                paused: false,
                resumed: CancellationToken::new(),
            }),
        }
    }

    /// Returns `true` if this call moved the gate from running to paused.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if state.paused {
            return false;
        }
        state.paused = true;
        info!("Dispatcher paused");
        true
    }

    /// Returns `true` if this call moved the gate from paused to running.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if !state.paused {
            return false;
        }
        state.paused = false;
        let released = std::mem::replace(&mut state.resumed, CancellationToken::new());
        released.cancel();
        info!("Dispatcher resumed");
        true
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Wait until the gate is running. Returns `true` if the caller actually
    /// had to wait for a resume.
    pub async fn wait_until_running(&self) -> bool {
        let mut waited = false;
        loop {
            let released = {
                let state = self.state.lock();
                if !state.paused {
                    return waited;
                }
                state.resumed.clone()
            };
            released.cancelled().await;
            waited = true;
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
