//! Physical-presence unlock handshake.
//!
//! Destructive operations (flashing, writes that place `RESET` on a key)
//! sit behind a security gate: the firmware only opens it after the user
//! holds a designated key combination for a firmware-defined time. The
//! driver's side is start + poll; the countdown happens on the device.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use vial_transport::CancelToken;

use crate::error::UnlockError;
use crate::Keyboard;

/// How often the hold counter is re-read.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default bound on the whole handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct UnlockOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for UnlockOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

/// Run the unlock handshake to completion.
///
/// Returns immediately if the keyboard is already unlocked. Otherwise
/// starts the handshake and polls until the firmware reports unlocked,
/// reporting `(held, total)` hold progress through `progress` on the way.
/// The loop is bounded by the options' timeout and cancellation token.
pub fn ensure_unlocked(
    keyboard: &mut Keyboard,
    options: &UnlockOptions,
    mut progress: impl FnMut(u16, u16),
) -> Result<(), UnlockError> {
    if keyboard.unlock_status().map_err(flatten)? {
        return Ok(());
    }

    debug!("starting unlock handshake");
    keyboard.unlock_start().map_err(flatten)?;

    let deadline = Instant::now() + options.timeout;
    // the counter counts down while held; the first poll establishes the total
    let mut total = 0u16;
    let mut previous = u16::MAX;

    loop {
        if options.cancel.is_cancelled() {
            return Err(UnlockError::Cancelled);
        }
        if Instant::now() >= deadline {
            return Err(UnlockError::Timeout(options.timeout));
        }

        let state = keyboard.unlock_poll().map_err(flatten)?;
        if state.unlocked {
            debug!("unlock confirmed");
            return Ok(());
        }
        if state.counter > previous {
            // the keys were released; the firmware restarted the countdown
            warn!(counter = state.counter, "unlock hold released, counting again");
        }
        previous = state.counter;
        total = total.max(state.counter);
        progress(total.saturating_sub(state.counter), total);

        thread::sleep(options.poll_interval);
    }
}

fn flatten(err: crate::KeyboardError) -> UnlockError {
    match err {
        crate::KeyboardError::Transport(e) => UnlockError::Transport(e),
        crate::KeyboardError::Unlock(e) => e,
        other => UnlockError::Protocol(other.to_string()),
    }
}
