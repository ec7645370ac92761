//! Bounded-retry frame sender.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::{SendStatus, Transport, TransportError, FRAME_SIZE};

/// Default retry budget for control traffic.
pub const DEFAULT_RETRIES: u32 = 200;

/// Sleep between attempts when the device reports busy.
const BUSY_BACKOFF: Duration = Duration::from_millis(10);

/// Zero-pad a short command to a full frame.
///
/// Panics if `data` exceeds [`FRAME_SIZE`]; commands are built by this
/// workspace, so an oversized one is a bug rather than a runtime condition.
pub fn pad_frame(data: &[u8]) -> [u8; FRAME_SIZE] {
    assert!(data.len() <= FRAME_SIZE, "command longer than one frame");
    let mut frame = [0u8; FRAME_SIZE];
    frame[..data.len()].copy_from_slice(data);
    frame
}

/// Sends frames with a bounded retry budget.
///
/// A busy device is retried after a short sleep; an outright rejection
/// fails immediately without consuming the budget. Exhausting the budget
/// is an error, never a silent drop.
#[derive(Debug, Clone, Copy)]
pub struct PacketSender {
    max_retries: u32,
}

impl Default for PacketSender {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}

impl PacketSender {
    pub fn new(max_retries: u32) -> Self {
        assert!(max_retries > 0, "retry budget must be at least one attempt");
        Self { max_retries }
    }

    /// Send one frame, retrying on busy.
    ///
    /// `frame` must be exactly [`FRAME_SIZE`] bytes; anything else is a
    /// programming error and panics before touching the device.
    pub fn send<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        frame: &[u8],
    ) -> Result<(), TransportError> {
        assert_eq!(frame.len(), FRAME_SIZE, "sending invalid frame length");
        let mut buf = [0u8; FRAME_SIZE];
        buf.copy_from_slice(frame);

        for attempt in 1..=self.max_retries {
            match transport.send(&buf)? {
                SendStatus::Sent => return Ok(()),
                SendStatus::Busy => {
                    trace!(attempt, max = self.max_retries, "device busy, retrying");
                    thread::sleep(BUSY_BACKOFF);
                }
                SendStatus::Rejected => return Err(TransportError::Rejected),
            }
        }
        Err(TransportError::RetriesExhausted {
            attempts: self.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that replays a script of send outcomes and counts attempts.
    struct ScriptedSends {
        script: Vec<SendStatus>,
        attempts: usize,
    }

    impl ScriptedSends {
        fn new(script: Vec<SendStatus>) -> Self {
            Self { script, attempts: 0 }
        }
    }

    impl Transport for ScriptedSends {
        fn send(&mut self, _frame: &[u8; FRAME_SIZE]) -> Result<SendStatus, TransportError> {
            let status = self
                .script
                .get(self.attempts)
                .copied()
                .unwrap_or(SendStatus::Busy);
            self.attempts += 1;
            Ok(status)
        }

        fn recv(&mut self, _timeout: Duration) -> Result<[u8; FRAME_SIZE], TransportError> {
            Err(TransportError::Timeout)
        }

        fn path(&self) -> &str {
            "scripted"
        }

        fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn transient_busy_is_retried_until_success() {
        let mut t = ScriptedSends::new(vec![
            SendStatus::Busy,
            SendStatus::Busy,
            SendStatus::Busy,
            SendStatus::Sent,
        ]);
        let sender = PacketSender::new(10);
        sender.send(&mut t, &[0u8; FRAME_SIZE]).unwrap();
        assert_eq!(t.attempts, 4);
    }

    #[test]
    fn budget_exhaustion_makes_exactly_max_attempts() {
        let mut t = ScriptedSends::new(vec![]);
        let sender = PacketSender::new(5);
        let err = sender.send(&mut t, &[0u8; FRAME_SIZE]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::RetriesExhausted { attempts: 5 }
        ));
        assert_eq!(t.attempts, 5);
    }

    #[test]
    fn rejection_fails_without_retrying() {
        let mut t = ScriptedSends::new(vec![SendStatus::Rejected]);
        let sender = PacketSender::new(10);
        let err = sender.send(&mut t, &[0u8; FRAME_SIZE]).unwrap_err();
        assert!(matches!(err, TransportError::Rejected));
        assert_eq!(t.attempts, 1);
    }

    #[test]
    #[should_panic(expected = "invalid frame length")]
    fn short_frame_is_a_programming_error() {
        let mut t = ScriptedSends::new(vec![SendStatus::Sent]);
        let _ = PacketSender::default().send(&mut t, &[0u8; 32]);
    }

    #[test]
    fn pad_frame_zero_fills_the_tail() {
        let frame = pad_frame(&[1, 2, 3]);
        assert_eq!(&frame[..3], &[1, 2, 3]);
        assert!(frame[3..].iter().all(|&b| b == 0));
    }
}
