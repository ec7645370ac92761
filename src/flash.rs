//! Firmware flash engine: the vibl bootloader handshake plus the full
//! keyboard-to-keyboard orchestration around it.
//!
//! The handshake walks Init → VersionChecked → UidChecked → Transferring →
//! Rebooting → Done; any error is terminal for the attempt and there is no
//! resume. Progress and log lines go to a single [`FlashObserver`]; a
//! foreground task typically bridges that to a channel while the engine
//! runs on a blocking task.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use vial_keyboard::discovery::{
    rediscover_bootloader, rediscover_keyboard, DeviceSource, RediscoverOptions,
};
use vial_keyboard::unlock::{ensure_unlocked, UnlockOptions};
use vial_keyboard::{Bootloader, Keyboard, KeyboardError, UnlockError, VialDevice};
use vial_transport::protocol::vibl;
use vial_transport::{CancelToken, TransportError};

use crate::firmware::{FirmwareError, FirmwareImage};

/// Everything the engine reports while it runs.
#[derive(Debug, Clone)]
pub enum FlashEvent {
    /// Human-readable status line.
    Log(String),
    /// Transfer progress in `0.0..=1.0`.
    Progress(f32),
    /// The operation finished; carries the final status line.
    Complete(String),
    /// The operation failed. `kind` is a stable machine-readable tag.
    Error { kind: &'static str, message: String },
}

/// Sink for [`FlashEvent`]s.
pub trait FlashObserver: Send {
    fn on_event(&self, event: FlashEvent);
}

/// Sending end of a tokio channel doubles as an observer; a closed
/// receiver just drops the events.
impl FlashObserver for UnboundedSender<FlashEvent> {
    fn on_event(&self, event: FlashEvent) {
        let _ = self.send(event);
    }
}

#[derive(Error, Debug)]
pub enum FlashError {
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    #[error("Unsupported bootloader version {0}")]
    Version(u8),

    #[error("Firmware image is for a different device (image UID {expected}, device UID {actual})")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Transfer failed at chunk {chunk}/{total}; unplug the device, plug it back in and retry")]
    Transfer {
        chunk: usize,
        total: usize,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Unlock(#[from] UnlockError),

    #[error(transparent)]
    Keyboard(#[from] KeyboardError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Flash cancelled")]
    Cancelled,
}

impl FlashError {
    /// Stable tag for [`FlashEvent::Error`].
    pub fn kind(&self) -> &'static str {
        match self {
            FlashError::Firmware(FirmwareError::Integrity { .. }) => "integrity",
            FlashError::Firmware(_) => "signature",
            FlashError::Version(_) => "version",
            FlashError::IdentityMismatch { .. } => "identity-mismatch",
            FlashError::Transfer { .. } => "transfer",
            FlashError::Unlock(UnlockError::Timeout(_)) => "timeout",
            FlashError::Unlock(_) => "unlock",
            FlashError::Keyboard(KeyboardError::RediscoveryTimeout(_)) => "timeout",
            FlashError::Keyboard(_) => "protocol",
            FlashError::Transport(_) => "transport",
            FlashError::Cancelled => "cancelled",
        }
    }
}

/// Handshake progress, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Init,
    VersionChecked,
    UidChecked,
    Transferring,
    Rebooting,
    Done,
}

/// Saves device state to an opaque blob before a flash and replays it
/// afterwards. The engine never looks inside the blob.
pub trait StateBackup: Send {
    fn save(&mut self, keyboard: &mut Keyboard) -> Result<Vec<u8>, KeyboardError>;
    fn restore(&mut self, keyboard: &mut Keyboard, blob: &[u8]) -> Result<(), KeyboardError>;
}

#[derive(Debug, Clone)]
pub struct FlashOptions {
    pub cancel: CancelToken,
    /// Bound on each wait for the device to re-enumerate after a reset.
    pub rediscover_timeout: Duration,
    /// Bound on the physical-presence unlock handshake.
    pub unlock_timeout: Duration,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            rediscover_timeout: vial_keyboard::discovery::DEFAULT_TIMEOUT,
            unlock_timeout: vial_keyboard::unlock::DEFAULT_TIMEOUT,
        }
    }
}

/// Run the vibl handshake against a bootloader that is already up.
///
/// Checks the bootloader version and UID before any payload byte moves;
/// an identity mismatch therefore aborts with zero bytes transferred. An
/// all-ones UID means a factory-unprogrammed part and is accepted with a
/// warning. When `enable_insecure_restore` is set, `VC 0x04` goes out right
/// before the reboot so the next boot accepts one unauthenticated restore.
pub fn flash_bootloader(
    boot: &mut Bootloader,
    image: &FirmwareImage,
    enable_insecure_restore: bool,
    observer: &dyn FlashObserver,
    cancel: &CancelToken,
) -> Result<(), FlashError> {
    let mut state = FlashState::Init;
    debug!(?state, path = boot.path(), "starting bootloader handshake");
    if cancel.is_cancelled() {
        return Err(FlashError::Cancelled);
    }

    let version = boot.query_version()?;
    if !vibl::SUPPORTED_VERSIONS.contains(&version) {
        return Err(FlashError::Version(version));
    }
    state = FlashState::VersionChecked;
    debug!(?state, version);

    let device_uid = boot.query_uid()?;
    if device_uid == [0xFF; 8] {
        warn!("bootloader UID is unprogrammed, skipping identity check");
        observer.on_event(FlashEvent::Log(
            "Warning: device UID is unprogrammed, skipping identity check".to_owned(),
        ));
    } else if device_uid != image.uid() {
        return Err(FlashError::IdentityMismatch {
            expected: hex::encode(image.uid()),
            actual: hex::encode(device_uid),
        });
    }
    state = FlashState::UidChecked;
    debug!(?state, uid = %hex::encode(device_uid));

    let total = image.chunk_count();
    observer.on_event(FlashEvent::Log(format!("Flashing {total} chunks...")));
    boot.begin_transfer(total as u16)?;
    state = FlashState::Transferring;
    debug!(?state, total);

    for (index, chunk) in image.chunks().enumerate() {
        if cancel.is_cancelled() {
            return Err(FlashError::Cancelled);
        }
        boot.send_chunk(&chunk).map_err(|source| FlashError::Transfer {
            chunk: index + 1,
            total,
            source,
        })?;
        observer.on_event(FlashEvent::Progress((index + 1) as f32 / total as f32));
    }

    state = FlashState::Rebooting;
    debug!(?state);
    if enable_insecure_restore {
        boot.enable_insecure_restore()?;
    }
    boot.reboot()?;

    state = FlashState::Done;
    info!(?state, "firmware transferred");
    Ok(())
}

/// Run a complete flash from whatever device state we start in.
///
/// Consumes the device, so a second concurrent flash of the same handle
/// cannot be expressed. A keyboard start point goes through: early UID
/// check against the image, optional state backup, unlock if locked,
/// reboot into the bootloader, UID-correlated rediscovery, the handshake,
/// and, when a backup was taken, rediscovery of the rebooted keyboard
/// followed by restore and re-lock. Meant for `spawn_blocking`; every wait
/// honors the cancellation token.
pub fn run_flash(
    device: VialDevice,
    image: &FirmwareImage,
    mut backup: Option<&mut dyn StateBackup>,
    source: &dyn DeviceSource,
    observer: &dyn FlashObserver,
    options: &FlashOptions,
) -> Result<(), FlashError> {
    let (mut keyboard, locked) = match device {
        VialDevice::Bootloader(mut boot) => {
            flash_bootloader(&mut boot, image, false, observer, &options.cancel)?;
            boot.close()?;
            observer.on_event(FlashEvent::Complete("Done!".to_owned()));
            return Ok(());
        }
        VialDevice::LockedKeyboard(kb) => (kb, true),
        VialDevice::UnlockedKeyboard(kb) => (kb, false),
    };

    let uid = keyboard.uid();
    if uid != image.uid() {
        return Err(FlashError::IdentityMismatch {
            expected: hex::encode(image.uid()),
            actual: hex::encode(uid),
        });
    }

    let blob = match backup.as_mut() {
        Some(b) => {
            observer.on_event(FlashEvent::Log("Saving current state...".to_owned()));
            Some(b.save(&mut keyboard)?)
        }
        None => None,
    };

    if locked {
        observer.on_event(FlashEvent::Log(
            "Unlock required: hold the unlock key combination...".to_owned(),
        ));
        let unlock_opts = UnlockOptions {
            timeout: options.unlock_timeout,
            cancel: options.cancel.clone(),
            ..UnlockOptions::default()
        };
        let mut last = (u16::MAX, 0);
        ensure_unlocked(&mut keyboard, &unlock_opts, |held, total| {
            if (held, total) != last {
                observer.on_event(FlashEvent::Log(format!("Unlock hold {held}/{total}")));
                last = (held, total);
            }
        })?;
    }

    observer.on_event(FlashEvent::Log("Restarting into bootloader...".to_owned()));
    keyboard.reboot_to_bootloader()?;
    keyboard.close()?;

    let rediscover = RediscoverOptions {
        timeout: options.rediscover_timeout,
        cancel: options.cancel.clone(),
        ..RediscoverOptions::default()
    };
    let mut boot = rediscover_bootloader(source, uid, &rediscover)?;

    flash_bootloader(&mut boot, image, blob.is_some(), observer, &options.cancel)?;
    boot.close()?;

    if let Some(blob) = blob {
        observer.on_event(FlashEvent::Log(
            "Waiting for the keyboard to come back...".to_owned(),
        ));
        let mut keyboard = rediscover_keyboard(source, uid, &rediscover)?;
        observer.on_event(FlashEvent::Log("Restoring saved state...".to_owned()));
        if let Some(b) = backup.as_mut() {
            b.restore(&mut keyboard, &blob)?;
        }
        keyboard.lock()?;
        keyboard.close()?;
    }

    observer.on_event(FlashEvent::Complete("Done!".to_owned()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use vial_keyboard::discovery::DeviceSource;
    use vial_transport::{
        DeviceCandidate, SendStatus, TargetMode, Transport, FRAME_SIZE,
    };

    use crate::firmware::encode_image;

    const UID: [u8; 8] = [0xAA, 0xBB, 0xCC, 0xDD, 0x00, 0x00, 0x00, 0x00];

    fn frame(bytes: &[u8]) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    fn uid_frame(uid: [u8; 8]) -> [u8; FRAME_SIZE] {
        frame(&uid)
    }

    /// Records every sent frame; answers recv from a scripted queue.
    #[derive(Clone)]
    struct MockTransport {
        sent: Arc<Mutex<Vec<[u8; FRAME_SIZE]>>>,
        responses: Arc<Mutex<VecDeque<[u8; FRAME_SIZE]>>>,
    }

    impl MockTransport {
        fn new(responses: Vec<[u8; FRAME_SIZE]>) -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(responses.into())),
            }
        }

        fn sent(&self) -> Vec<[u8; FRAME_SIZE]> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, frame: &[u8; FRAME_SIZE]) -> Result<SendStatus, TransportError> {
            self.sent.lock().unwrap().push(*frame);
            Ok(SendStatus::Sent)
        }

        fn recv(&mut self, _timeout: Duration) -> Result<[u8; FRAME_SIZE], TransportError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(TransportError::Timeout)
        }

        fn path(&self) -> &str {
            "mock"
        }

        fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Collects emitted events for assertions.
    #[derive(Default)]
    struct CollectObserver {
        events: Mutex<Vec<FlashEvent>>,
    }

    impl FlashObserver for CollectObserver {
        fn on_event(&self, event: FlashEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl CollectObserver {
        fn events(&self) -> Vec<FlashEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    /// Hands out pre-built transports in order.
    struct ScriptedSource {
        transports: Mutex<VecDeque<MockTransport>>,
    }

    impl ScriptedSource {
        fn new(transports: Vec<MockTransport>) -> Self {
            Self {
                transports: Mutex::new(transports.into()),
            }
        }
    }

    impl DeviceSource for ScriptedSource {
        fn candidates(&self, mode: TargetMode) -> Result<Vec<DeviceCandidate>, TransportError> {
            Ok(vec![DeviceCandidate {
                mode,
                path: "mock".to_owned(),
                vid: 0,
                pid: 0,
                product: None,
            }])
        }

        fn open(&self, _candidate: &DeviceCandidate) -> Result<Box<dyn Transport>, TransportError> {
            match self.transports.lock().unwrap().pop_front() {
                Some(t) => Ok(Box::new(t)),
                None => Err(TransportError::DeviceNotFound("mock".to_owned())),
            }
        }
    }

    fn test_image() -> FirmwareImage {
        // 130 bytes of payload, three chunks
        let payload = vec![0x77; 130];
        FirmwareImage::parse(&encode_image(b"VIALFW01", UID, 1700000000, &payload)).unwrap()
    }

    #[test]
    fn handshake_sends_the_full_vibl_sequence() {
        let transport = MockTransport::new(vec![frame(&[1]), uid_frame(UID)]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));
        let observer = CollectObserver::default();

        flash_bootloader(&mut boot, &test_image(), false, &observer, &CancelToken::new())
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 7);
        assert_eq!(&sent[0][..3], &[b'V', b'C', 0x00]);
        assert_eq!(&sent[1][..3], &[b'V', b'C', 0x01]);
        assert_eq!(&sent[2][..5], &[b'V', b'C', 0x02, 3, 0]);
        assert!(sent[3].iter().all(|&b| b == 0x77));
        assert!(sent[4].iter().all(|&b| b == 0x77));
        assert_eq!(&sent[5][..2], &[0x77, 0x77]);
        assert!(sent[5][2..].iter().all(|&b| b == 0));
        assert_eq!(&sent[6][..3], &[b'V', b'C', 0x03]);

        let progress: Vec<f32> = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                FlashEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert!((progress[2] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn insecure_restore_goes_out_before_the_reboot() {
        let transport = MockTransport::new(vec![frame(&[0]), uid_frame(UID)]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));

        flash_bootloader(
            &mut boot,
            &test_image(),
            true,
            &CollectObserver::default(),
            &CancelToken::new(),
        )
        .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 8);
        assert_eq!(&sent[6][..3], &[b'V', b'C', 0x04]);
        assert_eq!(&sent[7][..3], &[b'V', b'C', 0x03]);
    }

    #[test]
    fn unsupported_version_aborts_before_identity() {
        let transport = MockTransport::new(vec![frame(&[7])]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));

        let err = flash_bootloader(
            &mut boot,
            &test_image(),
            false,
            &CollectObserver::default(),
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, FlashError::Version(7)));
        assert_eq!(err.kind(), "version");
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn uid_mismatch_aborts_with_zero_chunks() {
        let foreign = [0x00; 8];
        let transport = MockTransport::new(vec![frame(&[1]), uid_frame(foreign)]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));

        let err = flash_bootloader(
            &mut boot,
            &test_image(),
            false,
            &CollectObserver::default(),
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, FlashError::IdentityMismatch { .. }));
        // only the version and UID queries went out
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn unprogrammed_uid_is_accepted_with_a_warning() {
        let transport = MockTransport::new(vec![frame(&[1]), uid_frame([0xFF; 8])]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));
        let observer = CollectObserver::default();

        flash_bootloader(&mut boot, &test_image(), false, &observer, &CancelToken::new())
            .unwrap();

        assert!(observer.events().iter().any(|e| matches!(
            e,
            FlashEvent::Log(msg) if msg.contains("unprogrammed")
        )));
    }

    #[test]
    fn cancellation_stops_the_handshake_before_any_frame() {
        let transport = MockTransport::new(vec![]);
        let mut boot = Bootloader::new(Box::new(transport.clone()));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = flash_bootloader(
            &mut boot,
            &test_image(),
            false,
            &CollectObserver::default(),
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, FlashError::Cancelled));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn run_flash_from_a_keyboard_reboots_rediscovers_and_flashes() {
        // the running keyboard answers the identity query at open time
        let mut identity = [0u8; FRAME_SIZE];
        identity[..4].copy_from_slice(&6u32.to_le_bytes());
        identity[4..12].copy_from_slice(&UID);
        let kb_transport = MockTransport::new(vec![identity]);
        let keyboard = Keyboard::open(Box::new(kb_transport.clone())).unwrap();

        // the rediscovered bootloader answers its UID probe, then the handshake
        let boot_transport =
            MockTransport::new(vec![uid_frame(UID), frame(&[1]), uid_frame(UID)]);
        let source = ScriptedSource::new(vec![boot_transport.clone()]);
        let observer = CollectObserver::default();

        run_flash(
            VialDevice::UnlockedKeyboard(keyboard),
            &test_image(),
            None,
            &source,
            &observer,
            &FlashOptions::default(),
        )
        .unwrap();

        // identity query then the bootloader jump
        let kb_sent = kb_transport.sent();
        assert_eq!(kb_sent.len(), 2);
        assert_eq!(&kb_sent[1][..1], &[0x0B]);

        // rediscovery UID probe plus the full handshake
        let boot_sent = boot_transport.sent();
        assert_eq!(&boot_sent[0][..3], &[b'V', b'C', 0x01]);
        assert_eq!(&boot_sent[1][..3], &[b'V', b'C', 0x00]);
        assert_eq!(boot_sent.len(), 8);

        assert!(matches!(
            observer.events().last(),
            Some(FlashEvent::Complete(_))
        ));
    }

    #[test]
    fn run_flash_rejects_a_foreign_keyboard_before_any_traffic() {
        let mut identity = [0u8; FRAME_SIZE];
        identity[..4].copy_from_slice(&6u32.to_le_bytes());
        identity[4..12].copy_from_slice(&[0x42; 8]);
        let kb_transport = MockTransport::new(vec![identity]);
        let keyboard = Keyboard::open(Box::new(kb_transport.clone())).unwrap();

        let source = ScriptedSource::new(vec![]);
        let err = run_flash(
            VialDevice::UnlockedKeyboard(keyboard),
            &test_image(),
            None,
            &source,
            &CollectObserver::default(),
            &FlashOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, FlashError::IdentityMismatch { .. }));
        // only the open-time identity query was sent
        assert_eq!(kb_transport.sent().len(), 1);
    }
}
