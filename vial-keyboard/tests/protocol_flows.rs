//! Protocol flow tests against a scripted mock transport.
//!
//! Exercises the unlock handshake, the combo dynamic-entry adapter and
//! UID-correlated rediscovery without hardware. Frame layouts follow the
//! comments in `vial_transport::protocol`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vial_keyboard::combo::{ComboEntry, ComboStore};
use vial_keyboard::discovery::{
    rediscover_bootloader, DeviceSource, RediscoverOptions,
};
use vial_keyboard::error::{KeyboardError, UnlockError};
use vial_keyboard::unlock::{ensure_unlocked, UnlockOptions};
use vial_keyboard::{Keyboard, KeyboardProfile, KeycodeRegistry};
use vial_transport::{
    DeviceCandidate, SendStatus, TargetMode, Transport, TransportError, FRAME_SIZE,
};

const UID: [u8; 8] = [0xAA, 0xBB, 0xCC, 0xDD, 0x00, 0x00, 0x00, 0x00];

fn frame(bytes: &[u8]) -> [u8; FRAME_SIZE] {
    let mut out = [0u8; FRAME_SIZE];
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

/// Response to GET_KEYBOARD_ID: u32 LE protocol + u64-sized UID.
fn identity_frame(protocol: u32, uid: [u8; 8]) -> [u8; FRAME_SIZE] {
    let mut bytes = protocol.to_le_bytes().to_vec();
    bytes.extend_from_slice(&uid);
    frame(&bytes)
}

fn unlock_poll_frame(unlocked: bool, in_progress: bool, counter: u16) -> [u8; FRAME_SIZE] {
    let mut bytes = vec![unlocked as u8, in_progress as u8];
    bytes.extend_from_slice(&counter.to_le_bytes());
    frame(&bytes)
}

/// Combo-get response: status byte, then the five codes.
fn combo_frame(codes: [u16; 5]) -> [u8; FRAME_SIZE] {
    let mut bytes = vec![0u8];
    for code in codes {
        bytes.extend_from_slice(&code.to_le_bytes());
    }
    frame(&bytes)
}

#[derive(Clone, Default)]
struct MockTransport {
    sent: Arc<Mutex<Vec<[u8; FRAME_SIZE]>>>,
    responses: Arc<Mutex<VecDeque<[u8; FRAME_SIZE]>>>,
    /// Served when the response queue runs dry (for endless polling).
    when_empty: Option<[u8; FRAME_SIZE]>,
    /// Frames starting with this prefix are rejected outright.
    reject_prefix: Option<Vec<u8>>,
}

impl MockTransport {
    fn push(&self, response: [u8; FRAME_SIZE]) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn sent(&self) -> Vec<[u8; FRAME_SIZE]> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8; FRAME_SIZE]) -> Result<SendStatus, TransportError> {
        if let Some(prefix) = &self.reject_prefix {
            if data.starts_with(prefix) {
                return Ok(SendStatus::Rejected);
            }
        }
        self.sent.lock().unwrap().push(*data);
        Ok(SendStatus::Sent)
    }

    fn recv(&mut self, _timeout: Duration) -> Result<[u8; FRAME_SIZE], TransportError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => self.when_empty.ok_or(TransportError::Timeout),
        }
    }

    fn path(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn open_keyboard(mock: &MockTransport) -> Keyboard {
    mock.push(identity_frame(6, UID));
    Keyboard::open(Box::new(mock.clone())).unwrap()
}

fn registry() -> KeycodeRegistry {
    KeycodeRegistry::build(&KeyboardProfile {
        layers: 4,
        macro_count: 16,
        tap_dance_count: 4,
        combo_count: 4,
        ..Default::default()
    })
}

fn fast_unlock(timeout: Duration) -> UnlockOptions {
    UnlockOptions {
        poll_interval: Duration::from_millis(1),
        timeout,
        ..Default::default()
    }
}

#[test]
fn keyboard_identity_is_parsed_at_open() {
    let mock = MockTransport::default();
    let kb = open_keyboard(&mock);
    assert_eq!(kb.uid(), UID);
    assert_eq!(kb.vial_protocol(), 6);

    let sent = mock.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][..2], &[0xFE, 0x00]);
}

#[test]
fn unlock_returns_immediately_when_already_open() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[1])); // unlock status: unlocked

    ensure_unlocked(&mut kb, &fast_unlock(Duration::from_secs(1)), |_, _| {}).unwrap();

    // identity query + status query, no UNLOCK_START
    let sent = mock.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(&sent[1][..2], &[0xFE, 0x05]);
}

#[test]
fn unlock_polls_until_confirmed_and_reports_progress() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[0])); // locked
    mock.push(frame(&[])); // UNLOCK_START ack
    mock.push(unlock_poll_frame(false, true, 3));
    mock.push(unlock_poll_frame(false, true, 2));
    mock.push(unlock_poll_frame(false, true, 1));
    mock.push(unlock_poll_frame(true, false, 0));

    let mut seen = Vec::new();
    ensure_unlocked(&mut kb, &fast_unlock(Duration::from_secs(1)), |held, total| {
        seen.push((held, total))
    })
    .unwrap();

    assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
    // counters observed before success never increased
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn unlock_gives_up_after_the_deadline() {
    let mut mock = MockTransport::default();
    mock.when_empty = Some(unlock_poll_frame(false, true, 5));
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[0])); // locked
    mock.push(frame(&[])); // UNLOCK_START ack

    let err = ensure_unlocked(&mut kb, &fast_unlock(Duration::from_millis(20)), |_, _| {})
        .unwrap_err();
    assert!(matches!(err, UnlockError::Timeout(_)));
}

#[test]
fn unlock_honors_cancellation() {
    let mut mock = MockTransport::default();
    mock.when_empty = Some(unlock_poll_frame(false, true, 5));
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[0])); // locked
    mock.push(frame(&[])); // UNLOCK_START ack

    let options = fast_unlock(Duration::from_secs(10));
    options.cancel.cancel();
    let err = ensure_unlocked(&mut kb, &options, |_, _| {}).unwrap_err();
    assert!(matches!(err, UnlockError::Cancelled));
}

#[test]
fn combo_reload_serializes_device_state() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    // slot 0: A+B chord produces Escape; slot 1: empty
    mock.push(combo_frame([0x04, 0x05, 0, 0, 0x29]));
    mock.push(combo_frame([0, 0, 0, 0, 0]));

    let registry = registry();
    let mut store = ComboStore::new(2);
    store.reload(&mut kb, &registry).unwrap();

    assert_eq!(
        store.get(0).unwrap().0,
        ["KC_A", "KC_B", "KC_NO", "KC_NO", "KC_ESCAPE"]
    );
    assert_eq!(store.get(1).unwrap(), &ComboEntry::default());
    assert!(matches!(
        store.get(2),
        Err(KeyboardError::IndexOutOfRange { index: 2, capacity: 2 })
    ));
}

#[test]
fn combo_set_writes_the_wire_format() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[])); // set ack

    let registry = registry();
    let mut store = ComboStore::new(4);
    let entry = ComboEntry([
        "KC_A".into(),
        "KC_B".into(),
        "KC_NO".into(),
        "KC_NO".into(),
        "KC_C".into(),
    ]);
    store
        .set(&mut kb, &registry, 2, entry.clone(), &fast_unlock(Duration::from_secs(1)))
        .unwrap();

    let sent = mock.sent();
    let last = sent.last().unwrap();
    assert_eq!(
        &last[..14],
        &[0xFE, 0x0D, 0x04, 2, 0x04, 0, 0x05, 0, 0, 0, 0, 0, 0x06, 0]
    );
    assert_eq!(store.get(2).unwrap(), &entry);
}

#[test]
fn combo_set_is_idempotent_on_cached_state() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[])); // set ack for the first write

    let registry = registry();
    let mut store = ComboStore::new(1);
    let entry = ComboEntry([
        "KC_A".into(),
        "KC_B".into(),
        "KC_NO".into(),
        "KC_NO".into(),
        "KC_C".into(),
    ]);
    let unlock = fast_unlock(Duration::from_secs(1));

    store.set(&mut kb, &registry, 0, entry.clone(), &unlock).unwrap();
    let frames_after_first = mock.sent().len();
    store.set(&mut kb, &registry, 0, entry, &unlock).unwrap();
    assert_eq!(mock.sent().len(), frames_after_first);
}

#[test]
fn combo_set_rolls_back_on_a_failed_write() {
    let mut mock = MockTransport::default();
    mock.reject_prefix = Some(vec![0xFE, 0x0D, 0x04]);
    let mut kb = open_keyboard(&mock);

    let registry = registry();
    let mut store = ComboStore::new(1);
    let entry = ComboEntry([
        "KC_A".into(),
        "KC_NO".into(),
        "KC_NO".into(),
        "KC_NO".into(),
        "KC_B".into(),
    ]);
    let err = store
        .set(&mut kb, &registry, 0, entry, &fast_unlock(Duration::from_secs(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        KeyboardError::Transport(TransportError::Rejected)
    ));
    // the cache still reports the last state the device confirmed
    assert_eq!(store.get(0).unwrap(), &ComboEntry::default());
}

#[test]
fn combo_reset_result_requires_the_unlock_gate() {
    let mut mock = MockTransport::default();
    mock.when_empty = Some(unlock_poll_frame(false, true, 5)); // never unlocks
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[0])); // unlock status: locked
    mock.push(frame(&[])); // UNLOCK_START ack

    let registry = registry();
    let mut store = ComboStore::new(1);
    let entry = ComboEntry([
        "KC_A".into(),
        "KC_B".into(),
        "KC_NO".into(),
        "KC_NO".into(),
        "RESET".into(),
    ]);
    let err = store
        .set(&mut kb, &registry, 0, entry, &fast_unlock(Duration::from_millis(20)))
        .unwrap_err();
    assert!(matches!(err, KeyboardError::Unlock(UnlockError::Timeout(_))));

    // the destructive write never reached the wire
    assert!(mock
        .sent()
        .iter()
        .all(|f| !f.starts_with(&[0xFE, 0x0D, 0x04])));
}

#[test]
fn combo_restore_ignores_surplus_entries() {
    let mock = MockTransport::default();
    let mut kb = open_keyboard(&mock);
    mock.push(frame(&[])); // one ack is enough: only slot 0 differs

    let registry = registry();
    let mut store = ComboStore::new(1);
    let saved = vec![
        ComboEntry([
            "KC_A".into(),
            "KC_B".into(),
            "KC_NO".into(),
            "KC_NO".into(),
            "KC_C".into(),
        ]),
        ComboEntry([
            "KC_X".into(),
            "KC_Y".into(),
            "KC_NO".into(),
            "KC_NO".into(),
            "KC_Z".into(),
        ]),
    ];
    store
        .restore(&mut kb, &registry, &saved, &fast_unlock(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(store.get(0).unwrap(), &saved[0]);
    // only one combo write went out
    let combo_writes = mock
        .sent()
        .iter()
        .filter(|f| f.starts_with(&[0xFE, 0x0D, 0x04]))
        .count();
    assert_eq!(combo_writes, 1);
}

/// Source whose scans come from a script; each open yields a transport
/// that answers the bootloader UID query.
struct ScriptedSource {
    scans: Mutex<VecDeque<Vec<DeviceCandidate>>>,
    device_uid: [u8; 8],
    opens: Mutex<usize>,
}

impl ScriptedSource {
    fn new(scans: Vec<Vec<DeviceCandidate>>, device_uid: [u8; 8]) -> Self {
        Self {
            scans: Mutex::new(scans.into()),
            device_uid,
            opens: Mutex::new(0),
        }
    }

    fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }
}

impl DeviceSource for ScriptedSource {
    fn candidates(&self, _mode: TargetMode) -> Result<Vec<DeviceCandidate>, TransportError> {
        Ok(self.scans.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn open(&self, _candidate: &DeviceCandidate) -> Result<Box<dyn Transport>, TransportError> {
        *self.opens.lock().unwrap() += 1;
        let mock = MockTransport::default();
        mock.push(frame(&self.device_uid));
        Ok(Box::new(mock))
    }
}

fn bootloader_candidate() -> DeviceCandidate {
    DeviceCandidate {
        mode: TargetMode::Bootloader,
        path: "mock-bl".into(),
        vid: 0xC2AB,
        pid: 0x2024,
        product: Some("vibl".into()),
    }
}

#[test]
fn rediscovery_waits_for_the_matching_uid() {
    // nothing on the first scan, the device re-enumerates on the second
    let source = ScriptedSource::new(vec![vec![], vec![bootloader_candidate()]], UID);
    let options = RediscoverOptions {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let boot = rediscover_bootloader(&source, UID, &options).unwrap();
    assert_eq!(boot.path(), "mock");
}

#[test]
fn rediscovery_skips_devices_with_foreign_uids() {
    let source = ScriptedSource::new(vec![vec![bootloader_candidate()]], [0x11; 8]);
    let options = RediscoverOptions {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let err = match rediscover_bootloader(&source, UID, &options) {
        Ok(_) => panic!("no device carries the wanted UID"),
        Err(err) => err,
    };
    assert!(matches!(err, KeyboardError::RediscoveryTimeout(_)));
}

#[test]
fn rediscovery_honors_cancellation_before_opening_anything() {
    let source = ScriptedSource::new(vec![vec![bootloader_candidate()]], UID);
    let options = RediscoverOptions {
        poll_interval: Duration::from_millis(1),
        timeout: Duration::from_secs(10),
        ..Default::default()
    };
    options.cancel.cancel();

    let err = match rediscover_bootloader(&source, UID, &options) {
        Ok(_) => panic!("a cancelled rediscovery must not yield a device"),
        Err(err) => err,
    };
    assert!(matches!(err, KeyboardError::Cancelled));
    assert_eq!(source.opens(), 0);
}
