use super::*;
use crate::config::{CameraConfig, CamsessionConfig};
use crate::error::{CaptureError, StorageError};
use crate::hardware::{
    FixedDisplay, FocusMode, HardwareEvent, PictureFormat, SimulatedCameraProvider,
    SimulatedCameraSpec, SimulatedOp, SurfaceHandle,
};
use crate::orientation::Rotation;
use crate::size::Size;
use crate::storage::{
    DirectoryStorage, GeoLocation, MediaRecord, NewMediaRecord, RecordRef, StorageGateway,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);
const SURFACE: SurfaceHandle = SurfaceHandle(1);

/// Directory storage that counts calls and can be told to fail
struct RecordingStorage {
    inner: DirectoryStorage,
    writes: AtomicUsize,
    inserts: Mutex<Vec<NewMediaRecord>>,
    fail_writes: AtomicBool,
    fail_inserts: AtomicBool,
}

impl RecordingStorage {
    fn new(root: &Path) -> Self {
        Self {
            inner: DirectoryStorage::with_root(root, "media_index.json", "jpeg").unwrap(),
            writes: AtomicUsize::new(0),
            inserts: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn inserts(&self) -> Vec<NewMediaRecord> {
        self.inserts.lock().clone()
    }
}

impl StorageGateway for RecordingStorage {
    fn generate_filename(&self) -> String {
        self.inner.generate_filename()
    }

    fn extension(&self) -> &str {
        self.inner.extension()
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, StorageError> {
        self.inner.path_for(filename)
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.write_bytes(path, data)
    }

    fn insert_record(&self, record: NewMediaRecord) -> Result<RecordRef, StorageError> {
        self.inserts.lock().push(record.clone());
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Index {
                details: "media index unavailable".to_string(),
            });
        }
        self.inner.insert_record(record)
    }

    fn query_record(&self, record: &RecordRef) -> Result<Option<MediaRecord>, StorageError> {
        self.inner.query_record(record)
    }

    fn delete_record(&self, record: &RecordRef) -> Result<(), StorageError> {
        self.inner.delete_record(record)
    }
}

struct Harness {
    manager: SessionManager,
    provider: SimulatedCameraProvider,
    storage: Arc<RecordingStorage>,
    _temp: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(CamsessionConfig::default().camera)
    }

    fn with_config(config: CameraConfig) -> Self {
        let temp = TempDir::new().unwrap();
        let provider = SimulatedCameraProvider::new(vec![
            SimulatedCameraSpec::back(90),
            SimulatedCameraSpec::front(270),
        ]);
        let storage = Arc::new(RecordingStorage::new(&temp.path().join("DCIM/Camera")));
        let manager =
            SessionManager::new(Arc::new(provider.clone()), storage.clone(), config).unwrap();

        Self {
            manager,
            provider,
            storage,
            _temp: temp,
        }
    }

    fn landscape(&self) -> DeviceProxy {
        self.manager
            .device(Arc::new(FixedDisplay::new(Rotation::Rotate0, false)))
    }

    fn portrait(&self) -> DeviceProxy {
        self.manager
            .device(Arc::new(FixedDisplay::new(Rotation::Rotate0, true)))
    }

    fn flush(&self) {
        assert!(self.manager.flush(WAIT), "worker did not drain in time");
    }

    /// Open the rear camera and wait for it
    fn open(&self) -> DeviceProxy {
        let proxy = self.landscape();
        assert!(proxy.start_preview(SURFACE));
        self.flush();
        assert!(proxy.is_open());
        proxy
    }

    fn lifecycle(&self) -> Vec<HardwareEvent> {
        self.provider
            .events()
            .into_iter()
            .filter(|e| matches!(e, HardwareEvent::Opened(_) | HardwareEvent::Released(_)))
            .collect()
    }
}

/// Occupy the worker inside a picture callback until the returned sender fires
fn block_worker(proxy: &DeviceProxy) -> mpsc::Sender<()> {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    assert!(proxy.take_picture(move |_| {
        entered_tx.send(()).unwrap();
        let _ = release_rx.recv_timeout(WAIT);
    }));
    entered_rx.recv_timeout(WAIT).unwrap();

    release_tx
}

fn picture_channel() -> (
    mpsc::Sender<CaptureResult>,
    mpsc::Receiver<CaptureResult>,
) {
    mpsc::channel()
}

#[test]
fn test_start_preview_opens_and_configures_camera() {
    let harness = Harness::new();
    let proxy = harness.portrait();

    assert!(!proxy.is_open());
    assert!(proxy.start_preview(SURFACE));
    harness.flush();

    assert_eq!(harness.manager.snapshot().camera_id, Some(0));
    let events = harness.provider.events();
    assert_eq!(events[0], HardwareEvent::Opened(0));
    assert!(events.contains(&HardwareEvent::DisplayOrientation { id: 0, degrees: 90 }));
    assert!(events.contains(&HardwareEvent::ParametersApplied {
        id: 0,
        preview_size: Some(Size::new(1920, 1080)),
        picture_size: Some(Size::new(4032, 3024)),
        picture_format: PictureFormat::Jpeg,
        jpeg_quality: 100,
        focus_mode: Some(FocusMode::Auto),
    }));
    assert!(events.contains(&HardwareEvent::SurfaceBound {
        id: 0,
        surface: SURFACE
    }));
    assert!(events.contains(&HardwareEvent::PreviewStarted(0)));
    assert_eq!(events.last(), Some(&HardwareEvent::AutoFocusRequested(0)));
}

#[test]
fn test_display_orientation_follows_device_rotation() {
    let harness = Harness::new();
    let display = Arc::new(FixedDisplay::new(Rotation::Rotate180, false));
    let proxy = harness.manager.device(display.clone());

    assert!(proxy.start_preview_with(SURFACE, 1));
    harness.flush();
    assert!(harness
        .provider
        .events()
        .contains(&HardwareEvent::DisplayOrientation { id: 1, degrees: 270 }));

    display.set_rotation(Rotation::Rotate90);
    assert!(proxy.start_preview_with(SURFACE, 0));
    harness.flush();
    assert!(harness
        .provider
        .events()
        .contains(&HardwareEvent::DisplayOrientation { id: 0, degrees: 0 }));
}

#[test]
fn test_front_camera_keeps_focus_mode_unset() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    assert!(proxy.start_preview_with(SURFACE, 1));
    harness.flush();

    let applied = harness.provider.events().into_iter().find_map(|e| match e {
        HardwareEvent::ParametersApplied { focus_mode, .. } => Some(focus_mode),
        _ => None,
    });
    assert_eq!(applied, Some(None));
    assert_eq!(harness.manager.snapshot().camera_id, Some(1));
}

#[test]
fn test_switching_cameras_releases_before_opening() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    assert!(proxy.start_preview_with(SURFACE, 0));
    assert!(proxy.start_preview_with(SURFACE, 1));
    harness.flush();

    assert_eq!(
        harness.lifecycle(),
        vec![
            HardwareEvent::Opened(0),
            HardwareEvent::Released(0),
            HardwareEvent::Opened(1),
        ]
    );
    assert_eq!(harness.provider.open_handles(), 1);
    assert_eq!(harness.provider.max_open_handles(), 1);
    assert_eq!(harness.manager.snapshot().camera_id, Some(1));
}

#[test]
fn test_restarting_open_camera_is_noop() {
    let harness = Harness::new();
    let proxy = harness.open();

    assert!(proxy.start_preview_with(SURFACE, 0));
    harness.flush();

    assert_eq!(harness.lifecycle(), vec![HardwareEvent::Opened(0)]);
    assert_eq!(harness.manager.stats().commands_failed, 0);
}

#[test]
fn test_out_of_range_camera_falls_back_to_default() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    assert!(proxy.start_preview_with(SURFACE, 7));
    harness.flush();
    assert_eq!(harness.manager.snapshot().camera_id, Some(0));

    assert!(proxy.start_preview_with(SURFACE, 1));
    assert!(proxy.start_preview_with(SURFACE, -3));
    harness.flush();
    assert_eq!(harness.manager.snapshot().camera_id, Some(0));
    assert_eq!(harness.provider.max_open_handles(), 1);
}

#[test]
fn test_disabled_by_policy_still_opens() {
    let harness = Harness::new();
    harness.provider.set_disabled_by_policy(true);

    harness.open();
    assert_eq!(harness.manager.snapshot().camera_id, Some(0));
}

#[test]
fn test_open_failure_leaves_session_closed() {
    let harness = Harness::new();
    harness.provider.set_unavailable(0, true);
    let proxy = harness.landscape();

    assert!(proxy.start_preview(SURFACE));
    harness.flush();

    assert!(!proxy.is_open());
    assert_eq!(harness.provider.open_handles(), 0);
    assert_eq!(harness.manager.stats().commands_failed, 1);

    // recovers once the camera is back
    harness.provider.set_unavailable(0, false);
    assert!(proxy.start_preview(SURFACE));
    harness.flush();
    assert!(proxy.is_open());
}

#[test]
fn test_start_preview_failure_closes_session() {
    let harness = Harness::new();
    harness.provider.fail_next(SimulatedOp::StartPreview);
    let proxy = harness.landscape();

    assert!(proxy.start_preview(SURFACE));
    harness.flush();

    assert!(!proxy.is_open());
    assert_eq!(
        harness.lifecycle(),
        vec![HardwareEvent::Opened(0), HardwareEvent::Released(0)]
    );
    assert_eq!(harness.provider.open_handles(), 0);
    assert_eq!(harness.manager.snapshot().camera_id, None);
}

#[test]
fn test_stop_preview_is_idempotent() {
    let harness = Harness::new();
    let proxy = harness.open();

    proxy.surface_destroyed(SURFACE);
    proxy.surface_destroyed(SURFACE);
    harness.flush();

    let closed = harness.manager.snapshot();
    assert_eq!(closed.camera_id, None);
    assert!(!closed.capturing);
    assert_eq!(
        harness.lifecycle(),
        vec![HardwareEvent::Opened(0), HardwareEvent::Released(0)]
    );
    assert_eq!(harness.manager.stats().commands_failed, 0);

    // the public guard refuses once closed
    assert!(!proxy.stop_preview());
}

#[test]
fn test_surface_created_does_not_start_preview() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    proxy.surface_created(SURFACE);
    harness.flush();

    assert!(harness.provider.events().is_empty());
    assert_eq!(harness.manager.stats().commands_submitted, 0);
}

#[test]
fn test_configure_then_stop_then_configure_runs_in_order() {
    let harness = Harness::new();
    let proxy = harness.open();
    harness.provider.clear_events();

    proxy.surface_changed(SURFACE, 0, 640, 480);
    proxy.surface_destroyed(SURFACE);
    proxy.surface_changed(SURFACE, 0, 1280, 720);
    harness.flush();

    assert_eq!(
        harness.provider.events(),
        vec![
            HardwareEvent::ParametersApplied {
                id: 0,
                preview_size: Some(Size::new(640, 480)),
                picture_size: Some(Size::new(4032, 3024)),
                picture_format: PictureFormat::Jpeg,
                jpeg_quality: 100,
                focus_mode: Some(FocusMode::Auto),
            },
            HardwareEvent::Released(0),
        ]
    );
    assert_eq!(harness.manager.stats().commands_failed, 0);
}

#[test]
fn test_portrait_surface_is_matched_in_landscape_terms() {
    let harness = Harness::new();
    let proxy = harness.portrait();
    assert!(proxy.start_preview(SURFACE));
    harness.flush();
    harness.provider.clear_events();

    proxy.surface_changed(SURFACE, 0, 720, 1280);
    harness.flush();

    let applied = harness.provider.events().into_iter().find_map(|e| match e {
        HardwareEvent::ParametersApplied {
            preview_size,
            picture_size,
            ..
        } => Some((preview_size, picture_size)),
        _ => None,
    });
    assert_eq!(
        applied,
        Some((Some(Size::new(1920, 1080)), Some(Size::new(1920, 1080))))
    );
}

#[test]
fn test_configure_without_camera_is_noop() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    proxy.surface_changed(SURFACE, 0, 640, 480);
    harness.flush();

    assert!(harness.provider.events().is_empty());
    let stats = harness.manager.stats();
    assert_eq!(stats.commands_processed, 1);
    assert_eq!(stats.commands_failed, 0);
}

#[test]
fn test_guards_refuse_when_no_camera_open() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    assert!(!proxy.take_picture(|_| panic!("must not run")));
    assert!(!proxy.set_auto_focus());
    assert!(!proxy.stop_preview());
    assert!(proxy.capture().is_none());
    assert!(proxy.auto_focus().is_none());
    assert_eq!(harness.manager.stats().commands_submitted, 0);
}

#[test]
fn test_capture_persists_and_indexes_picture() {
    let harness = Harness::new();
    let proxy = harness.open();
    proxy.surface_changed(SURFACE, 0, 1920, 1080);

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();

    let picture = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(picture.camera_id, 0);
    assert_eq!(picture.size, Size::new(1920, 1080));
    assert_eq!(picture.orientation, 90);
    assert_eq!(picture.size_bytes, 4096);
    assert_eq!(std::fs::read(&picture.path).unwrap().len(), 4096);

    assert_eq!(harness.storage.writes(), 1);
    let inserts = harness.storage.inserts();
    assert_eq!(inserts.len(), 1);
    assert_eq!((inserts[0].width, inserts[0].height), (1920, 1080));
    assert_eq!(inserts[0].orientation, 90);
    assert_eq!(inserts[0].location, None);

    let record = harness
        .storage
        .query_record(&picture.record)
        .unwrap()
        .unwrap();
    assert_eq!(record.path, picture.path);
    assert_eq!(record.display_name, format!("{}.jpeg", record.title));

    assert!(!harness.manager.snapshot().capturing);
    assert!(!harness.manager.snapshot().capture_queued);
    assert_eq!(harness.manager.stats().pictures_persisted, 1);
}

#[test]
fn test_back_to_back_captures_get_distinct_files() {
    let harness = Harness::new();
    let proxy = harness.open();

    let (tx, rx) = picture_channel();
    let second_tx = tx.clone();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();
    assert!(proxy.take_picture(move |result| second_tx.send(result).unwrap()));
    harness.flush();

    let first = rx.recv_timeout(WAIT).unwrap().unwrap();
    let second = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert_ne!(first.path, second.path);
    assert!(first.path.exists());
    assert!(second.path.exists());

    let titles: Vec<String> = harness
        .storage
        .inserts()
        .into_iter()
        .map(|record| record.title)
        .collect();
    assert_ne!(titles[0], titles[1]);

    // removing one picture leaves the other file in place
    harness.storage.delete_record(&second.record).unwrap();
    assert!(!second.path.exists());
    let kept = harness.storage.query_record(&first.record).unwrap().unwrap();
    assert!(kept.path.exists());
    assert_eq!(std::fs::read(&kept.path).unwrap().len(), 4096);
}

#[test]
fn test_capture_with_location_tags_record() {
    let harness = Harness::new();
    let proxy = harness.open();
    let location = GeoLocation {
        latitude: 52.52,
        longitude: 13.405,
    };

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture_at(location, move |result| tx.send(result).unwrap()));
    harness.flush();

    let picture = rx.recv_timeout(WAIT).unwrap().unwrap();
    let record = harness
        .storage
        .query_record(&picture.record)
        .unwrap()
        .unwrap();
    assert_eq!(record.location, Some(location));
}

#[test]
fn test_insert_failure_is_reported_and_clears_capturing() {
    let harness = Harness::new();
    harness.storage.fail_inserts.store(true, Ordering::SeqCst);
    let proxy = harness.open();

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();

    match rx.recv_timeout(WAIT).unwrap() {
        Err(CaptureError::Index { path, .. }) => assert!(path.exists()),
        other => panic!("expected index error, got {:?}", other),
    }
    assert_eq!(harness.storage.writes(), 1);
    assert_eq!(harness.storage.inserts().len(), 1);
    assert!(!harness.manager.snapshot().capturing);
    assert_eq!(harness.manager.stats().pictures_persisted, 0);

    // the capture slot is free again
    assert!(proxy.take_picture(|_| {}));
    harness.flush();
}

#[test]
fn test_write_failure_skips_indexing() {
    let harness = Harness::new();
    harness.storage.fail_writes.store(true, Ordering::SeqCst);
    let proxy = harness.open();

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();

    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(CaptureError::Write(_))
    ));
    assert!(harness.storage.inserts().is_empty());
    assert!(!harness.manager.snapshot().capturing);
}

#[test]
fn test_hardware_capture_failure_keeps_session_open() {
    let harness = Harness::new();
    let proxy = harness.open();
    harness.provider.fail_next(SimulatedOp::TakePicture);

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();

    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(CaptureError::Hardware(_))
    ));
    assert_eq!(harness.storage.writes(), 0);
    assert!(proxy.is_open());
    assert!(!harness.manager.snapshot().capturing);
}

#[test]
fn test_duplicate_take_picture_is_rejected() {
    let harness = Harness::new();
    let proxy = harness.open();
    harness
        .provider
        .set_capture_delay(Duration::from_millis(300));

    assert!(proxy.take_picture(|_| {}));
    assert!(!proxy.take_picture(|_| panic!("duplicate capture ran")));

    // while the hardware holds the capture, the session must be open
    let deadline = Instant::now() + WAIT;
    while !harness.manager.snapshot().capturing {
        assert!(Instant::now() < deadline, "capture never started");
        std::thread::yield_now();
    }
    let during = harness.manager.snapshot();
    assert_eq!(during.camera_id, Some(0));
    assert!(!proxy.take_picture(|_| panic!("duplicate capture ran")));

    harness.flush();

    let taken = harness
        .provider
        .events()
        .into_iter()
        .filter(|e| matches!(e, HardwareEvent::PictureTaken { .. }))
        .count();
    assert_eq!(taken, 1);
    assert_eq!(harness.manager.stats().duplicate_captures_rejected, 2);
    assert!(proxy.take_picture(|_| {}));
    harness.flush();
}

#[test]
fn test_capture_orientation_uses_camera_open_at_submission() {
    let harness = Harness::new();
    let proxy = harness.open();

    let release = block_worker(&proxy);
    assert!(proxy.start_preview_with(SURFACE, 1));
    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    release.send(()).unwrap();
    harness.flush();

    let picture = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(picture.camera_id, 0);
    assert_eq!(picture.orientation, 90);
    assert!(harness
        .provider
        .events()
        .iter()
        .any(|e| matches!(e, HardwareEvent::PictureTaken { id: 1, .. })));
}

#[test]
fn test_capture_after_stop_reports_session_closed() {
    let harness = Harness::new();
    let proxy = harness.open();

    let release = block_worker(&proxy);
    assert!(proxy.stop_preview());
    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    let (focus_tx, focus_rx) = mpsc::channel();
    assert!(proxy.set_auto_focus_with(move |success| focus_tx.send(success).unwrap()));
    release.send(()).unwrap();
    harness.flush();

    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(CaptureError::SessionClosed)
    ));
    assert!(!focus_rx.recv_timeout(WAIT).unwrap());
    let snapshot = harness.manager.snapshot();
    assert_eq!(snapshot.camera_id, None);
    assert!(!snapshot.capturing);
    assert!(!snapshot.capture_queued);
}

#[test]
fn test_auto_focus_reports_hardware_result() {
    let harness = Harness::new();
    let proxy = harness.open();

    let (tx, rx) = mpsc::channel();
    let first = tx.clone();
    assert!(proxy.set_auto_focus_with(move |success| first.send(success).unwrap()));
    assert!(rx.recv_timeout(WAIT).unwrap());

    harness.provider.set_focus_succeeds(false);
    assert!(proxy.set_auto_focus_with(move |success| tx.send(success).unwrap()));
    assert!(!rx.recv_timeout(WAIT).unwrap());
}

#[test]
fn test_auto_focus_hardware_error_reports_failure() {
    let harness = Harness::new();
    let proxy = harness.open();
    harness.provider.fail_next(SimulatedOp::AutoFocus);

    let (tx, rx) = mpsc::channel();
    assert!(proxy.set_auto_focus_with(move |success| tx.send(success).unwrap()));
    harness.flush();

    assert!(!rx.recv_timeout(WAIT).unwrap());
    assert_eq!(harness.manager.stats().commands_failed, 1);
    assert!(proxy.is_open());
}

#[test]
fn test_auto_focus_on_start_can_be_disabled() {
    let mut config = CamsessionConfig::default().camera;
    config.auto_focus_on_start = false;
    let harness = Harness::with_config(config);

    harness.open();

    assert!(!harness
        .provider
        .events()
        .contains(&HardwareEvent::AutoFocusRequested(0)));
}

#[test]
fn test_panicking_callback_does_not_stop_worker() {
    let harness = Harness::new();
    let proxy = harness.open();

    assert!(proxy.take_picture(|_| panic!("callback exploded")));
    harness.flush();
    assert_eq!(harness.manager.stats().commands_failed, 1);
    assert!(!harness.manager.snapshot().capturing);

    let (tx, rx) = picture_channel();
    assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
    harness.flush();
    assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
    assert!(proxy.is_open());
}

#[test]
fn test_capturing_never_outlives_open_session() {
    let harness = Harness::new();
    let proxy = harness.landscape();

    let mut paths = std::collections::HashSet::new();
    for camera in [0, 1, 0, 5] {
        assert!(proxy.start_preview_with(SURFACE, camera));
        harness.flush();
        let (tx, rx) = picture_channel();
        assert!(proxy.take_picture(move |result| tx.send(result).unwrap()));
        proxy.surface_destroyed(SURFACE);
        harness.flush();
        let picture = rx.recv_timeout(WAIT).unwrap().unwrap();
        assert!(paths.insert(picture.path));

        let snapshot = harness.manager.snapshot();
        assert!(!snapshot.capturing || snapshot.camera_id.is_some());
        assert_eq!(snapshot.camera_id, None);
    }

    assert_eq!(harness.provider.open_handles(), 0);
    assert_eq!(harness.provider.max_open_handles(), 1);
    assert_eq!(harness.manager.stats().pictures_persisted, 4);
    assert!(paths.iter().all(|path| path.exists()));
}

#[test]
fn test_stats_count_commands() {
    let harness = Harness::new();
    let proxy = harness.open();
    proxy.surface_changed(SURFACE, 0, 640, 480);
    assert!(proxy.stop_preview());
    harness.flush();

    let stats = harness.manager.stats();
    assert_eq!(stats.commands_submitted, 3);
    assert_eq!(stats.commands_processed, 3);
    assert_eq!(stats.commands_failed, 0);
}

#[test]
fn test_shutdown_drains_queue_and_releases_camera() {
    let mut harness = Harness::new();
    let proxy = harness.open();
    proxy.surface_changed(SURFACE, 0, 640, 480);

    harness.manager.shutdown();

    assert!(!proxy.is_attached());
    assert!(!proxy.start_preview(SURFACE));
    assert_eq!(harness.provider.open_handles(), 0);
    assert_eq!(harness.manager.stats().commands_processed, 2);
    assert_eq!(
        harness.lifecycle(),
        vec![HardwareEvent::Opened(0), HardwareEvent::Released(0)]
    );
    assert!(!harness.manager.flush(WAIT));
}

#[tokio::test]
async fn test_capture_receiver_delivers_result() {
    let harness = Harness::new();
    let proxy = harness.open();

    let receiver = proxy.capture().unwrap();
    let picture = tokio::time::timeout(WAIT, receiver)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(picture.camera_id, 0);

    let focus = proxy.auto_focus().unwrap();
    assert!(tokio::time::timeout(WAIT, focus).await.unwrap().unwrap());
}
