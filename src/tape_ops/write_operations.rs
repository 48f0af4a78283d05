//! Segment write orchestration.
//!
//! One segment write resolves catalog records, checks that every queued file
//! is still on disk, positions the drive at the segment's file mark and
//! streams the manifest through the archiver. The start/end timestamps
//! bracket the archiver run only: once the start time is recorded, the end
//! time is recorded exactly once, whatever the archiver does.

use crate::archiver::Archiver;
use crate::catalog::{Catalog, QueuedFile, Segment, Tape};
use crate::drive::{position_to, DriveController, DriveOperation, PositionPolicy};
use crate::error::{ErrorKind, MtarError, Result};
use crate::manifest;
use crate::notify::{NotifyEvent, Notifications};
use crate::utils::format_bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Result of a successful segment write
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub tape_id: i64,
    pub tape_serial: String,
    pub segment: u32,
    pub files: usize,
    pub bytes: u64,
    pub base_dir: PathBuf,
    /// Drive movements issued before the archiver ran
    pub operations: Vec<DriveOperation>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

/// Per-segment outcome of a range write
#[derive(Debug)]
pub struct SegmentOutcome {
    pub segment: u32,
    pub result: Result<SegmentReport>,
}

impl SegmentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct WriteOrchestrator<'a> {
    catalog: &'a dyn Catalog,
    drive: &'a dyn DriveController,
    archiver: &'a dyn Archiver,
    notifications: &'a Notifications,
    policy: PositionPolicy,
}

impl<'a> WriteOrchestrator<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        drive: &'a dyn DriveController,
        archiver: &'a dyn Archiver,
        notifications: &'a Notifications,
    ) -> Self {
        Self {
            catalog,
            drive,
            archiver,
            notifications,
            policy: PositionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PositionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write one segment of the tape named by `tape_identifier`.
    pub async fn write(&self, tape_identifier: &str, segment_number: u32) -> Result<SegmentReport> {
        let tape = self.catalog.resolve_tape(tape_identifier)?;
        let outcome = SegmentOutcome {
            segment: segment_number,
            result: self.write_segment(&tape, segment_number).await,
        };
        self.notify_range_complete(&tape, std::slice::from_ref(&outcome))
            .await;
        outcome.result
    }

    /// Write every segment in `segments`, in ascending order.
    ///
    /// A failed segment is reported and the next one is attempted, unless the
    /// failure leaves nothing useful to do: a configuration problem, a catalog
    /// failure, or a drive that no longer answers or no longer holds a tape.
    pub async fn write_range(
        &self,
        tape_identifier: &str,
        segments: RangeInclusive<u32>,
    ) -> Result<Vec<SegmentOutcome>> {
        let tape = self.catalog.resolve_tape(tape_identifier)?;
        let mut outcomes = Vec::new();

        for number in segments {
            let result = self.write_segment(&tape, number).await;
            let abandon = match &result {
                Ok(_) => false,
                Err(e) => {
                    error!("Writing tar {} to tape {} failed: {}", number, tape.serial, e);
                    !self.can_continue(e).await
                }
            };

            outcomes.push(SegmentOutcome {
                segment: number,
                result,
            });
            if abandon {
                warn!("Abandoning the remaining tars on tape {}", tape.serial);
                break;
            }
        }

        self.notify_range_complete(&tape, &outcomes).await;
        Ok(outcomes)
    }

    async fn can_continue(&self, err: &MtarError) -> bool {
        match err.kind() {
            ErrorKind::Configuration | ErrorKind::Catalog => false,
            ErrorKind::Drive => match self.drive.status().await {
                Ok(status) if status.is_loaded() => true,
                Ok(status) => {
                    warn!("Drive {} no longer holds a tape ({})", self.drive.device(), status);
                    false
                }
                Err(e) => {
                    warn!("Drive {} stopped answering: {}", self.drive.device(), e);
                    false
                }
            },
            _ => true,
        }
    }

    async fn write_segment(&self, tape: &Tape, number: u32) -> Result<SegmentReport> {
        let segment = self.catalog.find_segment(tape, number)?;

        let mut files = self.catalog.list_queued_files(&segment)?;
        if files.is_empty() {
            return Err(MtarError::not_found(format!(
                "no files queued for tar {} on tape {} (id={})",
                number, tape.serial, tape.id
            )));
        }

        // Nothing moves until every file is known to be readable.
        if let Some(missing) = files.iter().find(|file| !file.full_path.exists()) {
            return Err(MtarError::MissingFile(missing.full_path.clone()));
        }

        files.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        let base_dir = common_base_dir(&files)?;
        let bytes: u64 = files.iter().map(|file| file.size).sum();
        info!(
            "Tar {} on tape {}: {} files, {} from {}",
            number,
            tape.serial,
            files.len(),
            format_bytes(bytes),
            base_dir.display()
        );

        let plan = position_to(self.drive, number, self.policy).await?;

        let started = Utc::now();
        self.catalog.set_segment_start_time(segment.id, started)?;

        let archived = self.archive(&segment, &files, &base_dir).await;

        let finished = Utc::now();
        let recorded = self.catalog.set_segment_end_time(segment.id, finished);
        if let Err(e) = &recorded {
            error!("Could not record end time of tar {}: {}", number, e);
        }
        archived?;
        recorded?;

        info!(
            "Tar {} on tape {} written in {:.1}s",
            number,
            tape.serial,
            (finished - started).num_milliseconds() as f64 / 1000.0
        );
        self.notifications
            .notify(
                NotifyEvent::SegmentWritten,
                "rustmtar: tar written",
                &format!(
                    "Tar {} on tape {}: {} files, {}",
                    number,
                    tape.serial,
                    files.len(),
                    format_bytes(bytes)
                ),
            )
            .await;

        Ok(SegmentReport {
            tape_id: tape.id,
            tape_serial: tape.serial.clone(),
            segment: number,
            files: files.len(),
            bytes,
            base_dir,
            operations: plan.operations,
            started,
            finished,
        })
    }

    async fn archive(&self, segment: &Segment, files: &[QueuedFile], base_dir: &Path) -> Result<()> {
        let manifest = manifest::stage(files)?;
        debug!(
            "Manifest {} lists {} files",
            manifest.path().display(),
            manifest.len()
        );
        self.archiver
            .archive(manifest.path(), base_dir, &segment.archiver_options())
            .await
    }

    async fn notify_range_complete(&self, tape: &Tape, outcomes: &[SegmentOutcome]) {
        let written = outcomes.iter().filter(|o| o.is_success()).count();
        let failed: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.segment.to_string())
            .collect();

        let mut message = format!("{} of {} tars written to tape {}", written, outcomes.len(), tape.serial);
        if !failed.is_empty() {
            message.push_str(&format!("; failed: {}", failed.join(", ")));
        }
        self.notifications
            .notify(NotifyEvent::WriteComplete, "rustmtar: write complete", &message)
            .await;
    }
}

/// The directory every file's relative path is rooted at. All files of one
/// segment must agree on it.
fn common_base_dir(files: &[QueuedFile]) -> Result<PathBuf> {
    let first = files
        .first()
        .ok_or_else(|| MtarError::not_found("no queued files"))?;
    let base_dir = first.base_dir().ok_or_else(|| {
        MtarError::parameter_validation(format!(
            "{} does not end with its relative path {}",
            first.full_path.display(),
            first.relative_path.display()
        ))
    })?;

    for file in &files[1..] {
        if file.base_dir().as_deref() != Some(base_dir.as_path()) {
            return Err(MtarError::parameter_validation(format!(
                "{} is not relative to {} like the rest of the tar",
                file.full_path.display(),
                base_dir.display()
            )));
        }
    }

    Ok(base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewQueuedFile, NewSegment, NewTape, SqliteCatalog};
    use crate::drive::SimulatedDrive;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Counts timestamp writes on top of a real catalog.
    struct RecordingCatalog {
        inner: SqliteCatalog,
        start_times: Cell<usize>,
        end_times: Cell<usize>,
    }

    impl RecordingCatalog {
        fn new() -> Self {
            Self {
                inner: SqliteCatalog::in_memory().unwrap(),
                start_times: Cell::new(0),
                end_times: Cell::new(0),
            }
        }
    }

    impl Catalog for RecordingCatalog {
        fn resolve_tape(&self, identifier: &str) -> Result<Tape> {
            self.inner.resolve_tape(identifier)
        }

        fn find_segment(&self, tape: &Tape, number: u32) -> Result<Segment> {
            self.inner.find_segment(tape, number)
        }

        fn list_queued_files(&self, segment: &Segment) -> Result<Vec<QueuedFile>> {
            self.inner.list_queued_files(segment)
        }

        fn set_segment_start_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()> {
            self.start_times.set(self.start_times.get() + 1);
            self.inner.set_segment_start_time(segment_id, at)
        }

        fn set_segment_end_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()> {
            self.end_times.set(self.end_times.get() + 1);
            self.inner.set_segment_end_time(segment_id, at)
        }
    }

    #[derive(Debug, Clone)]
    struct ArchiveCall {
        base_dir: PathBuf,
        manifest: Vec<String>,
        options: Vec<String>,
    }

    enum Script {
        Succeed,
        ExitNonZero,
        Crash,
    }

    struct ScriptedArchiver {
        script: Script,
        calls: Mutex<Vec<ArchiveCall>>,
    }

    impl ScriptedArchiver {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ArchiveCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Archiver for ScriptedArchiver {
        async fn archive(&self, manifest: &Path, base_dir: &Path, options: &[String]) -> Result<()> {
            let listed = std::fs::read_to_string(manifest)?;
            self.calls.lock().push(ArchiveCall {
                base_dir: base_dir.to_path_buf(),
                manifest: listed.lines().map(str::to_string).collect(),
                options: options.to_vec(),
            });
            match self.script {
                Script::Succeed => Ok(()),
                Script::ExitNonZero => Err(MtarError::archiver("`tar` exited with exit status: 2")),
                Script::Crash => Err(anyhow::anyhow!("archiver panicked").into()),
            }
        }
    }

    struct Fixture {
        catalog: RecordingCatalog,
        data: TempDir,
        tape: Tape,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = RecordingCatalog::new();
            let tape = catalog
                .inner
                .new_tape(&NewTape {
                    manufacturer: "IBM".into(),
                    model: "38L7302".into(),
                    generation: "LTO7RW".into(),
                    serial: "SN7".into(),
                    barcode: Some("AAA007L7".into()),
                    purchased: None,
                })
                .unwrap();
            Self {
                catalog,
                data: tempfile::tempdir().unwrap(),
                tape,
            }
        }

        /// Create a segment whose files exist under the fixture's data dir.
        fn segment(&self, number: u32, names: &[&str]) -> Segment {
            let segment = self
                .catalog
                .inner
                .new_segment(
                    "SN7",
                    &NewSegment {
                        number,
                        options: Some("-z".into()),
                        ..Default::default()
                    },
                )
                .unwrap();

            for name in names {
                let relative = PathBuf::from(format!("set{number}")).join(name);
                let full_path = self.data.path().join(&relative);
                std::fs::create_dir_all(full_path.parent().unwrap()).unwrap();
                std::fs::write(&full_path, name.as_bytes()).unwrap();
                self.catalog
                    .inner
                    .new_queued_file(
                        &segment,
                        &NewQueuedFile {
                            full_path,
                            relative_path: relative,
                            file_name: name.to_string(),
                            size: name.len() as u64,
                            sha256: String::new(),
                        },
                    )
                    .unwrap();
            }
            segment
        }

        fn stored_segment(&self, number: u32) -> Segment {
            self.catalog.inner.find_segment(&self.tape, number).unwrap()
        }
    }

    #[tokio::test]
    async fn test_write_at_start_of_segment() {
        let fixture = Fixture::new();
        fixture.segment(3, &["b.txt", "a.txt", "sub/c.txt"]);
        let drive = SimulatedDrive::loaded(3, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let orchestrator =
            WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications);
        let report = orchestrator.write("SN7", 3).await.unwrap();

        assert!(drive.operations().is_empty());
        assert!(report.operations.is_empty());
        assert_eq!(report.files, 3);
        assert_eq!(report.base_dir, fixture.data.path());

        let calls = archiver.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].base_dir, fixture.data.path());
        assert_eq!(
            calls[0].manifest,
            vec!["set3/a.txt", "set3/b.txt", "set3/sub/c.txt"]
        );
        assert_eq!(calls[0].options, vec!["-z"]);

        let stored = fixture.stored_segment(3);
        let (start, end) = (stored.start_time.unwrap(), stored.end_time.unwrap());
        assert!(start <= end);
        assert_eq!(fixture.catalog.start_times.get(), 1);
        assert_eq!(fixture.catalog.end_times.get(), 1);
    }

    #[tokio::test]
    async fn test_write_positions_before_archiving() {
        let fixture = Fixture::new();
        fixture.segment(4, &["a.txt"]);
        let drive = SimulatedDrive::loaded(1, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let report = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write("AAA007L7", 4)
            .await
            .unwrap();

        assert_eq!(drive.operations(), vec![DriveOperation::StepForward(3)]);
        assert_eq!(report.operations, vec![DriveOperation::StepForward(3)]);
    }

    #[tokio::test]
    async fn test_failed_archiver_still_records_end_time() {
        for script in [Script::ExitNonZero, Script::Crash] {
            let fixture = Fixture::new();
            fixture.segment(2, &["a.txt"]);
            let drive = SimulatedDrive::loaded(2, 0);
            let archiver = ScriptedArchiver::new(script);
            let notifications = Notifications::disabled();

            let result = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
                .write("SN7", 2)
                .await;

            assert!(result.is_err());
            assert_eq!(archiver.calls().len(), 1);
            assert_eq!(fixture.catalog.start_times.get(), 1);
            assert_eq!(fixture.catalog.end_times.get(), 1);
            let stored = fixture.stored_segment(2);
            assert!(stored.start_time.unwrap() <= stored.end_time.unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_file_aborts_before_drive_movement() {
        let fixture = Fixture::new();
        fixture.segment(5, &["a.txt", "b.txt"]);
        std::fs::remove_file(fixture.data.path().join("set5/b.txt")).unwrap();
        let drive = SimulatedDrive::loaded(1, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let err = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write("SN7", 5)
            .await
            .unwrap_err();

        match err {
            MtarError::MissingFile(path) => {
                assert_eq!(path, fixture.data.path().join("set5/b.txt"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(drive.status_queries(), 0);
        assert!(drive.operations().is_empty());
        assert!(archiver.calls().is_empty());
        assert_eq!(fixture.catalog.start_times.get(), 0);
        assert_eq!(fixture.catalog.end_times.get(), 0);
    }

    #[tokio::test]
    async fn test_no_tape_loaded() {
        let fixture = Fixture::new();
        fixture.segment(0, &["a.txt"]);
        let drive = SimulatedDrive::empty();
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let err = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write("SN7", 0)
            .await
            .unwrap_err();

        assert!(matches!(err, MtarError::NoTape(_)));
        assert!(drive.operations().is_empty());
        assert!(archiver.calls().is_empty());
        assert_eq!(fixture.catalog.start_times.get(), 0);
    }

    #[tokio::test]
    async fn test_seek_drift_is_not_archived() {
        let fixture = Fixture::new();
        fixture.segment(2, &["a.txt"]);
        let drive = SimulatedDrive::loaded(0, 0).with_drift();
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let err = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write("SN7", 2)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MtarError::SeekVerification {
                expected_segment: 2,
                ..
            }
        ));
        assert!(archiver.calls().is_empty());
        assert_eq!(fixture.catalog.start_times.get(), 0);
        assert_eq!(fixture.catalog.end_times.get(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tape_and_segment() {
        let fixture = Fixture::new();
        let drive = SimulatedDrive::loaded(0, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();
        let orchestrator =
            WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications);

        assert!(matches!(
            orchestrator.write("nope", 0).await,
            Err(MtarError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.write("SN7", 9).await,
            Err(MtarError::NotFound(_))
        ));
        assert_eq!(drive.status_queries(), 0);
    }

    #[tokio::test]
    async fn test_mixed_base_dirs_rejected() {
        let fixture = Fixture::new();
        let segment = fixture.segment(1, &["a.txt"]);
        let elsewhere = tempfile::tempdir().unwrap();
        let stray = elsewhere.path().join("z.txt");
        std::fs::write(&stray, b"z").unwrap();
        fixture
            .catalog
            .inner
            .new_queued_file(
                &segment,
                &NewQueuedFile {
                    full_path: stray,
                    relative_path: PathBuf::from("z.txt"),
                    file_name: "z.txt".into(),
                    size: 1,
                    sha256: String::new(),
                },
            )
            .unwrap();
        let drive = SimulatedDrive::loaded(1, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let err = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write("SN7", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, MtarError::ParameterValidation(_)));
        assert!(drive.operations().is_empty());
    }

    #[tokio::test]
    async fn test_range_continues_after_segment_failure() {
        let fixture = Fixture::new();
        fixture.segment(1, &["a.txt"]);
        // Tar 2 exists but has nothing queued.
        fixture.segment(2, &[]);
        fixture.segment(3, &["c.txt"]);
        let drive = SimulatedDrive::loaded(1, 0);
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let outcomes = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write_range("SN7", 1..=3)
            .await
            .unwrap();

        let summary: Vec<(u32, bool)> = outcomes.iter().map(|o| (o.segment, o.is_success())).collect();
        assert_eq!(summary, vec![(1, true), (2, false), (3, true)]);
        assert!(matches!(outcomes[1].result, Err(MtarError::NotFound(_))));
        assert_eq!(drive.operations(), vec![DriveOperation::StepForward(2)]);
        assert_eq!(archiver.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_range_stops_when_drive_is_empty() {
        let fixture = Fixture::new();
        fixture.segment(1, &["a.txt"]);
        fixture.segment(2, &["b.txt"]);
        let drive = SimulatedDrive::empty();
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let outcomes = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write_range("SN7", 1..=2)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Err(MtarError::NoTape(_))));
    }

    #[tokio::test]
    async fn test_range_continues_after_movement_failure_with_tape_loaded() {
        let fixture = Fixture::new();
        fixture.segment(2, &["a.txt"]);
        fixture.segment(3, &["b.txt"]);
        let drive = SimulatedDrive::loaded(0, 0).with_failing_movement();
        let archiver = ScriptedArchiver::new(Script::Succeed);
        let notifications = Notifications::disabled();

        let outcomes = WriteOrchestrator::new(&fixture.catalog, &drive, &archiver, &notifications)
            .write_range("SN7", 2..=3)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.result, Err(MtarError::DriveCommand { .. }))));
        assert!(archiver.calls().is_empty());
    }
}
