use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use tts_job_domain::{AcceleratorPort, DomainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub files_removed: usize,
    pub cleanup_failures: usize,
    pub accelerator_reclaimed: bool,
}

/// Resources held by one job: a private scratch directory and the job's claim
/// on the shared accelerator.
///
/// `release` consumes the guard, so it runs at most once. If the guard is
/// dropped without being released (cancelled future, unwinding), the scratch
/// files are still removed by `Drop`.
pub struct JobResources {
    request_id: String,
    scratch_root: Option<PathBuf>,
    scratch: Option<TempDir>,
    files: Vec<PathBuf>,
    accelerator: Arc<dyn AcceleratorPort>,
    reclaim_calls: usize,
    released: bool,
}

impl JobResources {
    pub fn acquire(
        request_id: impl Into<String>,
        scratch_root: Option<PathBuf>,
        accelerator: Arc<dyn AcceleratorPort>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            scratch_root,
            scratch: None,
            files: Vec::new(),
            accelerator,
            reclaim_calls: 0,
            released: false,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn reclaim_calls(&self) -> usize {
        self.reclaim_calls
    }

    /// Writes `bytes` to a new file inside the job's scratch directory.
    pub fn write_scratch_file(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, DomainError> {
        let path = self.ensure_scratch_dir()?.join(name);
        fs::write(&path, bytes).map_err(|err| {
            DomainError::storage_error(&format!(
                "failed to write scratch file {}: {err}",
                path.display()
            ))
        })?;
        self.files.push(path.clone());

        tracing::debug!(
            request_id = %self.request_id,
            path = %path.display(),
            bytes = bytes.len(),
            "wrote scratch file"
        );
        Ok(path)
    }

    /// Asks the accelerator to drop cached memory. Failures are logged only.
    pub async fn reclaim_accelerator(&mut self) {
        self.reclaim_calls += 1;
        match self.accelerator.reclaim_memory().await {
            Ok(()) => tracing::info!(
                request_id = %self.request_id,
                accelerator = self.accelerator.name(),
                "reclaimed accelerator memory"
            ),
            Err(err) => tracing::warn!(
                request_id = %self.request_id,
                accelerator = self.accelerator.name(),
                error = %err,
                "accelerator memory reclamation failed"
            ),
        }
    }

    pub async fn release(mut self, outcome: JobOutcome) -> ReleaseReport {
        let mut report = self.remove_scratch();

        if outcome == JobOutcome::Failed && self.reclaim_calls == 0 {
            self.reclaim_accelerator().await;
            report.accelerator_reclaimed = true;
        }
        self.released = true;

        tracing::debug!(
            request_id = %self.request_id,
            outcome = ?outcome,
            files_removed = report.files_removed,
            cleanup_failures = report.cleanup_failures,
            accelerator_reclaimed = report.accelerator_reclaimed,
            "released job resources"
        );
        report
    }

    fn ensure_scratch_dir(&mut self) -> Result<&Path, DomainError> {
        if self.scratch.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("tts-job-");
            let created = match &self.scratch_root {
                Some(root) => builder.tempdir_in(root),
                None => builder.tempdir(),
            }
            .map_err(|err| {
                DomainError::storage_error(&format!("failed to create scratch directory: {err}"))
            })?;
            self.scratch = Some(created);
        }

        self.scratch
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| DomainError::internal_error("scratch directory unavailable"))
    }

    fn remove_scratch(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        for path in self.files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => report.files_removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    report.cleanup_failures += 1;
                    tracing::warn!(
                        request_id = %self.request_id,
                        path = %path.display(),
                        error = %err,
                        "failed to remove scratch file"
                    );
                }
            }
        }

        if let Some(dir) = self.scratch.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                report.cleanup_failures += 1;
                tracing::warn!(
                    request_id = %self.request_id,
                    path = %path.display(),
                    error = %err,
                    "failed to remove scratch directory"
                );
            }
        }

        report
    }
}

impl Drop for JobResources {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let report = self.remove_scratch();
        tracing::warn!(
            request_id = %self.request_id,
            files_removed = report.files_removed,
            "job resources dropped without release"
        );
    }
}
