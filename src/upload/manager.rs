use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{content_type_for, FileDescriptor, PutError, SignedUpload, UploadApi, UploadRequest};
use crate::bundle::{BundleLock, ViewerBundle};
use crate::error::{BundleError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResult {
    pub file_name: String,
    pub success: bool,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub fail_count: usize,
    pub content_id: String,
    pub upload_path: String,
    pub files: Vec<FileUploadResult>,
}

pub struct UploadManager {
    api: Arc<dyn UploadApi>,
    retry: RetryPolicy,
    concurrency: usize,
    show_progress: bool,
}

impl UploadManager {
    pub fn new(api: Arc<dyn UploadApi>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            api,
            retry,
            concurrency: concurrency.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Publish the bundle in `bundle_dir`. Individual file failures are
    /// reported in the outcome; only setup and completion errors are `Err`.
    pub async fn upload_bundle(&self, bundle_dir: &Path) -> Result<UploadOutcome> {
        let _lock = BundleLock::acquire(bundle_dir)?;

        let manifest = ViewerBundle::load(bundle_dir)?.ok_or_else(|| {
            BundleError::FileNotFound(ViewerBundle::path(bundle_dir).display().to_string())
        })?;

        let files = collect_files(bundle_dir)?;
        let missing: Vec<String> = manifest
            .referenced_files()
            .into_iter()
            .filter(|name| !files.iter().any(|f| &f.file_name == name))
            .collect();
        if !missing.is_empty() {
            return Err(BundleError::InvalidInput(format!(
                "{} references files that are not in the bundle: {}",
                ViewerBundle::path(bundle_dir).display(),
                missing.join(", ")
            )));
        }
        info!("Uploading {} files from {}", files.len(), bundle_dir.display());

        let signed = self.api.request_upload(&UploadRequest { manifest, files }).await?;
        debug!("Upload {} -> {}", signed.content_id, signed.upload_path);

        let results = self.upload_signed(bundle_dir, &signed.signs).await;

        self.api.complete(&signed.content_id).await?;

        let fail_count = results.iter().filter(|r| !r.success).count();
        if fail_count > 0 {
            warn!("{} of {} files failed to upload", fail_count, results.len());
        } else {
            info!("Uploaded {} files to {}", results.len(), signed.upload_path);
        }

        Ok(UploadOutcome {
            success: fail_count == 0,
            fail_count,
            content_id: signed.content_id,
            upload_path: signed.upload_path,
            files: results,
        })
    }

    /// PUT every signed file through a fixed pool of workers draining a
    /// shared index. Results come back in `signs` order.
    pub async fn upload_signed(&self, root: &Path, signs: &[SignedUpload]) -> Vec<FileUploadResult> {
        if signs.is_empty() {
            return Vec::new();
        }

        let signs: Arc<Vec<SignedUpload>> = Arc::new(signs.to_vec());
        let next = Arc::new(AtomicUsize::new(0));
        let progress = self.progress_bar(signs.len() as u64);

        let mut workers = JoinSet::new();
        for worker in 0..self.concurrency.min(signs.len()) {
            let signs = signs.clone();
            let next = next.clone();
            let api = self.api.clone();
            let retry = self.retry;
            let root = root.to_path_buf();
            let progress = progress.clone();

            workers.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(sign) = signs.get(i) else { break };

                    debug!("Worker {} uploading {}", worker, sign.file_name);
                    let result = upload_one(api.as_ref(), &retry, &root, sign).await;
                    progress.inc(1);
                    done.push((i, result));
                }
                done
            });
        }

        let mut slots: Vec<Option<FileUploadResult>> = vec![None; signs.len()];
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => {
                    for (i, result) in done {
                        slots[i] = Some(result);
                    }
                }
                Err(e) => warn!("Upload worker aborted: {}", e),
            }
        }
        progress.finish_and_clear();

        slots
            .into_iter()
            .zip(signs.iter())
            .map(|(slot, sign)| {
                slot.unwrap_or_else(|| FileUploadResult {
                    file_name: sign.file_name.clone(),
                    success: false,
                    attempts: 0,
                    error: Some("upload worker aborted".to_string()),
                })
            })
            .collect()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}

async fn upload_one(
    api: &dyn UploadApi,
    retry: &RetryPolicy,
    root: &Path,
    sign: &SignedUpload,
) -> FileUploadResult {
    let path = root.join(&sign.file_name);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return FileUploadResult {
                file_name: sign.file_name.clone(),
                success: false,
                attempts: 0,
                error: Some(format!("cannot read {}: {}", path.display(), e)),
            };
        }
    };

    let mut attempts = 0;
    let result = retry
        .run(
            &sign.file_name,
            || {
                attempts += 1;
                api.put_file(&sign.url, &sign.content_type, body.clone())
            },
            PutError::is_retryable,
        )
        .await;

    match result {
        Ok(()) => FileUploadResult {
            file_name: sign.file_name.clone(),
            success: true,
            attempts,
            error: None,
        },
        Err(e) => {
            warn!("Giving up on {} after {} attempts: {}", sign.file_name, attempts, e);
            FileUploadResult {
                file_name: sign.file_name.clone(),
                success: false,
                attempts,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Every regular file under `root`, named relative to it with `/` separators.
/// Hidden entries (lock file, staging directory) and partial writes are skipped.
pub fn collect_files(root: &Path) -> Result<Vec<FileDescriptor>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|e| BundleError::Upload(format!("Cannot walk {}: {}", root.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "partial") {
            continue;
        }

        let relative: PathBuf = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
        let file_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let size = entry
            .metadata()
            .map(|m| m.len())
            .map_err(|e| BundleError::Upload(format!("Cannot stat {}: {}", path.display(), e)))?;

        files.push(FileDescriptor {
            content_type: content_type_for(path).to_string(),
            file_name,
            size,
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{MockUploadApi, UploadManifest};
    use assert_fs::prelude::*;
    use std::time::Duration;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn sign(name: &str) -> SignedUpload {
        SignedUpload {
            file_name: name.to_string(),
            url: format!("https://storage.example/{}", name),
            content_type: "video/mp4".to_string(),
        }
    }

    fn bundle_dir() -> assert_fs::TempDir {
        let dir = assert_fs::TempDir::new().unwrap();
        ViewerBundle::new("en", vec![]).save(dir.path()).unwrap();
        for name in ["1.mp4", "2.mp4", "3.mp4"] {
            dir.child(name).write_binary(b"video").unwrap();
        }
        dir
    }

    #[test]
    fn test_collect_files_skips_hidden_and_partial() {
        let dir = bundle_dir();
        dir.child(".staging/1.mp4").write_binary(b"raw").unwrap();
        dir.child(".mulmo_view.lock").write_str("{}").unwrap();
        dir.child("4.partial").write_str("").unwrap();
        dir.child("images/cover.png").write_binary(b"png").unwrap();

        let names: Vec<String> = collect_files(dir.path()).unwrap().into_iter().map(|f| f.file_name).collect();

        assert_eq!(names, vec!["1.mp4", "2.mp4", "3.mp4", "images/cover.png", "mulmo_view.json"]);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let dir = bundle_dir();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut api = MockUploadApi::new();
        let counter = calls.clone();
        api.expect_put_file().times(3).returning(move |_, _, _| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(PutError::Status(503)),
                _ => Ok(()),
            }
        });

        let manager = UploadManager::new(Arc::new(api), fast(), 5);
        let results = manager.upload_signed(dir.path(), &[sign("1.mp4")]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(results[0].success);
        assert_eq!(results[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let dir = bundle_dir();
        let mut api = MockUploadApi::new();
        api.expect_put_file().times(1).returning(|_, _, _| Err(PutError::Status(404)));

        let manager = UploadManager::new(Arc::new(api), fast(), 5);
        let results = manager.upload_signed(dir.path(), &[sign("1.mp4")]).await;

        assert!(!results[0].success);
        assert_eq!(results[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_one_permanent_failure_does_not_stop_the_rest() {
        let dir = bundle_dir();

        let mut api = MockUploadApi::new();
        api.expect_request_upload().times(1).returning(|request| {
            assert_eq!(request.files.len(), 4);
            Ok(UploadManifest {
                upload_path: "bundles/xyz".to_string(),
                content_id: "xyz".to_string(),
                signs: vec![sign("1.mp4"), sign("2.mp4"), sign("3.mp4")],
            })
        });
        api.expect_put_file().returning(|url, _, _| {
            if url.ends_with("/2.mp4") { Err(PutError::Status(404)) } else { Ok(()) }
        });
        api.expect_complete().times(1).returning(|content_id| {
            assert_eq!(content_id, "xyz");
            Ok(())
        });

        let manager = UploadManager::new(Arc::new(api), fast(), 5);
        let outcome = manager.upload_bundle(dir.path()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.fail_count, 1);
        assert!(outcome.files[0].success);
        assert!(!outcome.files[1].success);
        assert!(outcome.files[2].success);
        assert!(!dir.path().join(crate::bundle::LOCK_FILE).exists());
    }

    /// Counts PUTs in flight; each PUT yields so workers really overlap
    #[derive(Default)]
    struct GaugeApi {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        urls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl UploadApi for GaugeApi {
        async fn request_upload(&self, _request: &UploadRequest) -> Result<UploadManifest> {
            Err(BundleError::Upload("not used".to_string()))
        }

        async fn put_file(&self, url: &str, _content_type: &str, _body: Vec<u8>) -> std::result::Result<(), PutError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Ok(mut urls) = self.urls.lock() {
                urls.push(url.to_string());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn complete(&self, _content_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_concurrency() {
        let dir = assert_fs::TempDir::new().unwrap();
        let names: Vec<String> = (1..=6).map(|n| format!("{}.mp3", n)).collect();
        for name in &names {
            dir.child(name).write_binary(b"audio").unwrap();
        }
        let signs: Vec<SignedUpload> = names.iter().map(|n| sign(n)).collect();

        let api = Arc::new(GaugeApi::default());
        let manager = UploadManager::new(api.clone(), fast(), 2);
        let results = manager.upload_signed(dir.path(), &signs).await;

        assert!(results.iter().all(|r| r.success && r.attempts == 1));
        assert_eq!(api.peak.load(Ordering::SeqCst), 2);

        let mut urls = api.urls.lock().unwrap().clone();
        urls.sort();
        let mut expected: Vec<String> = signs.iter().map(|s| s.url.clone()).collect();
        expected.sort();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn test_missing_local_file_counts_as_failure() {
        let dir = bundle_dir();
        let mut api = MockUploadApi::new();
        api.expect_put_file().never();

        let manager = UploadManager::new(Arc::new(api), fast(), 2);
        let results = manager.upload_signed(dir.path(), &[sign("missing.mp4")]).await;

        assert!(!results[0].success);
        assert_eq!(results[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_incomplete_bundle_fails_before_any_request() {
        let dir = assert_fs::TempDir::new().unwrap();
        let beat = crate::bundle::BeatData {
            text: "hi".to_string(),
            start_time: 0.0,
            end_time: 1.0,
            duration: 1.0,
            audio_sources: [("en".to_string(), "1_en.mp3".to_string())].into(),
            multi_linguals: [("en".to_string(), "hi".to_string())].into(),
            video_source: None,
            image_source: Some("1.png".to_string()),
            thumbnail: None,
        };
        ViewerBundle::new("en", vec![beat]).save(dir.path()).unwrap();
        dir.child("1.png").write_binary(b"png").unwrap();

        let mut api = MockUploadApi::new();
        api.expect_request_upload().never();

        let manager = UploadManager::new(Arc::new(api), fast(), 5);
        let result = manager.upload_bundle(dir.path()).await;

        assert!(matches!(result, Err(BundleError::InvalidInput(ref msg)) if msg.contains("1_en.mp3")));
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_before_any_request() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut api = MockUploadApi::new();
        api.expect_request_upload().never();

        let manager = UploadManager::new(Arc::new(api), fast(), 5);
        let result = manager.upload_bundle(dir.path()).await;

        assert!(matches!(result, Err(BundleError::FileNotFound(_))));
    }
}
