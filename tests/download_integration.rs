//! Integration tests for the download module.
//!
//! These tests run whole jobs (probe, resolve, plan, transfer) against mock
//! HTTP servers.

use std::path::Path;
use std::sync::Arc;

use fetcher_core::download::fs_probe::{local_state, set_modification_time};
use fetcher_core::{
    DownloadError, DownloadJob, Downloader, HttpTransport, JobOutcome, ProgressMode,
    ResumeDecision, ResumeOffset, TransportConfig,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LAST_MODIFIED: &str = "Sun, 06 Nov 1994 08:49:37 GMT";
const LAST_MODIFIED_UNIX: i64 = 784_111_777;

fn downloader() -> Downloader {
    let transport =
        HttpTransport::new(&TransportConfig::default()).expect("failed to build transport");
    Downloader::new(Arc::new(transport)).with_progress(ProgressMode::Hidden)
}

fn job(server: &MockServer, route: &str, dir: &Path) -> DownloadJob {
    DownloadJob::new(format!("{}{route}", server.uri()), dir, None)
}

/// Mounts a resource answering both HEAD and GET with the same template.
async fn mount_resource(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_names_file_from_url_and_content_type() {
    let server = MockServer::start().await;
    let body = vec![7_u8; 4096];
    mount_resource(
        &server,
        "/media/clip",
        ResponseTemplate::new(200)
            .insert_header("content-type", "video/mp4")
            .set_body_bytes(body.clone()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let outcome = downloader()
        .run_job(&job(&server, "/media/clip", temp_dir.path()))
        .await
        .expect("download should succeed");

    let expected = temp_dir.path().join("clip.mp4");
    assert_eq!(outcome.path(), &expected);
    assert_eq!(std::fs::read(&expected).expect("should read file"), body);
}

#[tokio::test]
async fn test_complete_file_without_remote_time_is_skipped() {
    let server = MockServer::start().await;
    let body = b"0123456789".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/data.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", "10")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(0)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("data.bin");
    std::fs::write(&target, &body).expect("should seed file");

    let outcome = downloader()
        .run_job(&job(&server, "/data.bin", temp_dir.path()))
        .await
        .expect("skip should succeed");

    assert_eq!(outcome, JobOutcome::Skipped { path: target });
}

#[tokio::test]
async fn test_complete_file_with_matching_time_is_skipped_on_rerun() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/report.pdf",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .insert_header("last-modified", LAST_MODIFIED)
            .insert_header("content-length", "13")
            .set_body_bytes(b"%PDF-1.7 body".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let downloader = downloader();
    let job = job(&server, "/report.pdf", temp_dir.path());

    let first = downloader.run_job(&job).await.expect("first run");
    assert!(matches!(first, JobOutcome::Downloaded { .. }));
    let second = downloader.run_job(&job).await.expect("second run");
    assert!(matches!(second, JobOutcome::Skipped { .. }));

    let gets = server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .filter(|request| request.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 1, "rerun must not transfer again");
}

#[tokio::test]
async fn test_partial_file_is_resumed_with_range_request() {
    let server = MockServer::start().await;
    let full = b"0123456789".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/data.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", "10")
                .set_body_bytes(full.clone()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .and(header("range", "bytes=4-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 4-9/10")
                .set_body_bytes(full[4..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("data.bin");
    std::fs::write(&target, &full[..4]).expect("should seed partial file");

    let downloader = downloader();
    let job = job(&server, "/data.bin", temp_dir.path());
    let plan = downloader.plan_job(&job).await.expect("plan");
    assert_eq!(
        plan.decision,
        ResumeDecision::ResumeAt(ResumeOffset::Bytes(4))
    );

    let outcome = downloader.run_job(&job).await.expect("resume should succeed");

    assert_eq!(
        outcome,
        JobOutcome::Downloaded {
            path: target.clone(),
            bytes_written: 6,
            final_size: 10,
            resumed: true,
        }
    );
    assert_eq!(std::fs::read(&target).expect("should read file"), full);
}

#[tokio::test]
async fn test_server_ignoring_range_rewrites_file_from_start() {
    let server = MockServer::start().await;
    let full = b"fresh remote content".to_vec();
    mount_resource(
        &server,
        "/notes.txt",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/plain")
            .set_body_bytes(full.clone()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("notes.txt");
    std::fs::write(&target, b"stale").expect("should seed partial file");

    let outcome = downloader()
        .run_job(&job(&server, "/notes.txt", temp_dir.path()))
        .await
        .expect("download should succeed");

    assert!(matches!(outcome, JobOutcome::Downloaded { resumed: false, .. }));
    assert_eq!(std::fs::read(&target).expect("should read file"), full);
}

#[tokio::test]
async fn test_unsatisfiable_range_restarts_download() {
    let server = MockServer::start().await;
    let full = b"short".to_vec();
    Mock::given(method("GET"))
        .and(path("/shrunk.bin"))
        .and(header("range", "bytes=11-"))
        .respond_with(ResponseTemplate::new(416))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_resource(
        &server,
        "/shrunk.bin",
        ResponseTemplate::new(200).set_body_bytes(full.clone()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("shrunk.bin");
    std::fs::write(&target, b"older bytes").expect("should seed file");

    downloader()
        .run_job(&job(&server, "/shrunk.bin", temp_dir.path()))
        .await
        .expect("restart should succeed");

    assert_eq!(std::fs::read(&target).expect("should read file"), full);
}

#[tokio::test]
async fn test_last_modified_is_applied_to_downloaded_file() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/archive.zip",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/zip")
            .insert_header("last-modified", LAST_MODIFIED)
            .set_body_bytes(b"PK\x03\x04".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let outcome = downloader()
        .run_job(&job(&server, "/archive.zip", temp_dir.path()))
        .await
        .expect("download should succeed");

    let state = local_state(outcome.path()).expect("file should exist");
    assert_eq!(state.modified, LAST_MODIFIED_UNIX);
}

#[tokio::test]
async fn test_newer_remote_file_is_resumed_not_skipped() {
    let server = MockServer::start().await;
    let full = b"0123456789".to_vec();
    mount_resource(
        &server,
        "/data.bin",
        ResponseTemplate::new(200)
            .insert_header("last-modified", LAST_MODIFIED)
            .set_body_bytes(full.clone()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let target = temp_dir.path().join("data.bin");
    std::fs::write(&target, &full).expect("should seed file");
    set_modification_time(&target, LAST_MODIFIED_UNIX - 3600).expect("should set mtime");

    let plan = downloader()
        .plan_job(&job(&server, "/data.bin", temp_dir.path()))
        .await
        .expect("plan");

    assert_eq!(
        plan.decision,
        ResumeDecision::ResumeAt(ResumeOffset::Bytes(10))
    );
}

#[tokio::test]
async fn test_content_disposition_names_the_file() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/download",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .insert_header(
                "content-disposition",
                "attachment; filename=\"Quarterly Report.pdf\"",
            )
            .set_body_bytes(b"%PDF".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let outcome = downloader()
        .run_job(&job(&server, "/download?id=7", temp_dir.path()))
        .await
        .expect("download should succeed");

    assert_eq!(
        outcome.path(),
        &temp_dir.path().join("Quarterly Report.pdf")
    );
}

#[tokio::test]
async fn test_redirect_target_names_the_file() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/latest",
        ResponseTemplate::new(302).insert_header("location", "/files/tool-v2.tar.gz"),
    )
    .await;
    mount_resource(
        &server,
        "/files/tool-v2.tar.gz",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/gzip")
            .set_body_bytes(b"\x1f\x8b".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let outcome = downloader()
        .run_job(&job(&server, "/latest", temp_dir.path()))
        .await
        .expect("download should succeed");

    assert_eq!(
        outcome.path(),
        &temp_dir.path().join("tool-v2.tar.gz")
    );
}

#[tokio::test]
async fn test_degenerate_url_gets_synthesized_name() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/plain")
            .set_body_bytes(b"index".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(temp_dir.path().join("file1.txt"), b"taken").expect("should seed file");

    let outcome = downloader()
        .run_job(&job(&server, "/", temp_dir.path()))
        .await
        .expect("download should succeed");

    assert_eq!(outcome.path(), &temp_dir.path().join("file2.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unwritable_directory_fails_before_transfer() {
    use std::os::unix::fs::PermissionsExt;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let locked = temp_dir.path().join("locked");
    std::fs::create_dir(&locked).expect("should create dir");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555))
        .expect("should chmod");

    let result = downloader().run_job(&job(&server, "/a.txt", &locked)).await;

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
        .expect("should restore permissions");
    assert!(matches!(result, Err(DownloadError::PermissionDenied { .. })));
}

#[tokio::test]
async fn test_http_error_fails_job() {
    let server = MockServer::start().await;
    mount_resource(&server, "/gone.txt", ResponseTemplate::new(404)).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let result = downloader()
        .run_job(&job(&server, "/gone.txt", temp_dir.path()))
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::HttpStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_batch_continues_past_failed_job() {
    let server = MockServer::start().await;
    mount_resource(
        &server,
        "/one.txt",
        ResponseTemplate::new(200).set_body_bytes(b"1".to_vec()),
    )
    .await;
    mount_resource(&server, "/two.txt", ResponseTemplate::new(500)).await;
    mount_resource(
        &server,
        "/three.txt",
        ResponseTemplate::new(200).set_body_bytes(b"3".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let jobs = vec![
        job(&server, "/one.txt", temp_dir.path()),
        job(&server, "/two.txt", temp_dir.path()),
        job(&server, "/three.txt", temp_dir.path()),
    ];

    let summary = downloader().run_batch(&jobs).await;

    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(temp_dir.path().join("one.txt").exists());
    assert!(temp_dir.path().join("three.txt").exists());
}

#[tokio::test]
async fn test_encoded_body_is_stored_verbatim_and_rerun_skips() {
    let server = MockServer::start().await;
    // gzip magic followed by opaque payload; stored exactly as sent.
    let body = vec![0x1f, 0x8b, 0x08, 0x00, 1, 2, 3, 4, 5, 6, 7, 8];
    Mock::given(path("/logs/app.bin"))
        .and(header("accept-encoding", "identity"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .insert_header("content-encoding", "gzip")
                .insert_header("last-modified", LAST_MODIFIED)
                .insert_header("content-length", "12")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let downloader = downloader();
    let job = job(&server, "/logs/app.bin", temp_dir.path());

    let first = downloader.run_job(&job).await.expect("first run");
    let saved = temp_dir.path().join("app.bin");
    assert_eq!(std::fs::read(&saved).expect("should read file"), body);
    assert!(matches!(first, JobOutcome::Downloaded { final_size: 12, .. }));

    let plan = downloader.plan_job(&job).await.expect("plan rerun");
    assert_eq!(plan.decision, ResumeDecision::Skip);
    let second = downloader.run_job(&job).await.expect("second run");
    assert!(matches!(second, JobOutcome::Skipped { .. }));
}
