use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use docbatch_core::{classify, Classification, Group, ItemId};
use docbatch_engine::{
    DownloadOutcome, DownloadTask, FailureKind, FetchSettings, Fetcher, ReqwestFetcher,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn item(raw: &str) -> ItemId {
    match classify(raw) {
        Classification::Valid(id) => id,
        Classification::Invalid => panic!("{raw} is not a valid id"),
    }
}

fn settings_for(server: &MockServer) -> FetchSettings {
    FetchSettings {
        endpoint: format!("{}/rat.php", server.uri()),
        warmup_url: Some(format!("{}/", server.uri())),
        ..FetchSettings::default()
    }
}

fn task(id: &str, folder: PathBuf) -> DownloadTask {
    DownloadTask {
        item_id: item(id),
        group: Group::new(0, "Alice"),
        target_folder: folder,
    }
}

#[tokio::test]
async fn download_uses_disposition_filename() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rat.php"))
        .and(query_param("os_id", "1234567"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", r#"attachment; filename="RAT_5001234567.pdf""#)
                .set_body_bytes(b"%PDF-1 body".to_vec()),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings_for(&server)).unwrap();
    let outcome = fetcher
        .download(&task("5001234567", temp.path().to_path_buf()), &CancellationToken::new())
        .await;

    let expected = temp.path().join("RAT_5001234567.pdf");
    assert_eq!(
        outcome,
        DownloadOutcome::Success {
            item_id: item("5001234567"),
            path: expected.clone(),
        }
    );
    assert_eq!(std::fs::read(expected).unwrap(), b"%PDF-1 body");
}

#[tokio::test]
async fn download_falls_back_to_item_id_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rat.php"))
        .and(query_param("os_id", "500111"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings_for(&server)).unwrap();
    let outcome = fetcher
        .download(&task("500111", temp.path().to_path_buf()), &CancellationToken::new())
        .await;

    match outcome {
        DownloadOutcome::Success { path, .. } => {
            assert_eq!(path, temp.path().join("500111.pdf"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn http_error_status_is_an_item_error_and_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rat.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings_for(&server)).unwrap();
    let outcome = fetcher
        .download(&task("500111", temp.path().to_path_buf()), &CancellationToken::new())
        .await;

    match outcome {
        DownloadOutcome::Error { item_id, error } => {
            assert_eq!(item_id.as_str(), "500111");
            assert_eq!(error.kind, FailureKind::HttpStatus(404));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rat.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        read_timeout: Duration::from_millis(50),
        ..settings_for(&server)
    };
    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings).unwrap();
    let outcome = fetcher
        .download(&task("500111", temp.path().to_path_buf()), &CancellationToken::new())
        .await;

    match outcome {
        DownloadOutcome::Error { error, .. } => assert_eq!(error.kind, FailureKind::Timeout),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_skips_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings_for(&server)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = fetcher
        .download(&task("500111", temp.path().to_path_buf()), &cancel)
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Cancelled {
            item_id: item("500111")
        }
    );
}

#[tokio::test]
async fn warm_up_fails_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(settings_for(&server)).unwrap();
    let err = fetcher.warm_up().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}

#[tokio::test]
async fn warm_up_is_skipped_without_url() {
    let settings = FetchSettings {
        warmup_url: None,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings).unwrap();
    fetcher.warm_up().await.unwrap();
}

/// Serves one response announcing `total` body bytes, then writes `pieces`
/// with `gap` between them and keeps the connection open.
async fn trickle_server(total: usize, pieces: Vec<usize>, gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {total}\r\n\r\n"
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        for size in pieces {
            if socket.write_all(&vec![b'x'; size]).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
            tokio::time::sleep(gap).await;
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    addr
}

fn local_settings(addr: SocketAddr) -> FetchSettings {
    FetchSettings {
        endpoint: format!("http://{addr}/rat.php"),
        warmup_url: None,
        ..FetchSettings::default()
    }
}

#[tokio::test]
async fn cancel_while_streaming_removes_the_partial_file() {
    // More than two chunks arrive, then the body stalls.
    let addr = trickle_server(100_000, vec![20_000], Duration::from_millis(10)).await;
    let temp = TempDir::new().unwrap();
    let folder = temp.path().to_path_buf();
    let fetcher = ReqwestFetcher::new(local_settings(addr)).unwrap();
    let cancel = CancellationToken::new();

    let download = {
        let cancel = cancel.clone();
        let task = task("500111", folder.clone());
        tokio::spawn(async move { fetcher.download(&task, &cancel).await })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::read_dir(&folder).unwrap().count() == 0 {
        assert!(Instant::now() < deadline, "download never started writing");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), download)
        .await
        .expect("download stops after cancel")
        .unwrap();
    assert_eq!(
        outcome,
        DownloadOutcome::Cancelled {
            item_id: item("500111")
        }
    );
    let leftovers: Vec<_> = fs::read_dir(&folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}

#[tokio::test]
async fn slow_steady_body_outlasts_the_read_timeout() {
    let addr = trickle_server(10_000, vec![1_000; 10], Duration::from_millis(60)).await;
    let settings = FetchSettings {
        read_timeout: Duration::from_millis(300),
        ..local_settings(addr)
    };
    let temp = TempDir::new().unwrap();
    let fetcher = ReqwestFetcher::new(settings).unwrap();

    let outcome = fetcher
        .download(&task("500111", temp.path().to_path_buf()), &CancellationToken::new())
        .await;

    let expected = temp.path().join("500111.pdf");
    assert_eq!(
        outcome,
        DownloadOutcome::Success {
            item_id: item("500111"),
            path: expected.clone(),
        }
    );
    assert_eq!(fs::metadata(expected).unwrap().len(), 10_000);
}
