//! Fetch-and-fallback tests against canned local HTTP servers.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use smarthosts::fetch::{
    DomainFilter, FetchMode, FetchRetry, RemoteSource, RemoteSourceFetcher,
};
use smarthosts::{AddrFamily, FetchError};

const GOOD_BODY: &str = "# hosts mirror\n140.82.112.3 github.com\n140.82.112.6 api.github.com\n";

/// Serves a fixed HTTP response to every connection on a fresh loopback
/// port; returns the source pointing at it.
async fn canned_source(name: &str, rank: u32, status: &str, body: &str) -> RemoteSource {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                // Read the request head; the client sends it in one go.
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    RemoteSource::new(
        name,
        Url::parse(&format!("http://127.0.0.1:{port}/hosts")).unwrap(),
        rank,
    )
}

/// A source whose port refuses connections.
async fn dead_source(name: &str, rank: u32) -> RemoteSource {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    RemoteSource::new(
        name,
        Url::parse(&format!("http://127.0.0.1:{port}/hosts")).unwrap(),
        rank,
    )
}

fn fetcher(sources: Vec<RemoteSource>) -> RemoteSourceFetcher {
    RemoteSourceFetcher::new(sources).with_retry(FetchRetry::no_retry())
}

#[tokio::test]
async fn first_healthy_source_wins() {
    let sources = vec![canned_source("primary", 0, "200 OK", GOOD_BODY).await];
    let outcome = fetcher(sources)
        .fetch(FetchMode::Automatic, AddrFamily::Any, &DomainFilter::Any)
        .await
        .unwrap();

    assert_eq!(outcome.source, "primary");
    assert_eq!(outcome.attempts, vec!["primary"]);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].domain.as_str(), "github.com");
}

#[tokio::test]
async fn fallback_walks_sources_in_rank_order() {
    let sources = vec![
        canned_source("broken", 0, "500 Internal Server Error", "oops").await,
        canned_source("portal", 1, "200 OK", "<!doctype html><html>login</html>").await,
        canned_source("healthy", 2, "200 OK", GOOD_BODY).await,
    ];
    let outcome = fetcher(sources)
        .fetch(FetchMode::Automatic, AddrFamily::Any, &DomainFilter::Any)
        .await
        .unwrap();

    assert_eq!(outcome.source, "healthy");
    assert_eq!(outcome.attempts, vec!["broken", "portal", "healthy"]);
}

#[tokio::test]
async fn empty_document_counts_as_failure() {
    let sources = vec![
        canned_source("empty", 0, "200 OK", "# nothing but comments\n").await,
        canned_source("healthy", 1, "200 OK", GOOD_BODY).await,
    ];
    let outcome = fetcher(sources)
        .fetch(FetchMode::Automatic, AddrFamily::Any, &DomainFilter::Any)
        .await
        .unwrap();
    assert_eq!(outcome.source, "healthy");
}

#[tokio::test]
async fn all_sources_failing_is_a_single_error() {
    let sources = vec![
        dead_source("a", 0).await,
        canned_source("b", 1, "404 Not Found", "nope").await,
    ];
    let err = fetcher(sources)
        .fetch(FetchMode::Automatic, AddrFamily::Any, &DomainFilter::Any)
        .await
        .unwrap_err();

    match err {
        FetchError::AllSourcesFailed { attempted, last } => {
            assert_eq!(attempted, 2);
            assert!(last.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn pinned_mode_uses_exactly_that_source() {
    let sources = vec![
        canned_source("first", 0, "200 OK", GOOD_BODY).await,
        canned_source("second", 1, "200 OK", GOOD_BODY).await,
    ];
    let outcome = fetcher(sources)
        .fetch(
            FetchMode::Pinned("second".to_string()),
            AddrFamily::Any,
            &DomainFilter::Any,
        )
        .await
        .unwrap();
    assert_eq!(outcome.source, "second");
    assert_eq!(outcome.attempts, vec!["second"]);
}

#[tokio::test]
async fn pinned_failure_does_not_fall_back() {
    let sources = vec![
        dead_source("pinned", 0).await,
        canned_source("healthy", 1, "200 OK", GOOD_BODY).await,
    ];
    let err = fetcher(sources)
        .fetch(
            FetchMode::Pinned("pinned".to_string()),
            AddrFamily::Any,
            &DomainFilter::Any,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::AllSourcesFailed { attempted: 1, .. }
    ));
}

#[tokio::test]
async fn pinned_unknown_source_is_rejected() {
    let sources = vec![canned_source("only", 0, "200 OK", GOOD_BODY).await];
    let err = fetcher(sources)
        .fetch(
            FetchMode::Pinned("ghost".to_string()),
            AddrFamily::Any,
            &DomainFilter::Any,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UnknownSource(name) if name == "ghost"));
}

#[tokio::test]
async fn family_filter_applies_during_fetch() {
    let body = "140.82.112.3 github.com\n2606:50c0:8000::153 github.io\n";
    let sources = vec![canned_source("mixed", 0, "200 OK", body).await];
    let outcome = fetcher(sources)
        .fetch(FetchMode::Automatic, AddrFamily::V4Only, &DomainFilter::Any)
        .await
        .unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].addr.is_ipv4());
}
