//! Probe engine tests against real loopback sockets.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use smarthosts::probe::{EngineState, ProbeConfig, ProbeEngine, TlsOptions, TlsVerifyMode};
use smarthosts::{Candidate, Domain, ProbeResult, ProbeStatus};

fn quick_config() -> ProbeConfig {
    ProbeConfig {
        trials: 3,
        attempt_timeout: Duration::from_millis(500),
        trial_interval: Duration::from_millis(1),
        tls: TlsOptions {
            mode: TlsVerifyMode::Off,
            ..TlsOptions::default()
        },
        icmp_fallback: false,
        flush_interval: Duration::from_millis(20),
        ..ProbeConfig::default()
    }
}

fn candidate(addr: IpAddr, domain: &str) -> Candidate {
    Candidate::new(addr, Domain::parse(domain).unwrap())
}

async fn drain(mut rx: mpsc::Receiver<Vec<ProbeResult>>) -> Vec<ProbeResult> {
    let mut all = Vec::new();
    while let Some(batch) = rx.recv().await {
        all.extend(batch);
    }
    all
}

#[tokio::test]
async fn listener_is_measured_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let config = ProbeConfig {
        port,
        ..quick_config()
    };
    let (tx, rx) = mpsc::channel(16);
    let handle = ProbeEngine::new(config).start(
        vec![candidate(Ipv4Addr::LOCALHOST.into(), "example.com")],
        tx,
    );

    let results = drain(rx).await;
    let state = handle.wait().await.unwrap();

    assert_eq!(state, EngineState::Completed);
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.status, ProbeStatus::Reachable);
    assert_eq!(r.trials, 3);
    assert!(r.stability > 0.0);
    assert!(r.latency_ms.is_some());
    assert!(!r.tcp_blocked);
    assert_eq!(r.tls_verified, None);
}

#[tokio::test]
async fn closed_port_is_an_error_without_icmp() {
    // Bind then drop so the port is closed but was recently valid.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ProbeConfig {
        port,
        ..quick_config()
    };
    let (tx, rx) = mpsc::channel(16);
    let handle = ProbeEngine::new(config).start(
        vec![candidate(Ipv4Addr::LOCALHOST.into(), "example.com")],
        tx,
    );

    let results = drain(rx).await;
    handle.wait().await.unwrap();

    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.status, ProbeStatus::Error);
    assert_eq!(r.latency_ms, None);
    assert_eq!(r.stability, 0.0);
}

#[tokio::test]
async fn mixed_batch_reports_every_candidate() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    // Candidates share the probe port, so give both the open one and
    // point the second candidate at the closed port via a second run.
    let (tx, rx) = mpsc::channel(16);
    let handle = ProbeEngine::new(ProbeConfig {
        port: open_port,
        ..quick_config()
    })
    .start(
        vec![
            candidate(Ipv4Addr::LOCALHOST.into(), "a.example.com"),
            candidate(Ipv4Addr::LOCALHOST.into(), "b.example.com"),
        ],
        tx,
    );
    let results = drain(rx).await;
    handle.wait().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == ProbeStatus::Reachable));

    let (tx, rx) = mpsc::channel(16);
    let handle = ProbeEngine::new(ProbeConfig {
        port: closed_port,
        ..quick_config()
    })
    .start(
        vec![candidate(Ipv4Addr::LOCALHOST.into(), "a.example.com")],
        tx,
    );
    let results = drain(rx).await;
    handle.wait().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ProbeStatus::Error);
}

#[tokio::test]
async fn cancellation_delivers_exactly_completed_results() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let config = ProbeConfig {
        port,
        concurrency: 2,
        trial_interval: Duration::from_millis(50),
        ..quick_config()
    };
    let candidates: Vec<Candidate> = (1..=20)
        .map(|i| candidate(Ipv4Addr::LOCALHOST.into(), &format!("host{i}.example.com")))
        .collect();

    let (tx, rx) = mpsc::channel(64);
    let handle = ProbeEngine::new(config).start(candidates, tx);

    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.cancel();

    let results = drain(rx).await;
    let completed = handle.completed();
    let state = handle.wait().await.unwrap();

    assert_eq!(state, EngineState::Cancelled);
    // Every completed candidate was delivered, nothing partial.
    assert_eq!(results.len(), completed);
    assert!(results.len() < 20);
}

#[tokio::test]
async fn pause_halts_progress_and_resume_continues() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let config = ProbeConfig {
        port,
        concurrency: 1,
        ..quick_config()
    };
    let candidates: Vec<Candidate> = (1..=5)
        .map(|i| candidate(Ipv4Addr::LOCALHOST.into(), &format!("host{i}.example.com")))
        .collect();

    let (tx, rx) = mpsc::channel(64);
    let handle = ProbeEngine::new(config).start(candidates, tx);

    handle.pause();
    assert_eq!(handle.state(), EngineState::Paused);
    let frozen = handle.completed();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // At most the in-flight candidate finishes while paused.
    assert!(handle.completed() <= frozen + 1);

    handle.resume();
    assert_eq!(handle.state(), EngineState::Running);

    let results = drain(rx).await;
    let state = handle.wait().await.unwrap();
    assert_eq!(state, EngineState::Completed);
    assert_eq!(results.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rapid_pause_resume_cycles_never_strand_workers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let config = ProbeConfig {
        port,
        concurrency: 4,
        ..quick_config()
    };
    let candidates: Vec<Candidate> = (1..=12)
        .map(|i| candidate(Ipv4Addr::LOCALHOST.into(), &format!("host{i}.example.com")))
        .collect();

    let (tx, rx) = mpsc::channel(64);
    let handle = ProbeEngine::new(config).start(candidates, tx);

    // Hammer pause/resume so a resume can land while workers are
    // between their pause check and parking; every worker must still
    // wake and the session must run to completion.
    for _ in 0..50 {
        handle.pause();
        tokio::task::yield_now().await;
        handle.resume();
    }

    let results = tokio::time::timeout(Duration::from_secs(30), drain(rx))
        .await
        .expect("session stalled after resume");
    let state = handle.wait().await.unwrap();
    assert_eq!(state, EngineState::Completed);
    assert_eq!(results.len(), 12);
}

#[tokio::test]
async fn empty_candidate_list_completes_immediately() {
    let (tx, rx) = mpsc::channel(4);
    let handle = ProbeEngine::new(quick_config()).start(Vec::new(), tx);
    let results = drain(rx).await;
    let state = handle.wait().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(state, EngineState::Completed);
}
