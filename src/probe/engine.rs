//! Probe engine: bounded worker pool, pause/resume/cancel, throttled
//! batch delivery.
//!
//! Candidate lifecycle: `Queued -> Probing -> {Reachable, Timeout,
//! Error}`. Engine lifecycle: `Idle -> Running <-> Paused -> Completed
//! | Cancelled`. All shared state lives in one session object passed to
//! every worker; nothing is ambient, so sequential sessions cannot
//! interfere.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinHandle, JoinSet};

use super::config::{ProbeConfig, TlsVerifyMode};
use super::stats::TrialRecorder;
use super::strategy::{icmp_echo, tcp_connect_rtt, tls_sni_verify_any};
use crate::base::{Candidate, NetError, ProbeResult, ProbeStatus};

/// Global engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Completed | EngineState::Cancelled)
    }
}

/// Results leave the engine as batches through this sink; the consumer
/// drains at its own pace.
pub type ResultSink = mpsc::Sender<Vec<ProbeResult>>;

/// All state shared between workers, the flusher and the handle.
struct Session {
    queue: Mutex<VecDeque<Candidate>>,
    buffer: Mutex<Vec<ProbeResult>>,
    /// Domains sharing each address, in first-seen order; used as SNI
    /// candidates during TLS verification.
    sni_hosts: HashMap<IpAddr, Vec<Candidate>>,
    state: Mutex<EngineState>,
    paused: AtomicBool,
    cancelled: AtomicBool,
    resume: Notify,
    done: AtomicBool,
    done_notify: Notify,
    completed: AtomicUsize,
    fatal: Mutex<Option<NetError>>,
}

impl Session {
    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Blocks a worker while paused. Returns immediately on cancel so
    /// cancellation is never delayed by a pause.
    async fn wait_if_paused(&self) {
        loop {
            if self.cancelled() || !self.paused() {
                return;
            }
            // Register with the Notify before re-checking the flags;
            // notify_waiters only wakes already-registered waiters, so
            // enabling late would drop a resume that lands in between.
            let notified = self.resume.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.paused() && !self.cancelled() {
                notified.await;
            }
        }
    }
}

/// Handle to a running probe session.
pub struct ProbeHandle {
    session: Arc<Session>,
    driver: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stops new trials from starting; in-flight trials finish.
    pub fn pause(&self) {
        let mut state = self.session.state.lock().expect("state lock poisoned");
        if *state == EngineState::Running {
            self.session.paused.store(true, Ordering::SeqCst);
            *state = EngineState::Paused;
            tracing::debug!("probe session paused");
        }
    }

    pub fn resume(&self) {
        let mut state = self.session.state.lock().expect("state lock poisoned");
        if *state == EngineState::Paused {
            self.session.paused.store(false, Ordering::SeqCst);
            *state = EngineState::Running;
            self.session.resume.notify_waiters();
            tracing::debug!("probe session resumed");
        }
    }

    /// Drops queued candidates and interrupts sleeping workers at their
    /// next check point. In-flight trials stop within one timeout
    /// interval; their partial candidate is not reported.
    pub fn cancel(&self) {
        self.session.cancelled.store(true, Ordering::SeqCst);
        self.session.resume.notify_waiters();
        self.session.queue.lock().expect("queue lock poisoned").clear();
        tracing::debug!("probe session cancelled");
    }

    pub fn state(&self) -> EngineState {
        *self.session.state.lock().expect("state lock poisoned")
    }

    /// Number of candidates with a delivered (or pending-flush) result.
    pub fn completed(&self) -> usize {
        self.session.completed.load(Ordering::SeqCst)
    }

    /// Waits for the session to reach a terminal state. Returns the
    /// engine-fatal error, if any; results collected before the failure
    /// were still delivered through the sink.
    pub async fn wait(mut self) -> Result<EngineState, NetError> {
        // Driver never panics; a join error would mean runtime shutdown.
        let _ = (&mut self.driver).await;
        let fatal = self
            .session
            .fatal
            .lock()
            .expect("fatal lock poisoned")
            .clone();
        match fatal {
            Some(err) => Err(err),
            None => Ok(self.state()),
        }
    }
}

/// Bounded-concurrency reachability/latency prober.
pub struct ProbeEngine {
    config: ProbeConfig,
}

impl ProbeEngine {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Starts probing `candidates`, streaming result batches into
    /// `sink`. Duplicate (address, domain) pairs are dropped before
    /// probing. The sink closes once the session reaches a terminal
    /// state and the final flush has run.
    pub fn start(&self, candidates: Vec<Candidate>, sink: ResultSink) -> ProbeHandle {
        let mut queue: VecDeque<Candidate> = VecDeque::with_capacity(candidates.len());
        let mut sni_hosts: HashMap<IpAddr, Vec<Candidate>> = HashMap::new();
        for candidate in candidates {
            let shared = sni_hosts.entry(candidate.addr).or_default();
            if shared.contains(&candidate) {
                continue;
            }
            shared.push(candidate.clone());
            queue.push_back(candidate);
        }

        let total = queue.len();
        let session = Arc::new(Session {
            queue: Mutex::new(queue),
            buffer: Mutex::new(Vec::new()),
            sni_hosts,
            state: Mutex::new(EngineState::Idle),
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            resume: Notify::new(),
            done: AtomicBool::new(false),
            done_notify: Notify::new(),
            completed: AtomicUsize::new(0),
            fatal: Mutex::new(None),
        });

        tracing::info!(candidates = total, concurrency = self.config.concurrency, "probe session starting");
        // Running before the driver task is scheduled, so pause/cancel
        // issued right after start are honored.
        session.set_state(EngineState::Running);
        let driver = tokio::spawn(run_session(self.config.clone(), Arc::clone(&session), sink));

        ProbeHandle { session, driver }
    }
}

async fn run_session(config: ProbeConfig, session: Arc<Session>, sink: ResultSink) {
    let flusher = tokio::spawn(run_flusher(
        config.flush_interval,
        Arc::clone(&session),
        sink,
    ));

    let queue_len = session.queue.lock().expect("queue lock poisoned").len();
    let workers = config.concurrency.clamp(1, queue_len.max(1));
    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let config = config.clone();
        let session = Arc::clone(&session);
        pool.spawn(run_worker(config, session));
    }
    while pool.join_next().await.is_some() {}

    let cancelled = session.cancelled();
    session.set_state(if cancelled {
        EngineState::Cancelled
    } else {
        EngineState::Completed
    });

    session.done.store(true, Ordering::SeqCst);
    session.done_notify.notify_one();
    let _ = flusher.await;

    tracing::info!(
        completed = session.completed.load(Ordering::SeqCst),
        cancelled,
        "probe session finished"
    );
}

async fn run_worker(config: ProbeConfig, session: Arc<Session>) {
    loop {
        if session.cancelled() {
            return;
        }
        session.wait_if_paused().await;

        let candidate = {
            let mut queue = session.queue.lock().expect("queue lock poisoned");
            queue.pop_front()
        };
        let Some(candidate) = candidate else {
            return;
        };

        match probe_candidate(&config, &session, candidate).await {
            Outcome::Done(result) => {
                session
                    .buffer
                    .lock()
                    .expect("buffer lock poisoned")
                    .push(result);
                session.completed.fetch_add(1, Ordering::SeqCst);
            }
            Outcome::Cancelled => return,
            Outcome::Fatal(err) => {
                tracing::error!(error = %err, "probing aborted: socket exhaustion");
                *session.fatal.lock().expect("fatal lock poisoned") = Some(err);
                session.cancelled.store(true, Ordering::SeqCst);
                session.resume.notify_waiters();
                return;
            }
        }
    }
}

enum Outcome {
    Done(ProbeResult),
    Cancelled,
    Fatal(NetError),
}

async fn probe_candidate(
    config: &ProbeConfig,
    session: &Session,
    candidate: Candidate,
) -> Outcome {
    let mut recorder = TrialRecorder::new();

    for retry in 0..=config.retry.max_retries {
        if retry > 0 {
            tokio::time::sleep(config.retry.delay_for(retry - 1)).await;
            recorder = TrialRecorder::new();
        }

        for trial in 0..config.trials {
            if session.cancelled() {
                return Outcome::Cancelled;
            }
            session.wait_if_paused().await;
            if session.cancelled() {
                return Outcome::Cancelled;
            }

            match tcp_connect_rtt(candidate.addr, config.port, config.attempt_timeout).await {
                Ok(rtt) => recorder.record_success(rtt),
                Err(err) if err.is_fatal() => return Outcome::Fatal(err),
                Err(err) => recorder.record_failure(&err),
            }
            if trial + 1 < config.trials {
                tokio::time::sleep(config.trial_interval).await;
            }
        }

        if recorder.successes() > 0 {
            break;
        }
    }

    let summary = recorder.summarize();

    // TCP reachable: optionally verify TLS with the domains sharing
    // this address as SNI candidates.
    if summary.status == ProbeStatus::Reachable {
        let mut tls_verified = None;
        if config.tls.mode != TlsVerifyMode::Off {
            let hosts: Vec<_> = session
                .sni_hosts
                .get(&candidate.addr)
                .map(|shared| shared.iter().map(|c| c.domain.clone()).collect())
                .unwrap_or_default();
            let verified =
                tls_sni_verify_any(candidate.addr, config.port, &hosts, &config.tls)
                    .await
                    .is_ok();
            tls_verified = Some(verified);

            if !verified && config.tls.mode == TlsVerifyMode::Strict {
                // Handshake failure demotes every trial.
                let mut result =
                    ProbeResult::unreachable(candidate, ProbeStatus::Error, summary.trials);
                result.tls_verified = Some(false);
                return Outcome::Done(result);
            }
        }

        return Outcome::Done(ProbeResult {
            candidate,
            status: ProbeStatus::Reachable,
            latency_ms: summary.latency_ms,
            jitter_ms: summary.jitter_ms,
            stability: summary.stability,
            trials: summary.trials,
            tcp_blocked: false,
            tls_verified,
            completed_at: OffsetDateTime::now_utc(),
        });
    }

    // Every TCP trial failed: an ICMP echo distinguishes a filtered
    // port from a dead host.
    if config.icmp_fallback && !session.cancelled() {
        if let Some(echo_ms) = icmp_echo(candidate.addr, config.icmp_timeout).await {
            return Outcome::Done(ProbeResult {
                candidate,
                status: ProbeStatus::Reachable,
                latency_ms: Some(echo_ms),
                jitter_ms: Some(0.0),
                stability: 1.0,
                trials: 1,
                tcp_blocked: true,
                tls_verified: None,
                completed_at: OffsetDateTime::now_utc(),
            });
        }
    }

    Outcome::Done(ProbeResult::unreachable(
        candidate,
        summary.status,
        summary.trials,
    ))
}

/// Flushes buffered results to the sink as a batch on a fixed interval,
/// plus one final unconditional flush at terminal state.
async fn run_flusher(
    interval: std::time::Duration,
    session: Arc<Session>,
    sink: ResultSink,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if session.done.load(Ordering::SeqCst) {
            flush_buffer(&session, &sink).await;
            return;
        }
        tokio::select! {
            _ = ticker.tick() => {
                flush_buffer(&session, &sink).await;
            }
            _ = session.done_notify.notified() => {
                flush_buffer(&session, &sink).await;
                return;
            }
        }
    }
}

async fn flush_buffer(session: &Session, sink: &ResultSink) {
    let batch = {
        let mut buffer = session.buffer.lock().expect("buffer lock poisoned");
        if buffer.is_empty() {
            return;
        }
        std::mem::take(&mut *buffer)
    };
    tracing::debug!(batch = batch.len(), "flushing probe results");
    // A closed receiver means the consumer is gone; results are then
    // intentionally discarded.
    let _ = sink.send(batch).await;
}
