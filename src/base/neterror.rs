use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Network-level errors produced by resolution, fetching and probing.
///
/// Per-candidate failures inside a batch are captured as data on the
/// result (status fields), never raised across the batch boundary. These
/// variants describe a single network operation's failure.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name not resolved for {domain}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("TLS handshake failed")]
    TlsHandshakeFailed,
    #[error("TLS certificate verification failed")]
    TlsCertVerifyFailed,
    #[error("Invalid domain name: {0:?}")]
    InvalidDomain(String),
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("Malformed HTTP response")]
    MalformedResponse,
    #[error("Body looks like HTML, not a hosts document")]
    NotHostsDocument,
    #[error("Document parsed to zero records")]
    EmptyDocument,
    #[error("No buffer space (socket exhaustion)")]
    NoBufferSpace,
}

impl NetError {
    /// Maps a socket-level I/O error to the matching variant.
    pub fn from_io(err: &io::Error) -> Self {
        // EMFILE/ENFILE/ENOBUFS mean the process cannot open further
        // sockets at all. This is the only engine-fatal condition.
        if matches!(err.raw_os_error(), Some(code) if is_exhaustion_code(code)) {
            return NetError::NoBufferSpace;
        }
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            _ => NetError::ConnectionFailed,
        }
    }

    /// True when the failure means "no response at all" rather than an
    /// active refusal. Timeout takes precedence over generic errors when
    /// a batch aggregates mixed failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::ConnectionTimedOut)
    }

    /// True when the process can no longer create sockets; aborts the
    /// current probe batch while preserving collected results.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NetError::NoBufferSpace)
    }
}

#[cfg(unix)]
fn is_exhaustion_code(code: i32) -> bool {
    // EMFILE, ENFILE, ENOBUFS
    code == 24 || code == 23 || code == 105
}

#[cfg(windows)]
fn is_exhaustion_code(code: i32) -> bool {
    // WSAEMFILE, WSAENOBUFS
    code == 10024 || code == 10055
}

#[cfg(not(any(unix, windows)))]
fn is_exhaustion_code(_code: i32) -> bool {
    false
}

/// Whole-operation failure of the remote source fetch.
///
/// Individual source failures are not errors; they trigger fallback to
/// the next source. Only exhausting every source (or naming a source
/// that does not exist in pinned mode) surfaces here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("all {attempted} remote sources failed")]
    AllSourcesFailed {
        attempted: usize,
        #[source]
        last: Option<NetError>,
    },
    #[error("unknown remote source {0:?}")]
    UnknownSource(String),
    #[error("no remote sources configured")]
    NoSources,
}

/// Failures of the hosts-file store. All of these are fatal for the
/// write operation; the target file is left untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("more than one managed region in {path}")]
    DuplicateRegion { path: String },
    #[error("managed region markers are damaged in {path}")]
    MarkerDamaged { path: String },
    #[error("insufficient privilege for {path}")]
    PermissionDenied { path: String },
    #[error("backup not found: {path}")]
    BackupNotFound { path: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn from_io(err: io::Error, path: &std::path::Path) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            StoreError::PermissionDenied {
                path: path.display().to_string(),
            }
        } else {
            StoreError::Io(err)
        }
    }
}

/// Resolver-cache flush failure. Reported independently of the write:
/// the on-disk state is correct, only the live cache is stale.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("flush command exited with status {0}")]
    CommandFailed(i32),
    #[error("failed to spawn flush command")]
    Spawn(#[source] io::Error),
}
