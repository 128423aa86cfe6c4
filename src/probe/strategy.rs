//! Probe strategies: one trial attempt each.
//!
//! The engine composes these (TCP trials first, optional TLS
//! verification on success, optional ICMP echo when every TCP trial
//! failed).

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use boring::ssl::{SslConnector, SslMethod, SslVerifyMode};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::config::TlsOptions;
use crate::base::{Domain, NetError};

/// One TCP connect trial; returns the round-trip time in milliseconds.
pub async fn tcp_connect_rtt(
    addr: IpAddr,
    port: u16,
    attempt_timeout: Duration,
) -> Result<f64, NetError> {
    let target = SocketAddr::new(addr, port);
    let started = Instant::now();
    match timeout(attempt_timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => Ok(started.elapsed().as_secs_f64() * 1000.0),
        Ok(Err(e)) => Err(NetError::from_io(&e)),
        Err(_) => Err(NetError::ConnectionTimedOut),
    }
}

/// One TLS handshake presenting `host` as SNI, validating the
/// certificate chain (and optionally the hostname). Catches addresses
/// that accept TCP but do not actually serve the target domain.
pub async fn tls_sni_verify(
    addr: IpAddr,
    port: u16,
    host: &Domain,
    opts: &TlsOptions,
) -> Result<(), NetError> {
    let target = SocketAddr::new(addr, port);

    let stream = timeout(opts.handshake_timeout, TcpStream::connect(target))
        .await
        .map_err(|_| NetError::ConnectionTimedOut)?
        .map_err(|e| NetError::from_io(&e))?;

    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::TlsHandshakeFailed)?;
    builder.set_verify(SslVerifyMode::PEER);
    let connector = builder.build();
    let mut config = connector
        .configure()
        .map_err(|_| NetError::TlsHandshakeFailed)?;
    config.set_verify_hostname(opts.verify_hostname);

    match timeout(
        opts.handshake_timeout,
        tokio_boring::connect(config, host.as_str(), stream),
    )
    .await
    {
        Ok(Ok(_tls)) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(addr = %addr, host = %host, error = %e, "TLS verification failed");
            Err(NetError::TlsCertVerifyFailed)
        }
        Err(_) => Err(NetError::ConnectionTimedOut),
    }
}

/// Tries SNI verification with up to `opts.try_hosts_limit` of the
/// domains sharing this address; any single pass verifies the address.
pub async fn tls_sni_verify_any(
    addr: IpAddr,
    port: u16,
    hosts: &[Domain],
    opts: &TlsOptions,
) -> Result<(), NetError> {
    let mut last_err = NetError::TlsCertVerifyFailed;
    for host in hosts.iter().take(opts.try_hosts_limit.max(1)) {
        match tls_sni_verify(addr, port, host, opts).await {
            Ok(()) => return Ok(()),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// One ICMP echo through the platform ping utility; returns the echo
/// time in milliseconds, or `None` when the echo failed or the output
/// could not be interpreted. ICMP may be administratively disabled, so
/// this is only ever a secondary signal.
pub async fn icmp_echo(addr: IpAddr, icmp_timeout: Duration) -> Option<f64> {
    let output = ping_command(addr, icmp_timeout).output();

    let result = match timeout(icmp_timeout + Duration::from_secs(1), output).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            tracing::debug!(addr = %addr, error = %e, "ping spawn failed");
            return None;
        }
        Err(_) => return None,
    };

    if !result.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&result.stdout);
    parse_ping_time(&text)
}

#[cfg(windows)]
fn ping_command(addr: IpAddr, icmp_timeout: Duration) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("ping");
    cmd.arg("-n")
        .arg("1")
        .arg("-w")
        .arg(icmp_timeout.as_millis().to_string())
        .arg(addr.to_string());
    cmd
}

#[cfg(not(windows))]
fn ping_command(addr: IpAddr, icmp_timeout: Duration) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("ping");
    cmd.arg("-c")
        .arg("1")
        .arg("-W")
        .arg(icmp_timeout.as_secs().max(1).to_string())
        .arg(addr.to_string());
    cmd
}

/// Extracts the echo time from ping output: `time=12.3 ms`, `time=5ms`
/// or `time<1ms`.
fn parse_ping_time(output: &str) -> Option<f64> {
    let lower = output.to_ascii_lowercase();
    if let Some(pos) = lower.find("time=") {
        let rest = &lower[pos + 5..];
        let numeric: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        return numeric.parse::<f64>().ok().map(|ms| ms.max(1.0));
    }
    if lower.contains("time<1") {
        return Some(1.0);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[test]
    fn parse_ping_output_variants() {
        let linux = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=12.3 ms";
        assert_eq!(parse_ping_time(linux), Some(12.3));

        let windows = "Reply from 1.1.1.1: bytes=32 time=5ms TTL=57";
        assert_eq!(parse_ping_time(windows), Some(5.0));

        let sub_ms = "Reply from 1.1.1.1: bytes=32 time<1ms TTL=57";
        assert_eq!(parse_ping_time(sub_ms), Some(1.0));

        assert_eq!(parse_ping_time("Request timed out."), None);
    }

    #[tokio::test]
    async fn tcp_connect_measures_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let rtt = tcp_connect_rtt(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(rtt >= 0.0 && rtt < 1000.0);
    }

    #[tokio::test]
    async fn tcp_connect_refused_maps_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = tcp_connect_rtt(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            NetError::ConnectionRefused | NetError::ConnectionFailed
        ));
    }
}
