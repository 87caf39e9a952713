//! A per-party networking endpoint: a line-framed TCP listener plus a cache of outbound
//! connections, driving the masked-multiplication sub-protocols.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::StreamExt;
use num_bigint::BigUint;
use rand::Rng;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::warn;

/// How long an accepted stream may sit idle before the endpoint gives up on it.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Byte/round counters accumulated by one endpoint, folded into orchestrator-level telemetry.
#[derive(Default)]
pub struct EndpointStats {
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub send_rounds: AtomicU64,
    pub recv_rounds: AtomicU64,
}

impl EndpointStats {
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.bytes_sent.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.send_rounds.load(Ordering::Relaxed),
            self.recv_rounds.load(Ordering::Relaxed),
        )
    }
}

/// Deadlines applied while tearing down an endpoint. The 50ms defaults come from the source
/// prototype; kept configurable per the spec's open question about truncating in-flight writes.
#[derive(Clone, Copy, Debug)]
pub struct CloseOptions {
    pub listener_grace: Duration,
    pub writer_grace: Duration,
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self { listener_grace: Duration::from_millis(50), writer_grace: Duration::from_millis(50) }
    }
}

type WriterSlot = Arc<AsyncMutex<Option<OwnedWriteHalf>>>;

struct Inner {
    inbox: StdMutex<VecDeque<BigUint>>,
    notify: Notify,
    writers: StdMutex<HashMap<String, WriterSlot>>,
    stats: EndpointStats,
    closed: AtomicBool,
    listener_handle: StdMutex<Option<JoinHandle<()>>>,
    close_opts: CloseOptions,
}

/// A cheaply-cloneable handle to one party's networking endpoint for the lifetime of one
/// sub-protocol run.
#[derive(Clone)]
pub struct PeerEndpoint {
    inner: Arc<Inner>,
}

impl PeerEndpoint {
    pub fn new(close_opts: CloseOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                inbox: StdMutex::new(VecDeque::new()),
                notify: Notify::new(),
                writers: StdMutex::new(HashMap::new()),
                stats: EndpointStats::default(),
                closed: AtomicBool::new(false),
                listener_handle: StdMutex::new(None),
                close_opts,
            }),
        }
    }

    /// Binds a TCP listener on `127.0.0.1:port` (0 = OS-assigned) and starts accepting peers.
    /// Returns the bound port.
    pub async fn start(&self, port: u16) -> std::io::Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let bound_port = listener.local_addr()?.port();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let inner = Arc::clone(&inner);
                        tokio::spawn(Self::read_loop(inner, stream));
                    }
                    Err(_) => break,
                }
            }
        });
        *self.inner.listener_handle.lock().expect("listener handle mutex poisoned") = Some(handle);
        Ok(bound_port)
    }

    async fn read_loop(inner: Arc<Inner>, stream: TcpStream) {
        let mut lines = FramedRead::new(stream, LinesCodec::new());
        loop {
            match tokio::time::timeout(IDLE_TIMEOUT, lines.next()).await {
                Ok(Some(Ok(line))) => {
                    inner.stats.bytes_received.fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
                    let value = parse_integer(&line);
                    inner.inbox.lock().expect("inbox mutex poisoned").push_back(value);
                    inner.notify.notify_waiters();
                }
                _ => break,
            }
        }
    }

    /// Writes `payload` as `<decimal>\n` on a cached outbound stream, retrying up to 3 times with
    /// exponential back-off. Returns the number of bytes written, or 0 on final failure.
    pub async fn send(&self, dst_host: &str, dst_port: u16, payload: &BigUint) -> usize {
        let key = format!("{dst_host}:{dst_port}");
        let slot = self.writer_slot(&key);
        let line = format!("{payload}\n");
        let bytes = line.as_bytes();

        let mut delay = Duration::from_millis(100);
        for attempt in 0..3u32 {
            let mut guard = slot.lock().await;
            if guard.is_none() {
                match TcpStream::connect((dst_host, dst_port)).await {
                    Ok(stream) => {
                        let (_read_half, write_half) = stream.into_split();
                        *guard = Some(write_half);
                    }
                    Err(e) => {
                        drop(guard);
                        warn!(error = %e, %key, attempt, "connect failed");
                        tokio::time::sleep(backoff(delay)).await;
                        delay *= 2;
                        continue;
                    }
                }
            }
            let write_result = {
                let half = guard.as_mut().expect("writer just populated");
                tokio::io::AsyncWriteExt::write_all(half, bytes).await
            };
            match write_result {
                Ok(()) => {
                    self.inner.stats.bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    self.inner.stats.send_rounds.fetch_add(1, Ordering::Relaxed);
                    return bytes.len();
                }
                Err(e) => {
                    warn!(error = %e, %key, attempt, "send failed, invalidating cached writer");
                    *guard = None;
                    drop(guard);
                    tokio::time::sleep(backoff(delay)).await;
                    delay *= 2;
                }
            }
        }
        0
    }

    fn writer_slot(&self, key: &str) -> WriterSlot {
        let mut writers = self.inner.writers.lock().expect("writers mutex poisoned");
        Arc::clone(writers.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(None))))
    }

    /// Returns up to `k` decoded integers from the inbox, waiting on the data-arrival
    /// notification until `deadline` elapses. May return fewer than `k` (including zero) on
    /// deadline expiry; this is a soft failure the caller must check for.
    pub async fn recv(&self, k: usize, deadline: Duration) -> Vec<BigUint> {
        self.inner.stats.recv_rounds.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        loop {
            // Arm the notification before inspecting the inbox so a push between the check and
            // the wait is never missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            {
                let mut inbox = self.inner.inbox.lock().expect("inbox mutex poisoned");
                if inbox.len() >= k || self.inner.closed.load(Ordering::Acquire) {
                    return inbox.drain(..k.min(inbox.len())).collect();
                }
            }
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                let mut inbox = self.inner.inbox.lock().expect("inbox mutex poisoned");
                return inbox.drain(..k.min(inbox.len())).collect();
            }
            let _ = tokio::time::timeout(deadline - elapsed, notified).await;
        }
    }

    pub fn stats(&self) -> &EndpointStats {
        &self.inner.stats
    }

    /// Idempotent: the second and subsequent calls are no-ops.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.inner.listener_handle.lock().expect("listener handle mutex poisoned").take() {
            handle.abort();
            let _ = tokio::time::timeout(self.inner.close_opts.listener_grace, handle).await;
        }

        let writers: Vec<WriterSlot> =
            self.inner.writers.lock().expect("writers mutex poisoned").values().cloned().collect();
        let grace = self.inner.close_opts.writer_grace;
        let closes = writers.into_iter().map(|slot| async move {
            let _ = tokio::time::timeout(grace, async {
                let mut guard = slot.lock().await;
                if let Some(mut half) = guard.take() {
                    let _ = tokio::io::AsyncWriteExt::shutdown(&mut half).await;
                }
            })
            .await;
        });
        futures::future::join_all(closes).await;

        self.inner.inbox.lock().expect("inbox mutex poisoned").clear();
        self.inner.notify.notify_waiters();
    }
}

fn backoff(base: Duration) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..25);
    base + Duration::from_millis(jitter_ms)
}

/// Decodes a wire payload into a non-negative integer, tolerating scientific notation or a
/// trailing zero fraction. Unparseable input is logged and treated as zero, matching the spec's
/// "never guess" rule for malformed data.
fn parse_integer(raw: &str) -> BigUint {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<BigUint>() {
        return value;
    }
    if let Some((mantissa, exponent)) = raw.split_once(['e', 'E']) {
        if let Ok(exp) = exponent.parse::<i64>() {
            if let Some(value) = parse_mantissa_with_exponent(mantissa, exp) {
                return value;
            }
        }
        warn!(raw, "unparseable scientific-notation payload, recording zero");
        return BigUint::from(0u32);
    }
    if let Some((int_part, frac_part)) = raw.split_once('.') {
        if frac_part.chars().all(|c| c == '0') {
            if let Ok(value) = int_part.parse::<BigUint>() {
                return value;
            }
        }
    }
    warn!(raw, "unparseable payload, recording zero");
    BigUint::from(0u32)
}

fn parse_mantissa_with_exponent(mantissa: &str, exponent: i64) -> Option<BigUint> {
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let digits = format!("{int_part}{frac_part}");
    let net_exponent = exponent - frac_part.len() as i64;
    if net_exponent < 0 {
        return None;
    }
    let base: BigUint = digits.parse().ok()?;
    Some(base * BigUint::from(10u32).pow(net_exponent as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_integer("123"), BigUint::from(123u32));
    }

    #[test]
    fn parses_zero_fraction_decimals() {
        assert_eq!(parse_integer("456.0"), BigUint::from(456u32));
        assert_eq!(parse_integer("456.00"), BigUint::from(456u32));
    }

    #[test]
    fn parses_scientific_notation() {
        assert_eq!(parse_integer("1.5e2"), BigUint::from(150u32));
        assert_eq!(parse_integer("2E3"), BigUint::from(2000u32));
    }

    #[test]
    fn unparseable_payload_becomes_zero() {
        assert_eq!(parse_integer("not-a-number"), BigUint::from(0u32));
        assert_eq!(parse_integer("1.23"), BigUint::from(0u32));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let endpoint = PeerEndpoint::new(CloseOptions::default());
        endpoint.start(0).await.unwrap();
        endpoint.close().await;
        endpoint.close().await;
    }

    #[tokio::test]
    async fn send_then_recv_round_trips_a_value() {
        let receiver = PeerEndpoint::new(CloseOptions::default());
        let port = receiver.start(0).await.unwrap();
        let sender = PeerEndpoint::new(CloseOptions::default());

        let sent = sender.send("127.0.0.1", port, &BigUint::from(42u32)).await;
        assert!(sent > 0);

        let got = receiver.recv(1, Duration::from_secs(1)).await;
        assert_eq!(got, vec![BigUint::from(42u32)]);

        sender.close().await;
        receiver.close().await;
    }

    #[tokio::test]
    async fn recv_returns_short_on_deadline_expiry() {
        let receiver = PeerEndpoint::new(CloseOptions::default());
        receiver.start(0).await.unwrap();
        let got = receiver.recv(2, Duration::from_millis(50)).await;
        assert!(got.len() < 2);
        receiver.close().await;
    }
}
