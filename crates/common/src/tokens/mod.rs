//! One-shot token registry.
//!
//! Tokens are opaque URL-safe strings minted from 32 random bytes and bound
//! to a capability kind, an optional file id, and an expiry. A token can be
//! consumed successfully at most once; peeking never changes state. Expired
//! entries are swept inline before every lookup, so callers cannot observe
//! a dead token regardless of how far the background sweeper has gotten.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Covers both "never existed" and "expired" so clients cannot tell
    /// the two apart.
    #[error("not found")]
    NotFound,
    #[error("kind mismatch")]
    KindMismatch,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// A minted token and its binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenItem {
    pub token: String,
    pub kind: String,
    /// Empty for kinds that are not bound to a file (bridge-upload).
    pub file_id: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Source of token randomness. The default draws from the OS CSPRNG;
/// deterministic sources are for tests only.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        getrandom::getrandom(buf).expect("failed to generate random bytes");
    }
}

#[derive(Default)]
pub struct TokenRegistryOptions {
    /// Period of the background expiry sweep; `None` disables the sweeper
    /// (the inline sweep in create/peek/consume keeps results correct, dead
    /// entries just linger until touched).
    pub cleanup_interval: Option<Duration>,
    pub rng: Option<Arc<dyn RandomSource>>,
}

pub struct TokenRegistry {
    items: Arc<Mutex<HashMap<String, TokenItem>>>,
    rng: Arc<dyn RandomSource>,
    stop_tx: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TokenRegistry {
    /// Constructs a registry. When `cleanup_interval` is set this spawns a
    /// sweeper task and therefore must run inside a tokio runtime.
    pub fn new(options: TokenRegistryOptions) -> Self {
        let items: Arc<Mutex<HashMap<String, TokenItem>>> = Arc::default();
        let (stop_tx, stop_rx) = watch::channel(false);

        let sweeper = options
            .cleanup_interval
            .filter(|iv| !iv.is_zero())
            .map(|iv| tokio::spawn(run_sweeper(items.clone(), iv, stop_rx)));

        Self {
            items,
            rng: options.rng.unwrap_or_else(|| Arc::new(OsRandom)),
            stop_tx,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Stops the background sweeper and waits for it to exit. Idempotent;
    /// a registry without a sweeper returns immediately.
    pub async fn close(&self) {
        let _ = self.stop_tx.send(true);
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn create(&self, kind: &str, file_id: &str, ttl: Duration) -> Result<TokenItem, TokenError> {
        self.create_at(OffsetDateTime::now_utc(), kind, file_id, ttl)
    }

    pub fn create_at(
        &self,
        now: OffsetDateTime,
        kind: &str,
        file_id: &str,
        ttl: Duration,
    ) -> Result<TokenItem, TokenError> {
        if kind.is_empty() {
            return Err(TokenError::InvalidInput("kind is required"));
        }
        if ttl.is_zero() {
            return Err(TokenError::InvalidInput("ttl must be > 0"));
        }

        let token = self.new_token();
        let item = TokenItem {
            token: token.clone(),
            kind: kind.to_owned(),
            file_id: file_id.to_owned(),
            created_at: now.to_offset(time::UtcOffset::UTC),
            expires_at: (now + ttl).to_offset(time::UtcOffset::UTC),
        };

        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        prune_expired(&mut items, now);
        items.insert(token, item.clone());
        Ok(item)
    }

    pub fn peek(&self, token: &str) -> Result<TokenItem, TokenError> {
        self.peek_at(OffsetDateTime::now_utc(), token)
    }

    pub fn peek_at(&self, now: OffsetDateTime, token: &str) -> Result<TokenItem, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidInput("token is required"));
        }

        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        prune_expired(&mut items, now);
        items.get(token).cloned().ok_or(TokenError::NotFound)
    }

    pub fn consume(&self, token: &str, kind: &str) -> Result<TokenItem, TokenError> {
        self.consume_at(OffsetDateTime::now_utc(), token, kind)
    }

    /// Atomically removes and returns the token if it is live and its kind
    /// matches. A kind mismatch leaves the token in place.
    pub fn consume_at(
        &self,
        now: OffsetDateTime,
        token: &str,
        kind: &str,
    ) -> Result<TokenItem, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidInput("token is required"));
        }
        if kind.is_empty() {
            return Err(TokenError::InvalidInput("kind is required"));
        }

        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        prune_expired(&mut items, now);
        match items.get(token) {
            None => return Err(TokenError::NotFound),
            Some(item) if item.kind != kind => return Err(TokenError::KindMismatch),
            Some(_) => {}
        }
        items.remove(token).ok_or(TokenError::NotFound)
    }

    fn new_token(&self) -> String {
        let mut buf = [0u8; 32];
        self.rng.fill(&mut buf);
        URL_SAFE_NO_PAD.encode(buf)
    }
}

async fn run_sweeper(
    items: Arc<Mutex<HashMap<String, TokenItem>>>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // the first tick fires immediately
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = OffsetDateTime::now_utc();
                let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
                let before = items.len();
                prune_expired(&mut items, now);
                let removed = before - items.len();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired tokens");
                }
            }
            _ = stop_rx.changed() => return,
        }
    }
}

/// An entry is expired iff `now >= expires_at`.
fn prune_expired(items: &mut HashMap<String, TokenItem>, now: OffsetDateTime) {
    items.retain(|_, item| now < item.expires_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

    fn registry() -> TokenRegistry {
        TokenRegistry::new(TokenRegistryOptions::default())
    }

    #[tokio::test]
    async fn consume_is_one_shot() {
        let s = registry();
        let it = s
            .create_at(T0, "download", "file1", Duration::from_secs(60))
            .unwrap();

        s.consume_at(T0, &it.token, "download").unwrap();
        assert_eq!(
            s.consume_at(T0, &it.token, "download").unwrap_err(),
            TokenError::NotFound
        );
        s.close().await;
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let s = registry();
        let it = s
            .create_at(T0, "bridge-upload", "", Duration::from_secs(60))
            .unwrap();

        let peeked = s.peek_at(T0, &it.token).unwrap();
        assert_eq!(peeked, it);
        s.consume_at(T0, &it.token, "bridge-upload").unwrap();
        s.close().await;
    }

    #[tokio::test]
    async fn expired_tokens_are_invisible() {
        let s = registry();
        let it = s
            .create_at(T0, "download", "file1", Duration::from_secs(2))
            .unwrap();

        let later = T0 + Duration::from_secs(3);
        assert_eq!(s.peek_at(later, &it.token).unwrap_err(), TokenError::NotFound);
        assert_eq!(
            s.consume_at(later, &it.token, "download").unwrap_err(),
            TokenError::NotFound
        );
        s.close().await;
    }

    #[tokio::test]
    async fn expiry_boundary_is_inclusive() {
        let s = registry();
        let it = s
            .create_at(T0, "download", "f", Duration::from_secs(10))
            .unwrap();
        // at exactly expires_at the token is gone
        assert_eq!(
            s.peek_at(T0 + Duration::from_secs(10), &it.token).unwrap_err(),
            TokenError::NotFound
        );
        s.close().await;
    }

    #[tokio::test]
    async fn kind_mismatch_leaves_token() {
        let s = registry();
        let it = s
            .create_at(T0, "download", "file1", Duration::from_secs(60))
            .unwrap();

        assert_eq!(
            s.consume_at(T0, &it.token, "bridge-download").unwrap_err(),
            TokenError::KindMismatch
        );
        s.consume_at(T0, &it.token, "download").unwrap();
        s.close().await;
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected() {
        let s = registry();
        assert!(matches!(
            s.create_at(T0, "", "f", Duration::from_secs(1)),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            s.create_at(T0, "download", "f", Duration::ZERO),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            s.peek_at(T0, ""),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            s.consume_at(T0, "", "download"),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            s.consume_at(T0, "t", ""),
            Err(TokenError::InvalidInput(_))
        ));
        s.close().await;
    }

    #[tokio::test]
    async fn tokens_are_url_safe_base64_of_32_bytes() {
        struct Counting(AtomicU8);
        impl RandomSource for Counting {
            fn fill(&self, buf: &mut [u8]) {
                let n = self.0.fetch_add(1, Ordering::Relaxed);
                buf.fill(n);
            }
        }

        let s = TokenRegistry::new(TokenRegistryOptions {
            cleanup_interval: None,
            rng: Some(Arc::new(Counting(AtomicU8::new(0)))),
        });

        let a = s.create_at(T0, "download", "f", Duration::from_secs(60)).unwrap();
        let b = s.create_at(T0, "download", "f", Duration::from_secs(60)).unwrap();

        // 32 bytes -> 43 unpadded url-safe characters, deterministic per fill
        assert_eq!(a.token.len(), 43);
        assert_eq!(a.token, URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert_eq!(b.token, URL_SAFE_NO_PAD.encode([1u8; 32]));
        s.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consume_only_one_wins() {
        let s = Arc::new(registry());
        let it = s
            .create_at(T0, "download", "file1", Duration::from_secs(60))
            .unwrap();

        let wins = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let s = s.clone();
            let token = it.token.clone();
            let wins = wins.clone();
            handles.push(tokio::spawn(async move {
                if s.consume_at(T0, &token, "download").is_ok() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        s.close().await;
    }

    #[tokio::test]
    async fn sweeper_prunes_and_close_is_idempotent() {
        let s = TokenRegistry::new(TokenRegistryOptions {
            cleanup_interval: Some(Duration::from_millis(10)),
            rng: None,
        });
        let it = s.create("download", "f", Duration::from_millis(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        // whether the sweeper or the inline sweep removed it, it is gone
        assert_eq!(s.peek(&it.token).unwrap_err(), TokenError::NotFound);
        s.close().await;
        s.close().await;
    }
}
