//! Token → session registry (C7) and the idle-sweep background task.
//!
//! Grounded on the teacher's `SessionManager`-shaped registries in the
//! enrichment daemon (a `Mutex`-guarded map keyed by an opaque token,
//! background-swept on a timer) but scoped down to what the protocol
//! engine actually needs: no persistence, no multi-process coordination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::sync::Mutex;

use super::notify::Waiter;
use super::state::Phase;
use crate::session::Session;

pub struct SessionEntry {
    pub session: Session,
    pub phase: Phase,
}

pub struct SessionHandle {
    pub entry: Mutex<SessionEntry>,
    pub waiter: Waiter,
}

#[derive(Clone)]
pub struct Registry {
    sessions: Arc<Mutex<HashMap<String, Arc<SessionHandle>>>>,
    idle_timeout: Duration,
}

/// §6: "16 random bytes, lowercase hex (32 chars)".
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Registry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { sessions: Arc::new(Mutex::new(HashMap::new())), idle_timeout }
    }

    pub async fn create(&self, session: Session) -> (String, Arc<SessionHandle>) {
        let token = generate_token();
        let mut phase = Phase::New;
        phase.on_session_created();

        let handle = Arc::new(SessionHandle {
            entry: Mutex::new(SessionEntry { session, phase }),
            waiter: Waiter::new(),
        });

        self.sessions.lock().await.insert(token.clone(), handle.clone());
        (token, handle)
    }

    pub async fn get(&self, token: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(token).cloned()
    }

    pub async fn remove(&self, token: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.remove(token)
    }

    /// Evicts sessions idle past `idle_timeout` (§4.7, §8 invariant 8).
    /// Intended to run on a periodic interval from the server's startup.
    pub async fn sweep_idle(&self) {
        let mut sessions = self.sessions.lock().await;
        let mut expired = Vec::new();
        for (token, handle) in sessions.iter() {
            let entry = handle.entry.lock().await;
            if entry.session.idle_for() >= self.idle_timeout {
                expired.push(token.clone());
            }
        }
        for token in expired {
            if let Some(handle) = sessions.remove(&token) {
                let mut entry = handle.entry.lock().await;
                entry.session.close();
                entry.phase.on_close();
                handle.waiter.wake();
            }
        }
    }

    pub async fn run_idle_sweep(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.sweep_idle().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CipherKind;
    use crate::session::Layout;

    fn session() -> Session {
        Session::create([1u8; 32], CipherKind::ChaCha20Poly1305, Layout::Ascii)
    }

    #[tokio::test]
    async fn tokens_are_32_lowercase_hex_chars() {
        let registry = Registry::new(Duration::from_secs(300));
        let (token, _) = registry.create(session()).await;
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn get_after_create_returns_the_same_handle() {
        let registry = Registry::new(Duration::from_secs(300));
        let (token, handle) = registry.create(session()).await;
        let fetched = registry.get(&token).await.unwrap();
        assert!(Arc::ptr_eq(&handle, &fetched));
    }

    #[tokio::test]
    async fn unknown_token_returns_none() {
        let registry = Registry::new(Duration::from_secs(300));
        assert!(registry.get("deadbeef").await.is_none());
    }

    #[tokio::test]
    async fn sweep_evicts_only_past_the_idle_timeout() {
        let registry = Registry::new(Duration::from_millis(10));
        let (token, _) = registry.create(session()).await;

        registry.sweep_idle().await;
        assert!(registry.get(&token).await.is_some(), "not idle yet");

        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.sweep_idle().await;
        assert!(registry.get(&token).await.is_none(), "should have been evicted");
    }
}
