//! Wallet session state machine.
//!
//! Exactly one session exists for the life of the process, owned by the
//! [`SessionStore`]. Other components observe it only through cloned
//! snapshots. The store serializes `connect` against itself - at most one
//! wallet prompt is ever open - while reads never suspend.

use std::sync::{Arc, Mutex, MutexGuard};

use clarity_codec::StacksAddress;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::wallet::WalletGateway;
use crate::{ClientError, ClientResult};

/// The authenticated wallet account. Immutable for the session; destroyed
/// on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Network-level principal of the wallet account, the patient's
    /// identifier anchor.
    pub principal: StacksAddress,
    /// Optional display name from the wallet profile.
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(principal: StacksAddress, display_name: Option<String>) -> Self {
        Self {
            principal,
            display_name,
        }
    }
}

/// Authentication state visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    SignedOut,
    Connecting,
    Authenticated,
}

/// Snapshot of the current session. `identity` is present exactly when
/// `status` is [`SessionStatus::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub status: SessionStatus,
    pub identity: Option<Identity>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

type ConnectResult = ClientResult<Identity>;

/// Internal state: `identity` presence is tied to the variant, so the
/// snapshot invariant holds by construction.
enum AuthState {
    SignedOut,
    Connecting {
        waiters: watch::Receiver<Option<ConnectResult>>,
    },
    Authenticated {
        identity: Identity,
    },
}

struct StoreState {
    auth: AuthState,
    /// Bumped on every disconnect so a stale in-flight connect cannot
    /// resurrect the session.
    generation: u64,
}

/// Owns the process-wide session and the connect lifecycle.
pub struct SessionStore {
    gateway: Arc<dyn WalletGateway>,
    state: Mutex<StoreState>,
}

enum ConnectEntry {
    AlreadyAuthenticated(Identity),
    Join(watch::Receiver<Option<ConnectResult>>),
    Lead(watch::Sender<Option<ConnectResult>>, u64),
}

/// Restores `SignedOut` if the leading `connect` future is dropped at its
/// await point, so an abandoned attempt never wedges the store in
/// `Connecting`.
struct LeadGuard<'a> {
    store: &'a SessionStore,
    generation: u64,
    armed: bool,
}

impl LeadGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.store.lock_state();
        if state.generation == self.generation
            && matches!(state.auth, AuthState::Connecting { .. })
        {
            tracing::warn!("wallet connection abandoned before settling");
            state.auth = AuthState::SignedOut;
        }
    }
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn WalletGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(StoreState {
                auth: AuthState::SignedOut,
                generation: 0,
            }),
        }
    }

    /// Connects the wallet, transitioning `SignedOut -> Connecting ->
    /// Authenticated`.
    ///
    /// A second call while a connect is already in flight joins the same
    /// attempt and resolves with the same outcome - only one wallet prompt
    /// is ever shown. Calling while authenticated is idempotent and returns
    /// the current identity.
    ///
    /// # Errors
    ///
    /// `ClientError::UserRejected` if the person declines (or disconnects
    /// while the prompt is open), `ClientError::WalletUnavailable` if no
    /// wallet capability responds. Either failure restores `SignedOut`.
    ///
    /// Cancel-safe: dropping the leading future (for example under a
    /// caller-applied timeout) abandons the attempt and restores
    /// `SignedOut`; waiters on the abandoned attempt start a fresh one.
    pub async fn connect(&self) -> ClientResult<Identity> {
        loop {
            let entry = {
                let mut state = self.lock_state();
                match &state.auth {
                    AuthState::Authenticated { identity } => {
                        ConnectEntry::AlreadyAuthenticated(identity.clone())
                    }
                    AuthState::Connecting { waiters } => ConnectEntry::Join(waiters.clone()),
                    AuthState::SignedOut => {
                        let (tx, rx) = watch::channel(None);
                        state.auth = AuthState::Connecting { waiters: rx };
                        ConnectEntry::Lead(tx, state.generation)
                    }
                }
            };

            match entry {
                ConnectEntry::AlreadyAuthenticated(identity) => return Ok(identity),
                ConnectEntry::Join(mut rx) => {
                    match rx.wait_for(|outcome| outcome.is_some()).await {
                        Ok(settled) => {
                            if let Some(result) = settled.as_ref() {
                                return result.clone();
                            }
                        }
                        // The leader was dropped before settling; its guard
                        // has restored `SignedOut`, so start a fresh attempt.
                        Err(_) => {}
                    }
                }
                ConnectEntry::Lead(tx, generation) => {
                    // `guard` is declared after `tx`, so if this future is
                    // dropped mid-await the guard restores the state before
                    // the channel closes and wakes the waiters.
                    let guard = LeadGuard {
                        store: self,
                        generation,
                        armed: true,
                    };
                    tracing::debug!("requesting wallet connection");
                    let mut result = self.gateway.request_connection().await;

                    {
                        let mut state = self.lock_state();
                        if state.generation == generation {
                            match &result {
                                Ok(identity) => {
                                    tracing::info!(principal = %identity.principal, "wallet session authenticated");
                                    state.auth = AuthState::Authenticated {
                                        identity: identity.clone(),
                                    };
                                }
                                Err(err) => {
                                    tracing::warn!(%err, "wallet connection failed");
                                    state.auth = AuthState::SignedOut;
                                }
                            }
                        } else {
                            // Disconnected while the prompt was open: the
                            // person walked away from this session.
                            result = Err(ClientError::UserRejected);
                        }
                    }

                    guard.disarm();
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Clears the session. Valid from any state and idempotent.
    ///
    /// An in-flight `submit` is not cancelled - the transaction may already
    /// be irrevocably broadcast - but further writes require a fresh
    /// `connect`.
    pub fn disconnect(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        if !matches!(state.auth, AuthState::SignedOut) {
            tracing::info!("wallet session disconnected");
        }
        state.auth = AuthState::SignedOut;
    }

    /// Synchronous snapshot of the current session. Never suspends.
    pub fn current_session(&self) -> Session {
        let state = self.lock_state();
        match &state.auth {
            AuthState::SignedOut => Session {
                status: SessionStatus::SignedOut,
                identity: None,
            },
            AuthState::Connecting { .. } => Session {
                status: SessionStatus::Connecting,
                identity: None,
            },
            AuthState::Authenticated { identity } => Session {
                status: SessionStatus::Authenticated,
                identity: Some(identity.clone()),
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.lock_state().auth, AuthState::Authenticated { .. })
    }

    // Held only for short critical sections, never across an await.
    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{SignedTransaction, TransactionRequest};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubWallet {
        connect_calls: AtomicUsize,
        reject: bool,
        delay: Duration,
    }

    impl StubWallet {
        fn new() -> Self {
            Self {
                connect_calls: AtomicUsize::new(0),
                reject: false,
                delay: Duration::ZERO,
            }
        }

        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn identity() -> Identity {
            let principal = StacksAddress::from_str("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
                .expect("parse principal");
            Identity::new(principal, Some("Jane".into()))
        }
    }

    #[async_trait]
    impl WalletGateway for StubWallet {
        async fn request_connection(&self) -> ClientResult<Identity> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.reject {
                Err(ClientError::UserRejected)
            } else {
                Ok(Self::identity())
            }
        }

        async fn sign(&self, _request: &TransactionRequest) -> ClientResult<SignedTransaction> {
            Err(ClientError::SigningFailed)
        }
    }

    #[tokio::test]
    async fn connect_authenticates_the_session() {
        let store = SessionStore::new(Arc::new(StubWallet::new()));
        assert_eq!(store.current_session().status, SessionStatus::SignedOut);

        let identity = store.connect().await.expect("connect");
        assert_eq!(identity, StubWallet::identity());

        let session = store.current_session();
        assert_eq!(session.status, SessionStatus::Authenticated);
        assert_eq!(session.identity, Some(identity));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_connect_returns_to_signed_out() {
        let store = SessionStore::new(Arc::new(StubWallet::rejecting()));
        let err = store.connect().await.expect_err("should reject");
        assert_eq!(err, ClientError::UserRejected);

        let session = store.current_session();
        assert_eq!(session.status, SessionStatus::SignedOut);
        assert_eq!(session.identity, None);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_wallet_prompt() {
        let wallet = Arc::new(StubWallet::slow(Duration::from_millis(50)));
        let store = Arc::new(SessionStore::new(wallet.clone()));

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });
        // Give the first caller time to claim the connecting slot.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.current_session().status, SessionStatus::Connecting);

        let b = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });

        let first = a.await.expect("join").expect("first connect");
        let second = b.await.expect("join").expect("second connect");
        assert_eq!(first, second);
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_while_authenticated_is_idempotent() {
        let wallet = Arc::new(StubWallet::new());
        let store = SessionStore::new(wallet.clone());

        store.connect().await.expect("first connect");
        store.connect().await.expect("second connect");
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_from_any_state() {
        let store = SessionStore::new(Arc::new(StubWallet::new()));
        store.disconnect();
        store.disconnect();
        assert_eq!(store.current_session().status, SessionStatus::SignedOut);

        store.connect().await.expect("connect");
        store.disconnect();
        store.disconnect();
        assert_eq!(store.current_session().status, SessionStatus::SignedOut);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn aborted_connect_leaves_the_store_retryable() {
        let wallet = Arc::new(StubWallet::slow(Duration::from_millis(100)));
        let store = Arc::new(SessionStore::new(wallet.clone()));

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        pending.abort();
        let _ = pending.await;

        // The abandoned attempt must not wedge the store in `Connecting`.
        assert_eq!(store.current_session().status, SessionStatus::SignedOut);

        let identity = store.connect().await.expect("retry after abort");
        assert_eq!(identity, StubWallet::identity());
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn waiter_takes_over_when_the_leader_is_aborted() {
        let wallet = Arc::new(StubWallet::slow(Duration::from_millis(50)));
        let store = Arc::new(SessionStore::new(wallet.clone()));

        let leader = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.current_session().status, SessionStatus::Connecting);

        let follower = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        let _ = leader.await;

        let identity = follower.await.expect("join").expect("follower connect");
        assert_eq!(identity, StubWallet::identity());
        assert_eq!(store.current_session().status, SessionStatus::Authenticated);
        assert_eq!(wallet.connect_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disconnect_during_connect_leaves_session_signed_out() {
        let wallet = Arc::new(StubWallet::slow(Duration::from_millis(50)));
        let store = Arc::new(SessionStore::new(wallet));

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.disconnect();

        let err = pending
            .await
            .expect("join")
            .expect_err("stale connect must not authenticate");
        assert_eq!(err, ClientError::UserRejected);
        assert_eq!(store.current_session().status, SessionStatus::SignedOut);
    }
}
