//! Transaction dispatch and lifecycle tracking.
//!
//! The dispatcher is the single owner of every in-flight
//! [`TransactionOutcome`], keyed by [`RequestId`]. Submission signs through
//! the wallet gateway, broadcasts through the ledger network with bounded
//! backoff on transient failures, then polls for finality. Signing
//! rejections and validation failures are never retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::config::DispatchConfig;
use crate::network::{Finality, LedgerNetwork};
use crate::request::{
    RequestId, SignedTransaction, TransactionOutcome, TransactionRequest, TxId, TxState,
};
use crate::session::SessionStore;
use crate::wallet::WalletGateway;
use crate::{ClientError, ClientResult};

/// Submits built requests and tracks each one to a terminal state.
pub struct Dispatcher {
    session: Arc<SessionStore>,
    gateway: Arc<dyn WalletGateway>,
    network: Arc<dyn LedgerNetwork>,
    config: DispatchConfig,
    outcomes: Arc<Mutex<HashMap<RequestId, TransactionOutcome>>>,
    changed: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(
        session: Arc<SessionStore>,
        gateway: Arc<dyn WalletGateway>,
        network: Arc<dyn LedgerNetwork>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            session,
            gateway,
            network,
            config,
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Signs and broadcasts a built request, returning a `Pending` outcome
    /// immediately. The outcome advances to `Confirmed` or `Failed` as the
    /// network reports finality; observe it with [`Dispatcher::status_of`]
    /// or [`Dispatcher::wait_for_terminal`].
    ///
    /// Disconnecting afterwards does not cancel the transaction - it may
    /// already be irrevocably broadcast.
    ///
    /// # Errors
    ///
    /// `ClientError::NotAuthenticated` if no wallet session is active; the
    /// wallet gateway is not contacted in that case.
    pub async fn submit(&self, request: TransactionRequest) -> ClientResult<TransactionOutcome> {
        if !self.session.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        let request_id = RequestId::new();
        let outcome = TransactionOutcome::pending(request_id);
        lock_map(&self.outcomes).insert(request_id, outcome.clone());

        tracing::info!(
            %request_id,
            function = request.function_name(),
            contract = %request.contract(),
            "transaction submitted"
        );

        let tracker = Tracker {
            gateway: Arc::clone(&self.gateway),
            network: Arc::clone(&self.network),
            config: self.config.clone(),
            outcomes: Arc::clone(&self.outcomes),
            changed: Arc::clone(&self.changed),
        };
        tokio::spawn(async move { tracker.drive(request_id, request).await });

        Ok(outcome)
    }

    /// Synchronous read of the last known state for a submission. `None`
    /// for a request id this dispatcher never issued.
    pub fn status_of(&self, request_id: &RequestId) -> Option<TransactionOutcome> {
        lock_map(&self.outcomes).get(request_id).cloned()
    }

    /// Waits until the submission reaches `Confirmed` or `Failed` and
    /// returns that terminal outcome. `None` for an unknown request id.
    pub async fn wait_for_terminal(&self, request_id: &RequestId) -> Option<TransactionOutcome> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register interest before reading, so a terminal update landing
            // between the read and the await is never missed.
            notified.as_mut().enable();
            match self.status_of(request_id) {
                None => return None,
                Some(outcome) if outcome.state.is_terminal() => return Some(outcome),
                Some(_) => notified.await,
            }
        }
    }
}

/// Everything one spawned tracking task needs, detached from the
/// dispatcher's lifetime.
struct Tracker {
    gateway: Arc<dyn WalletGateway>,
    network: Arc<dyn LedgerNetwork>,
    config: DispatchConfig,
    outcomes: Arc<Mutex<HashMap<RequestId, TransactionOutcome>>>,
    changed: Arc<Notify>,
}

impl Tracker {
    async fn drive(&self, request_id: RequestId, request: TransactionRequest) {
        let signed = match self.gateway.sign(&request).await {
            Ok(signed) => signed,
            Err(err) => {
                tracing::warn!(%request_id, %err, "signing failed");
                self.fail(request_id, err);
                return;
            }
        };

        let txid = match self.broadcast_with_backoff(request_id, &signed).await {
            Ok(txid) => txid,
            Err(err) => {
                tracing::warn!(%request_id, %err, "broadcast failed");
                self.fail(request_id, err);
                return;
            }
        };

        tracing::debug!(%request_id, %txid, "transaction broadcast");
        self.apply(request_id, |outcome| outcome.txid = Some(txid.clone()));

        self.poll_finality(request_id, &txid).await;
    }

    /// Retries only transient network failures, up to the configured bound,
    /// with exponential backoff.
    async fn broadcast_with_backoff(
        &self,
        request_id: RequestId,
        signed: &SignedTransaction,
    ) -> ClientResult<TxId> {
        let mut attempt: u32 = 1;
        loop {
            match self.network.broadcast(signed).await {
                Ok(txid) => return Ok(txid),
                Err(err) if err.is_retryable() && attempt < self.config.max_broadcast_attempts => {
                    let delay = self.config.backoff_base * 2u32.saturating_pow(attempt - 1);
                    tracing::debug!(
                        %request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient broadcast failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn poll_finality(&self, request_id: RequestId, txid: &TxId) {
        let mut consecutive_failures: u32 = 0;
        loop {
            match self.network.transaction_status(txid).await {
                Ok(Finality::Confirmed) => {
                    tracing::info!(%request_id, %txid, "transaction confirmed");
                    self.apply(request_id, |outcome| outcome.state = TxState::Confirmed);
                    return;
                }
                Ok(Finality::Rejected(reason)) => {
                    tracing::warn!(%request_id, %txid, reason, "transaction rejected");
                    self.fail(request_id, ClientError::ContractRejected(reason));
                    return;
                }
                Ok(Finality::Pending) => {
                    consecutive_failures = 0;
                }
                Err(err)
                    if err.is_retryable()
                        && consecutive_failures + 1 < self.config.max_poll_failures =>
                {
                    consecutive_failures += 1;
                }
                Err(err) => {
                    tracing::warn!(%request_id, %txid, %err, "finality polling failed");
                    self.fail(request_id, err);
                    return;
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn fail(&self, request_id: RequestId, err: ClientError) {
        self.apply(request_id, |outcome| outcome.state = TxState::Failed(err));
    }

    fn apply(&self, request_id: RequestId, update: impl FnOnce(&mut TransactionOutcome)) {
        if let Some(outcome) = lock_map(&self.outcomes).get_mut(&request_id) {
            update(outcome);
        }
        self.changed.notify_waiters();
    }
}

fn lock_map(
    outcomes: &Mutex<HashMap<RequestId, TransactionOutcome>>,
) -> MutexGuard<'_, HashMap<RequestId, TransactionOutcome>> {
    outcomes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RequestBuilder;
    use crate::config::ContractConfig;
    use crate::record::{BloodType, PatientRecord};
    use crate::request::SignedTransaction;
    use crate::session::Identity;
    use async_trait::async_trait;
    use clarity_codec::StacksAddress;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubWallet {
        connect_calls: AtomicUsize,
        sign_calls: AtomicUsize,
        reject_sign: bool,
    }

    impl StubWallet {
        fn new() -> Self {
            Self {
                connect_calls: AtomicUsize::new(0),
                sign_calls: AtomicUsize::new(0),
                reject_sign: false,
            }
        }

        fn rejecting_sign() -> Self {
            Self {
                reject_sign: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl WalletGateway for StubWallet {
        async fn request_connection(&self) -> ClientResult<Identity> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            let principal = StacksAddress::from_str("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
                .map_err(ClientError::from)?;
            Ok(Identity::new(principal, None))
        }

        async fn sign(&self, request: &TransactionRequest) -> ClientResult<SignedTransaction> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_sign {
                return Err(ClientError::UserRejected);
            }
            Ok(SignedTransaction {
                bytes: request.wire_payload(),
            })
        }
    }

    struct StubNetwork {
        broadcast_calls: AtomicUsize,
        /// Broadcasts that fail transiently before one succeeds.
        transient_failures: AtomicUsize,
        /// Pending polls reported before `Confirmed`.
        polls_until_confirmed: AtomicUsize,
        reject_reason: Option<String>,
    }

    impl StubNetwork {
        fn confirming_after(polls: usize) -> Self {
            Self {
                broadcast_calls: AtomicUsize::new(0),
                transient_failures: AtomicUsize::new(0),
                polls_until_confirmed: AtomicUsize::new(polls),
                reject_reason: None,
            }
        }

        fn flaky(failures: usize) -> Self {
            Self {
                transient_failures: AtomicUsize::new(failures),
                ..Self::confirming_after(0)
            }
        }

        fn rejecting(reason: &str) -> Self {
            Self {
                reject_reason: Some(reason.to_string()),
                ..Self::confirming_after(0)
            }
        }
    }

    #[async_trait]
    impl LedgerNetwork for StubNetwork {
        async fn broadcast(&self, _tx: &SignedTransaction) -> ClientResult<TxId> {
            self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ClientError::NetworkFailure("connection reset".into()));
            }
            Ok(TxId("0xabc123".into()))
        }

        async fn transaction_status(&self, _txid: &TxId) -> ClientResult<Finality> {
            if let Some(reason) = &self.reject_reason {
                return Ok(Finality::Rejected(reason.clone()));
            }
            let remaining = self.polls_until_confirmed.load(Ordering::SeqCst);
            if remaining > 0 {
                self.polls_until_confirmed.store(remaining - 1, Ordering::SeqCst);
                return Ok(Finality::Pending);
            }
            Ok(Finality::Confirmed)
        }
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            max_broadcast_attempts: 3,
            backoff_base: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
            max_poll_failures: 3,
        }
    }

    fn harness(
        wallet: StubWallet,
        network: StubNetwork,
    ) -> (Arc<SessionStore>, Arc<StubWallet>, Arc<StubNetwork>, Dispatcher) {
        let wallet = Arc::new(wallet);
        let network = Arc::new(network);
        let session = Arc::new(SessionStore::new(wallet.clone()));
        let dispatcher = Dispatcher::new(
            session.clone(),
            wallet.clone(),
            network.clone(),
            fast_config(),
        );
        (session, wallet, network, dispatcher)
    }

    fn sample_request() -> TransactionRequest {
        let config = Arc::new(ContractConfig::testnet_default().expect("config"));
        RequestBuilder::new(config)
            .register_patient(&PatientRecord {
                patient_id: "p1".into(),
                name: "Jane Doe".into(),
                date_of_birth: 9000,
                blood_type: BloodType::ONegative,
            })
            .expect("build register")
    }

    #[tokio::test]
    async fn submit_without_authentication_never_contacts_the_wallet() {
        let (_session, wallet, network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::confirming_after(0));

        let err = dispatcher
            .submit(sample_request())
            .await
            .expect_err("unauthenticated submit must fail");
        assert_eq!(err, ClientError::NotAuthenticated);
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
        assert_eq!(network.broadcast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submitted_transaction_confirms() {
        let (session, _wallet, _network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::confirming_after(2));
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        assert_eq!(pending.state, TxState::Pending);
        assert_eq!(pending.txid, None);

        let terminal = dispatcher
            .wait_for_terminal(&pending.request_id)
            .await
            .expect("known request id");
        assert_eq!(terminal.state, TxState::Confirmed);
        assert_eq!(terminal.txid, Some(TxId("0xabc123".into())));
    }

    #[tokio::test]
    async fn transient_broadcast_failures_are_retried_with_bound() {
        let (session, _wallet, network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::flaky(2));
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        let terminal = dispatcher
            .wait_for_terminal(&pending.request_id)
            .await
            .expect("known request id");
        assert_eq!(terminal.state, TxState::Confirmed);
        assert_eq!(network.broadcast_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_broadcast_retries_fail_terminally() {
        let (session, _wallet, network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::flaky(10));
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        let terminal = dispatcher
            .wait_for_terminal(&pending.request_id)
            .await
            .expect("known request id");
        assert!(
            matches!(terminal.state, TxState::Failed(ClientError::NetworkFailure(_))),
            "got {:?}",
            terminal.state
        );
        // The bound, not the supply of failures, decides the attempt count.
        assert_eq!(network.broadcast_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn signing_rejection_is_terminal_and_never_retried() {
        let (session, wallet, network, dispatcher) =
            harness(StubWallet::rejecting_sign(), StubNetwork::confirming_after(0));
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        let terminal = dispatcher
            .wait_for_terminal(&pending.request_id)
            .await
            .expect("known request id");
        assert_eq!(terminal.state, TxState::Failed(ClientError::UserRejected));
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(network.broadcast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn contract_rejection_carries_the_reason() {
        let (session, _wallet, _network, dispatcher) = harness(
            StubWallet::new(),
            StubNetwork::rejecting("duplicate registration"),
        );
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        let terminal = dispatcher
            .wait_for_terminal(&pending.request_id)
            .await
            .expect("known request id");
        assert_eq!(
            terminal.state,
            TxState::Failed(ClientError::ContractRejected("duplicate registration".into()))
        );
    }

    #[tokio::test]
    async fn wait_for_terminal_observes_an_already_finished_submission() {
        let (session, _wallet, _network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::confirming_after(0));
        session.connect().await.expect("connect");

        let pending = dispatcher.submit(sample_request()).await.expect("submit");
        // Let the tracking task reach its terminal state, and notify, before
        // anyone starts waiting.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let terminal = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.wait_for_terminal(&pending.request_id),
        )
        .await
        .expect("wait must not hang")
        .expect("known request id");
        assert_eq!(terminal.state, TxState::Confirmed);
    }

    #[tokio::test]
    async fn status_of_unknown_request_is_none() {
        let (_session, _wallet, _network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::confirming_after(0));
        assert_eq!(dispatcher.status_of(&RequestId::new()), None);
        assert_eq!(dispatcher.wait_for_terminal(&RequestId::new()).await, None);
    }

    #[tokio::test]
    async fn concurrent_submissions_track_independently() {
        let (session, _wallet, _network, dispatcher) =
            harness(StubWallet::new(), StubNetwork::confirming_after(1));
        session.connect().await.expect("connect");

        let a = dispatcher.submit(sample_request()).await.expect("submit a");
        let b = dispatcher.submit(sample_request()).await.expect("submit b");
        assert_ne!(a.request_id, b.request_id);

        let ta = dispatcher.wait_for_terminal(&a.request_id).await.expect("a");
        let tb = dispatcher.wait_for_terminal(&b.request_id).await.expect("b");
        assert_eq!(ta.state, TxState::Confirmed);
        assert_eq!(tb.state, TxState::Confirmed);
    }
}
