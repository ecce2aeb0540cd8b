//! Relay orchestration
//!
//! `Pocket` ties the registry, session manager and dispatcher together:
//! obtain a fresh session, pick a serving node, sign a relay proof, send it.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use reqwest::Url;
use tracing::{debug, info, warn};

use pocket_core::{
    Aat, BoxedRng, Configuration, Keybase, Node, PocketError, RelayError, RelayPayload,
    RelayProof, RelayRequest, RelayResponse, Result, RpcError, Session,
};
use pocket_routing::NodeRegistry;
use pocket_rpc::RelayDispatcher;
use pocket_session::SessionManager;

use crate::{PocketBuilder, RelayRound};

/// Entropy stays within the range a JSON number holds exactly
const MAX_ENTROPY: u64 = 9_007_199_254_740_991;

pub struct Pocket {
    pub(crate) config: Configuration,
    pub(crate) registry: Arc<NodeRegistry>,
    pub(crate) dispatcher: Arc<RelayDispatcher>,
    pub(crate) sessions: Arc<SessionManager>,
    pub(crate) keybase: Arc<dyn Keybase>,
    pub(crate) rng: Mutex<BoxedRng>,
}

impl Pocket {
    pub fn builder() -> PocketBuilder {
        PocketBuilder::new()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn client_public_key(&self) -> String {
        self.keybase.client_public_key()
    }

    /// Send one relay for `chain`, optionally to a specific node address
    pub async fn send_relay(
        &self,
        aat: &Aat,
        chain: &str,
        payload: RelayPayload,
        node: Option<&str>,
    ) -> Result<RelayResponse> {
        self.send_relay_with_cancel(aat, chain, payload, node, std::future::pending())
            .await
    }

    /// Like [`send_relay`](Self::send_relay), aborting once `cancel` resolves
    pub async fn send_relay_with_cancel<C>(
        &self,
        aat: &Aat,
        chain: &str,
        payload: RelayPayload,
        node: Option<&str>,
        cancel: C,
    ) -> Result<RelayResponse>
    where
        C: Future<Output = ()>,
    {
        let mut round = self.start_round(aat, chain).await?;
        self.relay_in_round_with_cancel(&mut round, aat, payload, node, cancel)
            .await
    }

    /// Begin a multi-node round on the current session.
    ///
    /// Nodes used through the round are excluded from later automatic picks
    /// in the same round only.
    pub async fn start_round(&self, aat: &Aat, chain: &str) -> Result<RelayRound> {
        self.ensure_client(aat)?;
        let session = self.current_session(aat, chain).await?;
        Ok(RelayRound::new(session))
    }

    pub async fn relay_in_round(
        &self,
        round: &mut RelayRound,
        aat: &Aat,
        payload: RelayPayload,
        node: Option<&str>,
    ) -> Result<RelayResponse> {
        self.relay_in_round_with_cancel(round, aat, payload, node, std::future::pending())
            .await
    }

    pub async fn relay_in_round_with_cancel<C>(
        &self,
        round: &mut RelayRound,
        aat: &Aat,
        payload: RelayPayload,
        node: Option<&str>,
        cancel: C,
    ) -> Result<RelayResponse>
    where
        C: Future<Output = ()>,
    {
        let node = {
            let mut rng = self.rng.lock();
            round.select(node, &mut **rng)?
        };
        let chain = round.chain().to_string();
        let request = RelayRequest {
            payload,
            proof: self.build_proof(round.session(), &node, aat)?,
        };

        debug!("Relaying {} request to {}", chain, node.service_url);
        let response = self
            .dispatcher
            .relay_with_cancel(&node, &request, self.config.request_timeout(), cancel)
            .await
            .map_err(|e| RelayError::from_rpc(e, node.public_key.clone()))?;

        match self
            .sessions
            .record_relay_for(aat, &chain, &round.session().key)
            .await
        {
            Ok(count) => debug!("Session for {} has served {} relays", chain, count),
            Err(e) => debug!("Relay not counted for {}: {}", chain, e),
        }
        Ok(response)
    }

    /// Current non-stale session for the pair.
    ///
    /// Requests one when the queue is empty and replaces a stale one up to
    /// `max_session_refreshes` times. A session still stale after that is
    /// used as is.
    pub async fn current_session(&self, aat: &Aat, chain: &str) -> Result<Session> {
        let mut session = match self.sessions.get_current_session(aat, chain).await {
            Ok(session) => session,
            Err(PocketError::SessionNotFound) => self.request_session(aat, chain, None).await?,
            Err(PocketError::Rpc(e)) if e.is_transport() => {
                warn!("Dispatcher unreachable ({}), trying others", e);
                self.request_session(aat, chain, None).await?
            }
            Err(e) => return Err(e),
        };

        let mut refreshes = 0;
        while session.is_stale(&self.config) {
            if refreshes >= self.config.max_session_refreshes {
                warn!(
                    "Session for {} still stale after {} refreshes ({} blocks old)",
                    chain,
                    refreshes,
                    session.blocks_since_creation(&self.config)
                );
                break;
            }
            refreshes += 1;
            info!(
                "Session for {} is stale ({} blocks), refreshing",
                chain,
                session.blocks_since_creation(&self.config)
            );
            session = self.request_session(aat, chain, Some(&session.key)).await?;
        }
        Ok(session)
    }

    /// Register another dispatcher; returns false if it was already known
    pub fn add_dispatcher(&self, url: &Url) -> Result<bool> {
        self.registry.add_dispatcher(url)
    }

    /// Replace `stale` (or fill an empty queue), moving on to the next
    /// dispatcher while they are unreachable
    async fn request_session(&self, aat: &Aat, chain: &str, stale: Option<&str>) -> Result<Session> {
        let dispatchers = self.registry.random_dispatchers(self.registry.len())?;
        let mut last_error = PocketError::NoDispatcherAvailable;

        for dispatcher in dispatchers {
            match self
                .sessions
                .refresh_session_via(&dispatcher, aat, chain, stale)
                .await
            {
                Err(PocketError::Rpc(e)) if is_unreachable(&e) => {
                    warn!("Dispatcher {} unreachable: {}", dispatcher, e);
                    last_error = PocketError::Rpc(e);
                }
                other => return other,
            }
        }
        Err(last_error)
    }

    fn build_proof(&self, session: &Session, node: &Node, aat: &Aat) -> Result<RelayProof> {
        let entropy = self.rng.lock().gen_range(0..=MAX_ENTROPY);
        let mut proof = RelayProof {
            entropy,
            session_block_height: session.header.session_block_height,
            servicer_pub_key: node.public_key.clone(),
            blockchain: session.header.chain.clone(),
            aat: aat.clone(),
            signature: String::new(),
        };
        proof.signature = self.keybase.sign(&proof.signable_hash()?)?;
        Ok(proof)
    }

    /// The token must be issued to the account that signs the proofs
    fn ensure_client(&self, aat: &Aat) -> Result<()> {
        let client = self.keybase.client_public_key();
        if !aat.client_pub_key.eq_ignore_ascii_case(&client) {
            return Err(PocketError::Signing(format!(
                "AAT client key {} does not match keybase account {}",
                aat.client_pub_key, client
            )));
        }
        Ok(())
    }
}

fn is_unreachable(err: &RpcError) -> bool {
    err.is_transport() && !err.is_cancelled()
}
