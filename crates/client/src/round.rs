//! Node selection within a relay round
//!
//! A round works on its own copy of the session so exclusion marks never leak
//! into the stored session or into other calls.

use rand::seq::SliceRandom;
use rand::RngCore;

use pocket_core::{Node, PocketError, Result, Session};

/// Pick a serving node from `nodes`.
///
/// An explicit address must belong to the session. Otherwise a node not yet
/// used in this round is chosen uniformly at random.
pub fn select_node<R: RngCore + ?Sized>(
    nodes: &[Node],
    explicit: Option<&str>,
    rng: &mut R,
) -> Result<Node> {
    if let Some(address) = explicit {
        return nodes
            .iter()
            .find(|n| n.has_address(address))
            .cloned()
            .ok_or_else(|| PocketError::NodeNotInSession(address.to_string()));
    }

    let available: Vec<&Node> = nodes.iter().filter(|n| !n.already_in_consensus).collect();
    available
        .choose(rng)
        .map(|n| (*n).clone())
        .ok_or(PocketError::NoAvailableSessionNode)
}

/// Call-scoped view of a session for multi-node relays
#[derive(Debug, Clone)]
pub struct RelayRound {
    session: Session,
}

impl RelayRound {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn chain(&self) -> &str {
        &self.session.header.chain
    }

    /// Select a node and mark it used for the rest of the round
    pub fn select<R: RngCore + ?Sized>(&mut self, explicit: Option<&str>, rng: &mut R) -> Result<Node> {
        let node = select_node(&self.session.nodes, explicit, rng)?;
        self.mark_used(&node.address);
        Ok(node)
    }

    pub fn mark_used(&mut self, address: &str) {
        if let Some(node) = self.session.nodes.iter_mut().find(|n| n.has_address(address)) {
            node.already_in_consensus = true;
        }
    }

    /// Nodes not yet used in this round
    pub fn remaining(&self) -> usize {
        self.session
            .nodes
            .iter()
            .filter(|n| !n.already_in_consensus)
            .count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
