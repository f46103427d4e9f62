//! In-memory fake cluster for tests.
//!
//! `FakeCluster` implements [`ClusterControl`] over a mutable running
//! set with per-node scripting: command rejection (one-shot or
//! permanent), nodes that accept `start` but never come up, probes that
//! hang past any sane timeout, and peer views that settle only after a
//! number of queries. Call counters let tests assert how many campaigns
//! actually reached the collaborator.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use basalt_types::{NodeId, PeerState};
use tokio::time::sleep;

use crate::control::ClusterControl;

#[derive(Default)]
struct FakeState {
    known: BTreeSet<NodeId>,
    running: BTreeSet<NodeId>,
    reject: BTreeSet<NodeId>,
    reject_once: BTreeSet<NodeId>,
    never_up: BTreeSet<NodeId>,
    unreachable: BTreeSet<NodeId>,
    forced_edges: HashMap<(NodeId, NodeId), PeerState>,
    connect_after: Option<u32>,
    peer_queries: HashMap<NodeId, u32>,
    start_calls: u32,
    stop_calls: u32,
    restart_calls: u32,
}

pub(crate) struct FakeCluster {
    state: Mutex<FakeState>,
}

impl FakeCluster {
    /// A cluster whose daemons are all running.
    pub(crate) fn started(names: &[&str]) -> Self {
        let known: BTreeSet<NodeId> = names.iter().map(|n| NodeId::from(*n)).collect();
        Self {
            state: Mutex::new(FakeState {
                running: known.clone(),
                known,
                ..FakeState::default()
            }),
        }
    }

    /// A cluster whose daemons are all stopped.
    pub(crate) fn stopped(names: &[&str]) -> Self {
        let known: BTreeSet<NodeId> = names.iter().map(|n| NodeId::from(*n)).collect();
        Self {
            state: Mutex::new(FakeState {
                known,
                ..FakeState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake cluster lock poisoned")
    }

    /// Kills the daemon on `node` out of band.
    pub(crate) fn stop_now(&self, node: &NodeId) {
        self.lock().running.remove(node);
    }

    /// `node` refuses every lifecycle command from now on.
    pub(crate) fn reject_commands(&self, node: &NodeId) {
        self.lock().reject.insert(node.clone());
    }

    /// `node` refuses exactly the next lifecycle command it receives.
    pub(crate) fn reject_next_command(&self, node: &NodeId) {
        self.lock().reject_once.insert(node.clone());
    }

    /// `node` accepts start/restart but its daemon never comes up.
    pub(crate) fn never_come_up(&self, node: &NodeId) {
        let mut state = self.lock();
        state.never_up.insert(node.clone());
        state.running.remove(node);
    }

    /// Probe rounds that include `node` hang far past any timeout.
    pub(crate) fn make_unreachable(&self, node: &NodeId) {
        self.lock().unreachable.insert(node.clone());
    }

    /// Pins the edge `from -> to` to a fixed state.
    pub(crate) fn force_peer_state(&self, from: &NodeId, to: &NodeId, state: PeerState) {
        self.lock()
            .forced_edges
            .insert((from.clone(), to.clone()), state);
    }

    /// Every node reports its peers `Disconnected` for its first
    /// `queries` peer-list queries, then converges normally.
    pub(crate) fn connect_peers_after(&self, queries: u32) {
        self.lock().connect_after = Some(queries);
    }

    pub(crate) fn start_calls(&self) -> u32 {
        self.lock().start_calls
    }

    pub(crate) fn stop_calls(&self) -> u32 {
        self.lock().stop_calls
    }

    pub(crate) fn restart_calls(&self) -> u32 {
        self.lock().restart_calls
    }

    /// Applies one command to each known target, honoring scripting.
    /// Unknown nodes are left out of the reply entirely.
    fn command(&self, nodes: &[NodeId], run_after: bool) -> HashMap<NodeId, bool> {
        let mut state = self.lock();
        let mut results = HashMap::new();

        for node in nodes {
            if !state.known.contains(node) {
                continue;
            }
            if state.reject.contains(node) || state.reject_once.remove(node) {
                results.insert(node.clone(), false);
                continue;
            }

            if run_after && !state.never_up.contains(node) {
                state.running.insert(node.clone());
            } else {
                state.running.remove(node);
            }
            results.insert(node.clone(), true);
        }

        results
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
    async fn start_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool> {
        self.lock().start_calls += 1;
        self.command(nodes, true)
    }

    async fn stop_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool> {
        self.lock().stop_calls += 1;
        self.command(nodes, false)
    }

    async fn restart_service(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool> {
        self.lock().restart_calls += 1;
        self.command(nodes, true)
    }

    async fn is_service_running(&self, nodes: &[NodeId]) -> HashMap<NodeId, bool> {
        let hang = {
            let state = self.lock();
            nodes.iter().any(|n| state.unreachable.contains(n))
        };
        if hang {
            sleep(Duration::from_secs(600)).await;
        }

        let state = self.lock();
        nodes
            .iter()
            .filter(|n| state.known.contains(*n))
            .map(|n| (n.clone(), state.running.contains(n)))
            .collect()
    }

    async fn list_observed_peers(&self, node: &NodeId) -> Vec<(NodeId, PeerState)> {
        let mut state = self.lock();
        let queries = state.peer_queries.entry(node.clone()).or_insert(0);
        *queries += 1;
        let settled = state
            .connect_after
            .is_none_or(|threshold| state.peer_queries[node] > threshold);

        state
            .known
            .iter()
            .filter(|peer| *peer != node)
            .map(|peer| {
                let forced = state.forced_edges.get(&(node.clone(), peer.clone()));
                let peer_state = match forced {
                    Some(forced) => *forced,
                    None if !settled => PeerState::Disconnected,
                    None if state.running.contains(peer) => PeerState::Connected,
                    None => PeerState::Disconnected,
                };
                (peer.clone(), peer_state)
            })
            .collect()
    }
}
