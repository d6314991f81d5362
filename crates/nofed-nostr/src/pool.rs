//! Fan-out queries across many relays.
//!
//! Relays are unreliable and their stored sets overlap, so one logical query
//! is sent to several of them at once and the answers are merged:
//!
//! 1. Peers are shuffled and tried one at a time as concurrency slots free up
//!    (at most `max_concurrent` in flight).
//! 2. Each attempt connects under `connect_timeout` and streams events into a
//!    shared channel until end of stored events or `query_timeout`.
//! 3. The consumer keeps the first copy of each event id and returns once
//!    `max_results` distinct events arrived, every peer finished, or the
//!    overall deadline passed.
//!
//! Failed peers are remembered for the duration of one call only. Peer tasks
//! still running when the call returns are detached and finish on their own
//! timeout; nothing new is started after that.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use nofed_common::config::RelaysConfig;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, warn};

use crate::{
    error::NostrError,
    event::Event,
    filter::Filter,
    relay::RelayConnector,
};

/// Fan-out query engine over a fixed set of relays.
#[derive(Clone)]
pub struct RelayPool {
    peers: Arc<Vec<String>>,
    connector: Arc<dyn RelayConnector>,
    max_concurrent: usize,
    connect_timeout: Duration,
    query_timeout: Duration,
    verify_signatures: bool,
}

impl RelayPool {
    pub fn new(connector: Arc<dyn RelayConnector>, config: &RelaysConfig) -> Self {
        Self {
            peers: Arc::new(config.peers.clone()),
            connector,
            max_concurrent: config.max_concurrent.max(1),
            connect_timeout: config.connect_timeout(),
            query_timeout: config.query_timeout(),
            verify_signatures: config.verify_signatures,
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Query the relays and return at most `max_results` distinct events.
    ///
    /// Never fails: unreachable peers only shrink the result.
    pub async fn query(&self, filter: &Filter, max_results: usize) -> Vec<Event> {
        let mut results: Vec<Event> = Vec::new();
        if max_results == 0 || self.peers.is_empty() {
            return results;
        }

        let mut filter = filter.clone();
        filter.limit.get_or_insert(max_results);
        let filter = Arc::new(filter);

        let deadline = Instant::now() + self.query_timeout;
        let mut untried: Vec<String> = self.peers.to_vec();
        untried.shuffle(&mut rand::rng());

        let (tx, mut rx) = mpsc::channel::<Event>(max_results.max(16));
        let mut running: JoinSet<(String, Result<usize, NostrError>)> = JoinSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            while running.len() < self.max_concurrent
                && results.len() < max_results
                && Instant::now() < deadline
            {
                let Some(url) = untried.pop() else { break };
                running.spawn(fetch_from_peer(
                    self.connector.clone(),
                    url,
                    filter.clone(),
                    tx.clone(),
                    self.connect_timeout,
                    self.query_timeout,
                ));
            }

            if results.len() >= max_results {
                break;
            }

            if running.is_empty() {
                // Every peer has been tried; take whatever is still buffered.
                while let Ok(event) = rx.try_recv() {
                    self.accept(event, &filter, &mut seen, &mut results, max_results);
                }
                break;
            }

            tokio::select! {
                biased;
                Some(event) = rx.recv() => {
                    self.accept(event, &filter, &mut seen, &mut results, max_results);
                }
                Some(joined) = running.join_next() => match joined {
                    Ok((url, Ok(count))) => debug!("Relay {} returned {} events", url, count),
                    Ok((url, Err(e))) => {
                        warn!("Relay {} failed: {}", url, e);
                        failed.insert(url);
                    }
                    Err(e) => warn!("Relay task panicked: {}", e),
                },
                _ = sleep_until(deadline) => {
                    debug!("Relay query deadline reached with {} events", results.len());
                    break;
                }
            }
        }

        running.detach_all();
        debug!(
            "Relay query finished: {} events, {} failed peers, {} untried",
            results.len(),
            failed.len(),
            untried.len()
        );
        results
    }

    fn accept(
        &self,
        event: Event,
        filter: &Filter,
        seen: &mut HashSet<String>,
        results: &mut Vec<Event>,
        max_results: usize,
    ) {
        if results.len() >= max_results || seen.contains(&event.id) {
            return;
        }
        if !filter.matches(&event) {
            debug!("Dropping event {} that does not match the filter", event.id);
            return;
        }
        if self.verify_signatures {
            if let Err(e) = event.verify() {
                debug!("Dropping event {}: {}", event.id, e);
                return;
            }
        }
        seen.insert(event.id.clone());
        results.push(event);
    }
}

async fn fetch_from_peer(
    connector: Arc<dyn RelayConnector>,
    url: String,
    filter: Arc<Filter>,
    sink: mpsc::Sender<Event>,
    connect_timeout: Duration,
    query_timeout: Duration,
) -> (String, Result<usize, NostrError>) {
    let result: Result<usize, NostrError> = async {
        let mut conn = timeout(connect_timeout, connector.connect(&url))
            .await
            .map_err(|_| NostrError::Timeout(format!("connecting to {url}")))??;
        let outcome = timeout(query_timeout, conn.query(&filter, &sink)).await;
        conn.close().await;
        outcome.map_err(|_| NostrError::Timeout(format!("querying {url}")))?
    }
    .await;
    (url, result)
}
