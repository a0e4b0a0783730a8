use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use premia_data::shared::subscription_models::ExchangeId;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use super::{sse, Pair};
use crate::watch::payload::{OpportunityRow, PayloadMode, TickPayload, WatchStatus};

pub const AUTO_ROWS_PER_PAIR: usize = 200;
pub const AUTO_ROWS_MAX: usize = 400;

type Client = mpsc::UnboundedSender<Bytes>;

#[derive(Debug, Default)]
struct HubState {
    pair_clients: HashMap<Pair, Vec<Client>>,
    auto_clients: Vec<Client>,
    last_payloads: BTreeMap<Pair, TickPayload>,
    last_statuses: HashMap<Pair, WatchStatus>,
    last_aggregate: Option<TickPayload>,
}

// Drops every client whose stream has gone away.
fn send_all(clients: &mut Vec<Client>, bytes: &Bytes) {
    clients.retain(|client| client.send(bytes.clone()).is_ok());
}

/*----- */
// Hub
/*----- */
/// Subscriber sets per pair plus the cross-pair auto feed.
#[derive(Debug, Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// New pair subscriber, primed with the last tick and status.
    pub fn subscribe_pair(&self, pair: Pair) -> mpsc::UnboundedReceiver<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let _ = tx.send(sse::frame("ready", &json!({"ok": true})));
        if let Some(payload) = state.last_payloads.get(&pair) {
            let _ = tx.send(sse::frame("tick", payload));
        }
        if let Some(status) = state.last_statuses.get(&pair) {
            let _ = tx.send(sse::frame("status", status));
        }
        state.pair_clients.entry(pair).or_default().push(tx);
        debug!(domestic = %pair.0, overseas = %pair.1, "pair subscriber joined");
        rx
    }

    /// New auto subscriber, primed with the last aggregate.
    pub fn subscribe_auto(&self) -> mpsc::UnboundedReceiver<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let _ = tx.send(sse::frame("ready", &json!({"ok": true})));
        if let Some(aggregate) = &state.last_aggregate {
            let _ = tx.send(sse::frame("tick", aggregate));
        }
        state.auto_clients.push(tx);
        debug!("auto subscriber joined");
        rx
    }

    pub fn publish_tick(&self, pair: Pair, payload: TickPayload) {
        let mut state = self.state.lock();
        if let Some(clients) = state.pair_clients.get_mut(&pair) {
            send_all(clients, &sse::frame("tick", &payload));
        }

        let base = payload.clone();
        state.last_payloads.insert(pair, payload);
        let aggregate = aggregate(&base, &state.last_payloads);
        if !state.auto_clients.is_empty() {
            send_all(&mut state.auto_clients, &sse::frame("tick", &aggregate));
        }
        state.last_aggregate = Some(aggregate);
    }

    pub fn publish_status(&self, pair: Pair, status: WatchStatus) {
        let mut state = self.state.lock();
        if let Some(clients) = state.pair_clients.get_mut(&pair) {
            send_all(clients, &sse::frame("status", &status));
        }
        state.last_statuses.insert(pair, status);
    }

    /// `error` event to one pair's subscribers. Not replayed to late joiners.
    pub fn publish_error(&self, pair: Pair, message: &str) {
        let mut state = self.state.lock();
        if let Some(clients) = state.pair_clients.get_mut(&pair) {
            send_all(clients, &sse::frame("error", &json!({"message": message})));
        }
    }

    /// Same status to every pair subscriber and every auto subscriber.
    pub fn broadcast_status(&self, status: &WatchStatus) {
        let bytes = sse::frame("status", status);
        let mut state = self.state.lock();
        state
            .pair_clients
            .values_mut()
            .for_each(|clients| send_all(clients, &bytes));
        send_all(&mut state.auto_clients, &bytes);
    }

    pub fn keep_alive(&self) {
        let bytes = sse::comment(&format!("ping {}", Utc::now().timestamp_millis()));
        let mut state = self.state.lock();
        state
            .pair_clients
            .values_mut()
            .for_each(|clients| send_all(clients, &bytes));
        send_all(&mut state.auto_clients, &bytes);
    }

    pub fn client_count(&self) -> usize {
        let state = self.state.lock();
        state.pair_clients.values().map(Vec::len).sum::<usize>() + state.auto_clients.len()
    }
}

/*----- */
// Aggregation
/*----- */
fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.unwrap_or(f64::NEG_INFINITY);
    let b = b.unwrap_or(f64::NEG_INFINITY);
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn cmp_aggregate(a: &OpportunityRow, b: &OpportunityRow) -> Ordering {
    cmp_desc(a.best_edge_krw(), b.best_edge_krw())
        .then_with(|| cmp_desc(a.best_edge_pct(), b.best_edge_pct()))
        .then_with(|| a.coin.cmp(&b.coin))
}

fn with_pair(mut row: OpportunityRow, (domestic, overseas): (ExchangeId, ExchangeId)) -> OpportunityRow {
    row.domestic_exchange.get_or_insert(domestic);
    row.overseas_exchange.get_or_insert(overseas);
    row
}

/// Best priced rows across every pair, ranked again from 1. Tick metadata comes
/// from `base`.
pub fn aggregate(base: &TickPayload, payloads: &BTreeMap<Pair, TickPayload>) -> TickPayload {
    let mut rows = payloads
        .iter()
        .flat_map(|(pair, payload)| {
            payload
                .rows
                .iter()
                .take(AUTO_ROWS_PER_PAIR)
                .filter(|row| !row.missing)
                .map(move |row| with_pair(row.clone(), *pair))
        })
        .collect::<Vec<_>>();
    rows.sort_by(cmp_aggregate);
    rows.truncate(AUTO_ROWS_MAX);
    rows.iter_mut()
        .enumerate()
        .for_each(|(index, row)| row.rank = index + 1);

    TickPayload {
        mode: PayloadMode::Auto,
        watch_coins: Vec::new(),
        close_coins: Vec::new(),
        far_coins: Vec::new(),
        rows,
        all_rows: Vec::new(),
        ..base.clone()
    }
}
