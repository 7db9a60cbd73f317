use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgNotification};
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dashboard::{self, DashboardKind, DashboardView};
use crate::error::FetchError;
use crate::models::Filters;

pub const CHANGE_CHANNEL: &str = "college_analytics_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
    All,
}

impl FromStr for ChangeEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(ChangeEvent::Insert),
            "update" => Ok(ChangeEvent::Update),
            "delete" => Ok(ChangeEvent::Delete),
            "*" | "all" => Ok(ChangeEvent::All),
            other => Err(format!("unknown change event: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub table: String,
    pub event: ChangeEvent,
}

impl ChangeNotification {
    pub fn from_payload(payload: &str) -> Result<Self, String> {
        #[derive(Deserialize)]
        struct Payload {
            table: String,
            event: String,
        }

        let raw: Payload = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        Ok(ChangeNotification {
            table: raw.table,
            event: raw.event.parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub table: String,
    pub event: ChangeEvent,
}

impl Subscription {
    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        self.table == notification.table
            && (self.event == ChangeEvent::All || self.event == notification.event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Loading,
    Ready(DashboardView),
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub state: PageState,
}

impl Snapshot {
    pub fn loading() -> Self {
        Snapshot {
            generation: 0,
            state: PageState::Loading,
        }
    }
}

/// Publishes `state` unless the snapshot already holds this generation or a newer one.
pub fn publish(tx: &watch::Sender<Snapshot>, generation: u64, state: PageState) -> bool {
    tx.send_if_modified(|snapshot| {
        if generation <= snapshot.generation {
            return false;
        }
        *snapshot = Snapshot { generation, state };
        true
    })
}

async fn next_notification(
    listener: &mut Option<PgListener>,
) -> Result<PgNotification, sqlx::Error> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

pub struct LiveRefresh {
    pool: PgPool,
    kind: DashboardKind,
    filters: Filters,
    subscription: Subscription,
    generation: u64,
    tx: watch::Sender<Snapshot>,
    in_flight: Option<JoinHandle<()>>,
}

impl LiveRefresh {
    pub fn new(
        pool: PgPool,
        kind: DashboardKind,
        filters: Filters,
        subscription: Subscription,
    ) -> Self {
        let (tx, _) = watch::channel(Snapshot::loading());
        Self {
            pool,
            kind,
            filters,
            subscription,
            generation: 0,
            tx,
            in_flight: None,
        }
    }

    fn refresh(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }

        self.generation += 1;
        let generation = self.generation;
        let pool = self.pool.clone();
        let filters = self.filters.clone();
        let kind = self.kind;
        let tx = self.tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let state = match dashboard::load(&pool, kind, &filters).await {
                Ok(view) => PageState::Ready(view),
                Err(error) => {
                    tracing::error!(%error, generation, "dashboard refresh failed");
                    PageState::Failed(error)
                }
            };
            if !publish(&tx, generation, state) {
                tracing::debug!(generation, "dropped stale refresh result");
            }
        }));
    }

    async fn listen(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        Ok(listener)
    }

    /// Subscribes first, then starts the initial load.
    async fn start(&mut self) -> Option<PgListener> {
        let listener = match self.listen().await {
            Ok(listener) => {
                tracing::info!(
                    table = %self.subscription.table,
                    event = ?self.subscription.event,
                    "subscribed to changes"
                );
                Some(listener)
            }
            Err(error) => {
                tracing::warn!(%error, "change subscription failed, live refresh disabled");
                None
            }
        };
        self.refresh();
        listener
    }

    /// Renders the dashboard, then again after every matching change, until Ctrl-C.
    pub async fn run<F>(mut self, mut render: F) -> anyhow::Result<()>
    where
        F: FnMut(&Snapshot),
    {
        let mut rx = self.tx.subscribe();
        render(&rx.borrow_and_update().clone());
        let mut listener = self.start().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    render(&snapshot);
                }
                notification = next_notification(&mut listener) => {
                    match notification {
                        Ok(notification) => {
                            match ChangeNotification::from_payload(notification.payload()) {
                                Ok(change) if self.subscription.matches(&change) => {
                                    tracing::info!(table = %change.table, event = ?change.event, "change received, refreshing");
                                    self.refresh();
                                }
                                Ok(_) => {}
                                Err(error) => {
                                    tracing::debug!(%error, payload = notification.payload(), "ignoring malformed change payload");
                                }
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, "change feed lost, live refresh disabled");
                            listener = None;
                        }
                    }
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        if let Some(mut listener) = listener {
            if let Err(error) = listener.unlisten_all().await {
                tracing::warn!(%error, "failed to unsubscribe from changes");
            }
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort();
        }
        tracing::info!(refreshes = self.generation, "live refresh stopped");
        Ok(())
    }
}
