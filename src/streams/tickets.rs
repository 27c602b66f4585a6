//! Tickets stream
//!
//! The tickets list endpoint cannot filter by date, so tickets are read
//! through a temporary private view:
//!
//! 1. `GET /api/users/0` resolves the user the view is shared with
//! 2. `POST /api/views` creates the view, filtered on the lower bound and
//!    sorted by `updated_datetime` ascending
//! 3. `GET /api/views/{id}/items` pages through it, following
//!    `meta.next_items`
//! 4. `DELETE /api/views/{id}/` removes it again, whatever happened in 3
//!
//! The bookmark is the latest of `updated_datetime`, `last_message_datetime`
//! and `last_received_message_datetime` over every emitted ticket. When the
//! messages stream runs too, the bookmark is held back until the messages of
//! the emitted tickets are synced, see [`Checkpoint`].

use crate::client::GorgiasClient;
use crate::config::TapConfig;
use crate::cursor::{format_datetime, max_cursor, ticket_record_cursor};
use crate::error::{Result, TapError};
use crate::etl::{BoundFilter, Extractor, Loader, Page, PageToken, Pipeline};
use crate::singer::SyncState;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::HashSet;
use url::Url;

pub const NAME: &str = "tickets";
pub const REPLICATION_KEY: &str = "updated_datetime";

/// Ids of the tickets emitted by one tickets run, in emission order
///
/// This is the only input of the messages stream: messages are fetched for
/// exactly these tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketIds(Vec<i64>);

impl TicketIds {
    pub fn new(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<i64>> for TicketIds {
    fn from(ids: Vec<i64>) -> Self {
        Self(ids)
    }
}

/// When a tickets run writes its bookmark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Advance the bookmark and emit STATE after every page
    EveryPage,
    /// Leave the state untouched; the caller commits [`TicketsRun`] once the
    /// child stream is done with the emitted tickets
    Deferred,
}

/// Outcome of one tickets run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketsRun {
    pub ids: TicketIds,
    /// Latest cursor over the emitted tickets and the previous bookmark
    pub high_water: Option<DateTime<Utc>>,
}

impl TicketsRun {
    /// Move the tickets bookmark to the run's high-water mark.
    ///
    /// Returns whether the bookmark changed.
    pub fn commit(&self, state: &mut SyncState) -> bool {
        match self.high_water {
            Some(high_water) => state.advance(NAME, REPLICATION_KEY, high_water),
            None => false,
        }
    }
}

/// Server-side filter of the sync view.
///
/// Gorgias bumps `updated_datetime` on every new message, so it bounds the
/// other two cursor fields as well.
pub fn view_filter(bound: &DateTime<Utc>) -> String {
    format!(
        "gte(ticket.updated_datetime, '{}')",
        format_datetime(bound)
    )
}

/// Body of `POST /api/views` for a sync run.
pub fn view_payload(user_id: i64, bound: &DateTime<Utc>) -> Value {
    json!({
        "category": "user",
        "order_by": "updated_datetime",
        "order_dir": "asc",
        "visibility": "private",
        "shared_with_users": [user_id],
        "type": "ticket-list",
        "slug": "tap-gorgias-sync",
        "name": "tap-gorgias sync",
        "filters": view_filter(bound),
    })
}

/// Extractor for the items of one ticket view
pub struct TicketViewExtractor {
    client: GorgiasClient,
    path: String,
    page_size: u32,
}

impl TicketViewExtractor {
    pub fn new(client: GorgiasClient, view_id: i64, page_size: u32) -> Self {
        Self {
            client,
            path: format!("/api/views/{}/items", view_id),
            page_size,
        }
    }

    /// Query of the page after `token`.
    ///
    /// `meta.next_items` is a relative URL such as
    /// `/api/views/7/items?cursor=abc&direction=next&ignored_item=12`; its
    /// `cursor` and `ignored_item` are replayed with `direction=next`.
    fn query(&self, token: Option<&PageToken>) -> Result<Vec<(&'static str, String)>> {
        let mut query = vec![("limit", self.page_size.to_string())];
        let Some(token) = token else {
            return Ok(query);
        };

        let next = Url::parse("http://next.items/")
            .and_then(|base| base.join(token.as_str()))
            .map_err(|e| {
                TapError::malformed(&self.path, format!("bad next_items '{}': {}", token, e))
            })?;
        let mut cursor = None;
        let mut ignored_item = None;
        for (key, value) in next.query_pairs() {
            match key.as_ref() {
                "cursor" => cursor = Some(value.into_owned()),
                "ignored_item" => ignored_item = Some(value.into_owned()),
                _ => {}
            }
        }
        let cursor = cursor.ok_or_else(|| {
            TapError::malformed(&self.path, format!("next_items has no cursor: {}", token))
        })?;

        query.push(("cursor", cursor));
        if let Some(ignored_item) = ignored_item {
            query.push(("ignored_item", ignored_item));
        }
        query.push(("direction", "next".to_string()));
        Ok(query)
    }
}

impl Extractor for TicketViewExtractor {
    type Item = Value;

    fn path(&self) -> &str {
        &self.path
    }

    async fn extract_page(&self, token: Option<&PageToken>) -> Result<Page<Value>> {
        let query = self.query(token)?;
        let body = self.client.get_json(&self.path, &query).await?;
        super::parse_page(&self.path, body, "next_items")
    }
}

/// Incremental tickets stream
pub struct TicketsStream {
    client: GorgiasClient,
    page_size: u32,
    max_pages: usize,
}

impl TicketsStream {
    pub fn new(client: GorgiasClient, config: &TapConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    /// Lower bound of the run: the bookmark, else the start date.
    pub fn lower_bound(state: &SyncState, start: DateTime<Utc>) -> DateTime<Utc> {
        state.bookmark(NAME).unwrap_or(start)
    }

    async fn create_view(&self, bound: &DateTime<Utc>) -> Result<i64> {
        let user_id = self.client.current_user_id().await?;
        let payload = view_payload(user_id, bound);
        log::info!("Creating ticket view with filter {}", payload["filters"]);

        let path = "/api/views";
        let view = self.client.post_json(path, &payload).await?;
        let view_id = super::record_id(path, &view)?;
        log::debug!("View {} created", view_id);
        Ok(view_id)
    }

    async fn delete_view(&self, view_id: i64) {
        match self.client.delete(&format!("/api/views/{}/", view_id)).await {
            Ok(()) => log::debug!("Deleted ticket view {}", view_id),
            Err(e) => log::warn!("Failed to delete ticket view {}: {}", view_id, e),
        }
    }

    /// Sync tickets changed since the lower bound
    ///
    /// Emits every ticket whose cursor is at or after the bound, once. With
    /// [`Checkpoint::EveryPage`] the bookmark is advanced and checkpointed
    /// after each page; with [`Checkpoint::Deferred`] `state` is left as is.
    ///
    /// Returns the ids of the emitted tickets, for the messages stream, and
    /// the high-water mark to commit
    ///
    /// # Errors
    /// Returns an error if a request fails, a page is malformed or pagination
    /// exceeds its ceiling. The view is deleted in every case.
    pub async fn sync<L: Loader>(
        &self,
        state: &mut SyncState,
        start: DateTime<Utc>,
        loader: &mut L,
        checkpoint: Checkpoint,
    ) -> Result<TicketsRun> {
        let bound = Self::lower_bound(state, start);
        log::info!("Syncing {} since {}", NAME, format_datetime(&bound));

        let view_id = self.create_view(&bound).await?;
        let result = self
            .sync_view(view_id, bound, state, loader, checkpoint)
            .await;
        self.delete_view(view_id).await;
        result
    }

    async fn sync_view<L: Loader>(
        &self,
        view_id: i64,
        bound: DateTime<Utc>,
        state: &mut SyncState,
        loader: &mut L,
        checkpoint: Checkpoint,
    ) -> Result<TicketsRun> {
        let extractor = TicketViewExtractor::new(self.client.clone(), view_id, self.page_size);
        let path = extractor.path().to_string();
        let pipeline = Pipeline::new(
            extractor,
            BoundFilter::new(bound, ticket_record_cursor),
            self.max_pages,
        );

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut high_water = state.bookmark(NAME);

        let summary = pipeline
            .run(|tickets| {
                let mut fresh = Vec::with_capacity(tickets.len());
                let mut page_high = high_water;
                for ticket in tickets {
                    let id = super::record_id(&path, &ticket)?;
                    // A ticket updated while paging moves to the end of the view
                    if !seen.insert(id) {
                        log::debug!("Ticket {} already emitted in this run", id);
                        continue;
                    }
                    page_high = max_cursor(page_high, ticket_record_cursor(&ticket));
                    ids.push(id);
                    fresh.push(ticket);
                }

                loader.load(NAME, fresh)?;
                high_water = page_high;
                if checkpoint == Checkpoint::Deferred {
                    return Ok(());
                }
                if let Some(high_water) = high_water {
                    state.advance(NAME, REPLICATION_KEY, high_water);
                }
                loader.checkpoint(state)
            })
            .await?;

        log::info!(
            "Synced {} ticket(s) from {} page(s)",
            ids.len(),
            summary.pages
        );
        Ok(TicketsRun {
            ids: TicketIds::new(ids),
            high_water,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> TicketViewExtractor {
        let config = TapConfig::new("acme", "ops@acme.test", "key");
        let client = GorgiasClient::from_config(&config).unwrap();
        TicketViewExtractor::new(client, 7, 50)
    }

    #[test]
    fn test_view_payload() {
        let bound = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let payload = view_payload(12, &bound);
        assert_eq!(payload["order_by"], "updated_datetime");
        assert_eq!(payload["order_dir"], "asc");
        assert_eq!(payload["visibility"], "private");
        assert_eq!(payload["shared_with_users"], json!([12]));
        assert_eq!(
            payload["filters"],
            "gte(ticket.updated_datetime, '2024-01-01T00:00:00+00:00')"
        );
    }

    #[test]
    fn test_first_page_query() {
        let query = extractor().query(None).unwrap();
        assert_eq!(query, vec![("limit", "50".to_string())]);
    }

    #[test]
    fn test_next_items_query() {
        let token =
            PageToken::new("/api/views/7/items?cursor=abc%3D&direction=next&ignored_item=12")
                .unwrap();
        let query = extractor().query(Some(&token)).unwrap();
        assert_eq!(
            query,
            vec![
                ("limit", "50".to_string()),
                ("cursor", "abc=".to_string()),
                ("ignored_item", "12".to_string()),
                ("direction", "next".to_string()),
            ]
        );
    }

    #[test]
    fn test_next_items_without_cursor() {
        let token = PageToken::new("/api/views/7/items?direction=next").unwrap();
        let err = extractor().query(Some(&token)).unwrap_err();
        assert!(matches!(err, TapError::MalformedResponse { .. }));
    }

    #[test]
    fn test_lower_bound_prefers_bookmark() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let bookmark = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut state = SyncState::new();
        assert_eq!(TicketsStream::lower_bound(&state, start), start);

        state.advance(NAME, REPLICATION_KEY, bookmark);
        assert_eq!(TicketsStream::lower_bound(&state, start), bookmark);
    }

    #[test]
    fn test_ticket_ids() {
        let ids = TicketIds::from(vec![3, 1]);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.iter().collect::<Vec<_>>(), vec![3, 1]);
        assert!(TicketIds::default().is_empty());
    }

    #[test]
    fn test_commit_keeps_bookmark_monotonic() {
        let bookmark = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut state = SyncState::new();
        state.advance(NAME, REPLICATION_KEY, bookmark);

        let older = TicketsRun {
            ids: TicketIds::from(vec![1]),
            high_water: Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()),
        };
        assert!(!older.commit(&mut state));
        assert_eq!(state.bookmark(NAME), Some(bookmark));

        let newer = TicketsRun {
            ids: TicketIds::from(vec![2]),
            high_water: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
        };
        assert!(newer.commit(&mut state));
        assert_eq!(state.bookmark(NAME), newer.high_water);

        assert!(!TicketsRun::default().commit(&mut state));
    }
}
