//! Ticket messages stream
//!
//! Child of the tickets stream: messages are listed per ticket with
//! `GET /api/tickets/{ticket_id}/messages`, only for the tickets the current
//! run emitted. The endpoint cannot filter by date, so messages created
//! before the lower bound are dropped here.

use super::tickets::TicketIds;
use crate::client::GorgiasClient;
use crate::config::TapConfig;
use crate::cursor::{field_datetime, format_datetime, max_cursor};
use crate::error::{Result, TapError};
use crate::etl::{BoundFilter, Extractor, Loader, Page, PageToken, Pipeline};
use crate::singer::SyncState;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub const NAME: &str = "messages";
pub const REPLICATION_KEY: &str = "created_datetime";

fn created_datetime(message: &Value) -> Option<DateTime<Utc>> {
    field_datetime(message, REPLICATION_KEY)
}

/// Extractor for the messages of one ticket
pub struct TicketMessagesExtractor {
    client: GorgiasClient,
    path: String,
    page_size: u32,
}

impl TicketMessagesExtractor {
    pub fn new(client: GorgiasClient, ticket_id: i64, page_size: u32) -> Self {
        Self {
            client,
            path: format!("/api/tickets/{}/messages", ticket_id),
            page_size,
        }
    }
}

impl Extractor for TicketMessagesExtractor {
    type Item = Value;

    fn path(&self) -> &str {
        &self.path
    }

    async fn extract_page(&self, token: Option<&PageToken>) -> Result<Page<Value>> {
        let mut query = vec![("limit", self.page_size.to_string())];
        if let Some(token) = token {
            query.push(("cursor", token.to_string()));
        }
        let body = self.client.get_json(&self.path, &query).await?;
        super::parse_page(&self.path, body, "next_cursor")
    }
}

/// Incremental messages stream, driven by the ticket ids of the parent run
pub struct MessagesStream {
    client: GorgiasClient,
    page_size: u32,
    max_pages: usize,
}

impl MessagesStream {
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

    /// Sync the messages of the given tickets
    ///
    /// The bound is fixed for the whole run because messages of different
    /// tickets arrive in no global order. For the same reason the bookmark is
    /// only advanced once every ticket is done: a bookmark taken half-way
    /// would drop the older messages of the remaining tickets on a rerun.
    /// Emitting the STATE is left to the caller.
    ///
    /// Returns the number of messages emitted
    ///
    /// # Errors
    /// Returns an error if a request fails, a message belongs to another
    /// ticket, or pagination exceeds its ceiling
    pub async fn sync<L: Loader>(
        &self,
        tickets: &TicketIds,
        state: &mut SyncState,
        start: DateTime<Utc>,
        loader: &mut L,
    ) -> Result<usize> {
        let bound = Self::lower_bound(state, start);
        if tickets.is_empty() {
            log::info!("No tickets in this run, skipping {}", NAME);
            return Ok(0);
        }
        log::info!(
            "Syncing {} of {} ticket(s) since {}",
            NAME,
            tickets.len(),
            format_datetime(&bound)
        );

        let mut total = 0;
        let mut high_water = state.bookmark(NAME);

        for ticket_id in tickets.iter() {
            let extractor = TicketMessagesExtractor::new(self.client.clone(), ticket_id, self.page_size);
            let path = extractor.path().to_string();
            let pipeline = Pipeline::new(
                extractor,
                BoundFilter::new(bound, created_datetime),
                self.max_pages,
            );

            let summary = pipeline
                .run(|mut messages| {
                    for message in &mut messages {
                        attach_ticket_id(&path, ticket_id, message)?;
                        high_water = max_cursor(high_water, created_datetime(message));
                    }
                    total += loader.load(NAME, messages)?;
                    Ok(())
                })
                .await?;

            if summary.fetched == 0 {
                log::debug!("Ticket {} has no messages", ticket_id);
            }
        }

        if let Some(high_water) = high_water {
            state.advance(NAME, REPLICATION_KEY, high_water);
        }

        log::info!("Synced {} message(s)", total);
        Ok(total)
    }
}

/// Make sure a message names the ticket it was listed under.
fn attach_ticket_id(path: &str, ticket_id: i64, message: &mut Value) -> Result<()> {
    let Some(obj) = message.as_object_mut() else {
        return Err(TapError::malformed(path, "message is not a JSON object"));
    };
    match obj.get("ticket_id").and_then(Value::as_i64) {
        Some(id) if id != ticket_id => Err(TapError::malformed(
            path,
            format!("message belongs to ticket {}, expected {}", id, ticket_id),
        )),
        Some(_) => Ok(()),
        None => {
            obj.insert("ticket_id".to_string(), Value::from(ticket_id));
            Ok(())
        }
    }
}
