//! Sync driver
//!
//! Runs the selected streams one after the other in a fixed order (tickets,
//! messages, satisfaction surveys) and hands the ticket ids of the tickets
//! run to the messages stream.

use crate::client::GorgiasClient;
use crate::config::TapConfig;
use crate::error::{Result, TapError};
use crate::etl::{Discard, FieldDropper, Loader};
use crate::singer::{Catalog, SyncState};
use crate::streams::{
    Checkpoint, MessagesStream, SatisfactionSurveysStream, StreamKind, TicketsRun,
    TicketsStream,
};

use std::collections::BTreeMap;

/// Outcome of a successful sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    /// State after the last checkpoint
    pub state: SyncState,
    /// Records emitted per synced stream
    pub records: BTreeMap<&'static str, usize>,
}

/// A configured Gorgias tap
pub struct Tap {
    config: TapConfig,
    client: GorgiasClient,
}

impl Tap {
    /// Validate the config and build the API client.
    pub fn new(config: TapConfig) -> Result<Self> {
        config.validate()?;
        let client = GorgiasClient::from_config(&config)?;
        Ok(Self { config, client })
    }

    pub fn client(&self) -> &GorgiasClient {
        &self.client
    }

    pub fn discover(&self) -> Catalog {
        Catalog::discover()
    }

    /// Check the credentials. Returns the id of the authenticated user.
    pub async fn test_connection(&self) -> Result<i64> {
        self.client.test_connection().await
    }

    /// Sync the streams selected in `catalog`, or every stream without one
    ///
    /// SCHEMA, RECORD and STATE messages go to `loader`, without the
    /// properties the catalog deselects. When messages are selected without
    /// tickets, tickets are still read to find the parent ids, without
    /// emitting anything and without touching the tickets bookmark.
    ///
    /// When messages are selected, the tickets bookmark is held back until
    /// the messages of every ticket of the run are emitted. A run that fails
    /// half-way then restarts from the same tickets and loses no message.
    ///
    /// A malformed response aborts only the stream it came from; the other
    /// streams still run and the first such error is returned at the end.
    /// Any other error stops the run at once.
    pub async fn sync<L: Loader>(
        &self,
        catalog: Option<&Catalog>,
        state: SyncState,
        loader: &mut L,
    ) -> Result<SyncSummary> {
        let selected = match catalog {
            Some(catalog) => catalog.selected_streams(),
            None => StreamKind::ALL.to_vec(),
        };
        if selected.is_empty() {
            log::warn!("No streams selected");
        } else {
            let names: Vec<&str> = selected.iter().map(StreamKind::name).collect();
            log::info!("Selected streams: {}", names.join(", "));
        }

        let deselected = catalog.map(Catalog::deselected_fields).unwrap_or_default();
        let mut loader = FieldDropper::new(loader, deselected);

        let start = self.config.start_datetime();
        let mut state = state;
        let mut records = BTreeMap::new();
        let mut deferred: Option<TapError> = None;

        let with_tickets = selected.contains(&StreamKind::Tickets);
        let with_messages = selected.contains(&StreamKind::Messages);

        let mut tickets_run: Option<TicketsRun> = None;
        if with_tickets || with_messages {
            let tickets = TicketsStream::new(self.client.clone(), &self.config);
            let checkpoint = if with_messages {
                Checkpoint::Deferred
            } else {
                Checkpoint::EveryPage
            };
            let result = if with_tickets {
                loader.schema(StreamKind::Tickets)?;
                tickets.sync(&mut state, start, &mut loader, checkpoint).await
            } else {
                log::info!(
                    "{} not selected, reading them only for {}",
                    StreamKind::Tickets,
                    StreamKind::Messages
                );
                tickets.sync(&mut state, start, &mut Discard, checkpoint).await
            };
            match result {
                Ok(run) => {
                    if with_tickets {
                        records.insert(StreamKind::Tickets.name(), run.ids.len());
                    }
                    tickets_run = Some(run);
                }
                Err(e) => defer(StreamKind::Tickets, e, &mut deferred)?,
            }
        }

        if with_messages {
            match &tickets_run {
                Some(run) => {
                    loader.schema(StreamKind::Messages)?;
                    let messages = MessagesStream::new(self.client.clone(), &self.config);
                    match messages.sync(&run.ids, &mut state, start, &mut loader).await {
                        Ok(count) => {
                            records.insert(StreamKind::Messages.name(), count);
                            if with_tickets {
                                run.commit(&mut state);
                            }
                            loader.checkpoint(&state)?;
                        }
                        Err(e) => defer(StreamKind::Messages, e, &mut deferred)?,
                    }
                }
                None => log::warn!(
                    "Skipping {} because {} failed",
                    StreamKind::Messages,
                    StreamKind::Tickets
                ),
            }
        }

        if selected.contains(&StreamKind::SatisfactionSurveys) {
            let kind = StreamKind::SatisfactionSurveys;
            if state.remove(kind.name()).is_some() {
                log::debug!("Dropping bookmark of full-refresh stream {}", kind);
            }
            loader.schema(kind)?;
            let surveys = SatisfactionSurveysStream::new(self.client.clone(), &self.config);
            match surveys.sync(&mut loader).await {
                Ok(count) => {
                    records.insert(kind.name(), count);
                }
                Err(e) => defer(kind, e, &mut deferred)?,
            }
        }

        loader.checkpoint(&state)?;

        if let Some(e) = deferred {
            return Err(e);
        }
        Ok(SyncSummary { state, records })
    }
}

/// Stop on fatal errors, remember the first recoverable one.
fn defer(kind: StreamKind, error: TapError, deferred: &mut Option<TapError>) -> Result<()> {
    if error.is_fatal() {
        return Err(error);
    }
    log::error!("Stream {} aborted: {}", kind, error);
    if deferred.is_none() {
        *deferred = Some(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_new_validates_config() {
        let config = TapConfig::new("", "ops@acme.test", "key");
        assert!(matches!(
            Tap::new(config),
            Err(TapError::Configuration(_))
        ));
    }

    #[test]
    fn test_discover_lists_every_stream() {
        let tap = Tap::new(TapConfig::new("acme", "ops@acme.test", "key")).unwrap();
        assert_eq!(tap.discover().streams.len(), StreamKind::ALL.len());
        assert_eq!(tap.client().url().as_str(), "https://acme.gorgias.com/");
    }

    #[test]
    fn test_defer_keeps_first_malformed_error() {
        let mut deferred = None;
        defer(
            StreamKind::Tickets,
            TapError::malformed("/a", "first"),
            &mut deferred,
        )
        .unwrap();
        defer(
            StreamKind::Messages,
            TapError::malformed("/b", "second"),
            &mut deferred,
        )
        .unwrap();
        match deferred {
            Some(TapError::MalformedResponse { path, .. }) => assert_eq!(path, "/a"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_defer_stops_on_fatal_error() {
        let mut deferred = None;
        let err = defer(
            StreamKind::Tickets,
            TapError::Authentication {
                status: StatusCode::UNAUTHORIZED,
                body: String::new(),
            },
            &mut deferred,
        )
        .unwrap_err();
        assert!(matches!(err, TapError::Authentication { .. }));
        assert!(deferred.is_none());
    }
}
