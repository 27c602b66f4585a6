//! Satisfaction surveys stream
//!
//! `GET /api/satisfaction-surveys` supports neither filtering nor ordering,
//! and surveys have no reliable update timestamp, so this is a full-refresh
//! stream: every run reads the whole collection and no bookmark is kept.
//! Consumers deduplicate on `id`.

use crate::client::GorgiasClient;
use crate::config::TapConfig;
use crate::error::Result;
use crate::etl::{Extractor, IdentityTransformer, Loader, Page, PageToken, Pipeline};

use serde_json::Value;

pub const NAME: &str = "satisfaction_surveys";
const PATH: &str = "/api/satisfaction-surveys";

pub struct SatisfactionSurveysExtractor {
    client: GorgiasClient,
    page_size: u32,
}

impl SatisfactionSurveysExtractor {
    pub fn new(client: GorgiasClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

impl Extractor for SatisfactionSurveysExtractor {
    type Item = Value;

    fn path(&self) -> &str {
        PATH
    }

    async fn extract_page(&self, token: Option<&PageToken>) -> Result<Page<Value>> {
        let mut query = vec![("limit", self.page_size.to_string())];
        if let Some(token) = token {
            query.push(("cursor", token.to_string()));
        }
        let body = self.client.get_json(PATH, &query).await?;
        super::parse_page(PATH, body, "next_cursor")
    }
}

pub struct SatisfactionSurveysStream {
    client: GorgiasClient,
    page_size: u32,
    max_pages: usize,
}

impl SatisfactionSurveysStream {
    pub fn new(client: GorgiasClient, config: &TapConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    /// Sync the whole collection. Returns the number of surveys emitted.
    pub async fn sync<L: Loader>(&self, loader: &mut L) -> Result<usize> {
        log::info!("Syncing {} (full refresh)", NAME);

        let pipeline = Pipeline::new(
            SatisfactionSurveysExtractor::new(self.client.clone(), self.page_size),
            IdentityTransformer::new(),
            self.max_pages,
        );
        let mut total = 0;
        let summary = pipeline
            .run(|surveys| {
                total += loader.load(NAME, surveys)?;
                Ok(())
            })
            .await?;

        log::info!("Synced {} survey(s) from {} page(s)", total, summary.pages);
        Ok(total)
    }
}
