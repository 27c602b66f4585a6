//! Pagination driver shared by every stream

use super::{Extractor, PageToken, Transformer};
use crate::error::{Result, TapError};

/// Pages and records seen by one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub pages: usize,
    /// Records fetched from the endpoint
    pub fetched: usize,
    /// Records left after transformation
    pub kept: usize,
}

/// Pipeline that pages through an extractor, transforms each page and hands
/// it to a page handler
///
/// Paging stops when a page is empty or carries no next-page token. A run
/// fails with [`TapError::PaginationExhausted`] when the endpoint still has
/// more pages after `max_pages`, and with [`TapError::PaginationLoop`] when
/// it hands back the token it was just called with.
///
/// # Example
/// ```no_run
/// use tap_gorgias::etl::{IdentityTransformer, Pipeline};
/// # use tap_gorgias::etl::{Extractor, Page, PageToken};
/// # use tap_gorgias::Result;
/// # struct MyExtractor;
/// # impl Extractor for MyExtractor {
/// #     type Item = i32;
/// #     fn path(&self) -> &str { "numbers" }
/// #     async fn extract_page(&self, _: Option<&PageToken>) -> Result<Page<i32>> { Ok(Page::last(vec![])) }
/// # }
///
/// # async fn example() -> Result<()> {
/// let pipeline = Pipeline::new(MyExtractor, IdentityTransformer::new(), 100);
///
/// let mut total = 0;
/// let summary = pipeline
///     .run(|items| {
///         total += items.iter().sum::<i32>();
///         Ok(())
///     })
///     .await?;
/// println!("{} pages", summary.pages);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T> {
    extractor: E,
    transformer: T,
    max_pages: usize,
}

impl<E, T> Pipeline<E, T>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, max_pages: usize) -> Self {
        Self {
            extractor,
            transformer,
            max_pages,
        }
    }

    /// Run the pipeline to the last page
    ///
    /// `on_page` is called once per non-empty page with the transformed
    /// records, possibly an empty list when every record was filtered out.
    /// The next page is only requested after `on_page` returned, so whatever
    /// it emits or checkpoints is done before more data arrives.
    ///
    /// # Errors
    /// Returns the first error of the extractor, the transformer or `on_page`,
    /// or a pagination error
    pub async fn run<F>(&self, mut on_page: F) -> Result<PipelineSummary>
    where
        F: FnMut(Vec<T::Output>) -> Result<()>,
    {
        let path = self.extractor.path();
        let mut summary = PipelineSummary::default();
        let mut token: Option<PageToken> = None;

        loop {
            if summary.pages >= self.max_pages {
                return Err(TapError::PaginationExhausted {
                    path: path.to_string(),
                    max_pages: self.max_pages,
                });
            }

            let page = self.extractor.extract_page(token.as_ref()).await?;
            summary.pages += 1;

            let fetched = page.items.len();
            if fetched == 0 {
                log::debug!("{}: page {} is empty", path, summary.pages);
                break;
            }
            summary.fetched += fetched;

            let items = self.transformer.transform_many(page.items)?;
            summary.kept += items.len();
            log::debug!(
                "{}: page {} kept {}/{} record(s)",
                path,
                summary.pages,
                items.len(),
                fetched
            );
            on_page(items)?;

            match page.next {
                None => break,
                Some(next) if token.as_ref() == Some(&next) => {
                    return Err(TapError::PaginationLoop {
                        path: path.to_string(),
                        token: next.to_string(),
                    });
                }
                Some(next) => token = Some(next),
            }
        }

        Ok(summary)
    }
}
