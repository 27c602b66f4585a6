//! Extractor trait for paginated sources

use crate::error::Result;

/// Opaque next-page indicator returned by an endpoint
///
/// For most Gorgias endpoints this is `meta.next_cursor`; ticket views return
/// a relative URL in `meta.next_items` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    /// Wrap a raw token. Empty tokens mean there is no next page.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        (!raw.is_empty()).then_some(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<PageToken>) -> Self {
        Self { items, next }
    }

    /// A page with no follow-up page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Extractor trait for fetching pages from a paginated source
///
/// # Example
/// ```no_run
/// use tap_gorgias::etl::{Extractor, Page, PageToken};
/// use tap_gorgias::Result;
///
/// struct Numbers;
///
/// impl Extractor for Numbers {
///     type Item = u32;
///
///     fn path(&self) -> &str {
///         "numbers"
///     }
///
///     async fn extract_page(&self, token: Option<&PageToken>) -> Result<Page<Self::Item>> {
///         match token {
///             None => Ok(Page::new(vec![1, 2], PageToken::new("2"))),
///             Some(_) => Ok(Page::last(vec![3])),
///         }
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Endpoint path, used in logs and errors
    fn path(&self) -> &str;

    /// Fetch the page identified by `token`, or the first page for `None`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be parsed
    fn extract_page(
        &self,
        token: Option<&PageToken>,
    ) -> impl std::future::Future<Output = Result<Page<Self::Item>>> + Send;
}
