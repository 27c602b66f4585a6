//! Transformer trait for per-record processing

use crate::error::Result;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Transformer trait for transforming or filtering data items
///
/// # Example
/// ```no_run
/// use tap_gorgias::etl::Transformer;
/// use tap_gorgias::Result;
///
/// struct DropHtml;
///
/// impl Transformer for DropHtml {
///     type Input = serde_json::Value;
///     type Output = serde_json::Value;
///
///     fn transform(&self, mut input: Self::Input) -> Result<Option<Self::Output>> {
///         if let Some(obj) = input.as_object_mut() {
///             obj.remove("body_html");
///         }
///         Ok(Some(input))
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item. `Ok(None)` drops it.
    ///
    /// # Errors
    /// Returns an error if the item is unusable
    fn transform(&self, input: Self::Input) -> Result<Option<Self::Output>>;

    /// Transform multiple items, keeping order and skipping dropped ones
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(output) = self.transform(input)? {
                outputs.push(output);
            }
        }
        Ok(outputs)
    }
}

/// Identity transformer that passes items through unchanged
///
/// The generic parameter T must be specified when creating the transformer.
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + Sync> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Option<Self::Output>> {
        Ok(Some(input))
    }
}

/// Drops records whose cursor is older than a lower bound
///
/// Records without a cursor value are kept: they cannot be placed relative
/// to the bound, and dropping them would lose data silently.
pub struct BoundFilter {
    bound: DateTime<Utc>,
    cursor: fn(&Value) -> Option<DateTime<Utc>>,
}

impl BoundFilter {
    pub fn new(bound: DateTime<Utc>, cursor: fn(&Value) -> Option<DateTime<Utc>>) -> Self {
        Self { bound, cursor }
    }
}

impl Transformer for BoundFilter {
    type Input = Value;
    type Output = Value;

    fn transform(&self, input: Self::Input) -> Result<Option<Self::Output>> {
        match (self.cursor)(&input) {
            Some(cursor) if cursor < self.bound => {
                log::trace!(
                    "Dropping record {} older than bound",
                    input.get("id").unwrap_or(&Value::Null)
                );
                Ok(None)
            }
            _ => Ok(Some(input)),
        }
    }
}
