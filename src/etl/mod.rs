//! Core ETL (Extract, Transform, Load) abstractions
//!
//! Every stream is the same pipeline: an [`Extractor`] fetches one page of a
//! paginated endpoint, a [`Transformer`] filters the page's records, and a
//! [`Loader`] emits them. [`Pipeline`] drives the pages and enforces the
//! pagination policy shared by all endpoints.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::{Extractor, Page, PageToken};
pub use load::{Discard, FieldDropper, Loader};
pub use pipeline::{Pipeline, PipelineSummary};
pub use transform::{BoundFilter, IdentityTransformer, Transformer};
