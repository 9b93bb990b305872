//! Search index mirror and the query composer that reads it.

pub mod document;
pub mod index;
pub mod query;

pub use document::{CompanyFields, ServiceDocument, TypeFields, ValidityFields};
pub use index::{InMemorySearchIndex, IndexError, SearchIndex};
pub use query::{
    FilterField, ListingParams, QueryError, SearchHits, SearchQuery, SortField, SortKey, PAGE_SIZE,
};
