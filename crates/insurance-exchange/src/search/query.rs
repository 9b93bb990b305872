use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::document::ServiceDocument;
use crate::marketplace::domain::ServiceId;

pub const PAGE_SIZE: usize = 10;

/// Identifier fields that support exact-match filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FilterField {
    Type,
    Validity,
    Company,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [Self::Type, Self::Validity, Self::Company];

    pub const fn param(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Validity => "validity",
            Self::Company => "company",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    Price,
    CoverageAmount,
    Id,
}

impl SortField {
    fn compare(self, left: &ServiceDocument, right: &ServiceDocument) -> Ordering {
        match self {
            Self::Title => folded(&left.title).cmp(folded(&right.title)),
            Self::Price => left.price.total_cmp(&right.price),
            Self::CoverageAmount => left.coverage_amount.total_cmp(&right.coverage_amount),
            Self::Id => Ordering::Equal,
        }
    }
}

/// Sort order; a leading `-` on the wire means descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn descending(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// Full comparator including the id tie-break, so descending order is the
    /// exact reverse of ascending order.
    fn compare(self, left: &ServiceDocument, right: &ServiceDocument) -> Ordering {
        let ordering = self
            .field
            .compare(left, right)
            .then_with(|| left.id.cmp(&right.id));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (descending, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let field = match name {
            "title" => SortField::Title,
            "price" => SortField::Price,
            "coverage_amount" => SortField::CoverageAmount,
            "id" => SortField::Id,
            _ => return Err(QueryError::UnknownSort(raw.to_string())),
        };
        Ok(Self { field, descending })
    }
}

/// Raw listing parameters exactly as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "type")]
    pub type_id: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

impl ListingParams {
    fn filter(&self, field: FilterField) -> Option<&str> {
        let raw = match field {
            FilterField::Type => self.type_id.as_deref(),
            FilterField::Validity => self.validity.as_deref(),
            FilterField::Company => self.company.as_deref(),
        };
        raw.map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Rejected listing parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("filter '{param}' must be an integer identifier, got '{value}'")]
    InvalidFilter { param: &'static str, value: String },
    #[error("page must be a positive integer, got '{0}'")]
    InvalidPage(String),
    #[error("cannot sort by '{0}'")]
    UnknownSort(String),
}

/// Immutable search request: free text, identifier filters, sort
/// order and page. Evaluated once against the index or, when the index is
/// unavailable, against documents projected straight from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    text: Option<String>,
    filters: BTreeMap<FilterField, i64>,
    sort: Option<SortKey>,
    page: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            filters: BTreeMap::new(),
            sort: None,
            page: 1,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &ListingParams) -> Result<Self, QueryError> {
        let mut query = Self::new();

        if let Some(text) = params.query.as_deref() {
            query = query.with_text(text);
        }

        for field in FilterField::ALL {
            if let Some(raw) = params.filter(field) {
                let value = raw.parse::<i64>().map_err(|_| QueryError::InvalidFilter {
                    param: field.param(),
                    value: raw.to_string(),
                })?;
                query = query.with_filter(field, value);
            }
        }

        if let Some(raw) = params.sort.as_deref().filter(|raw| !raw.trim().is_empty()) {
            query = query.sorted_by(raw.parse()?);
        }

        if let Some(raw) = params.page.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let page = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|page| *page > 0)
                .ok_or_else(|| QueryError::InvalidPage(raw.to_string()))?;
            query = query.on_page(page);
        }

        Ok(query)
    }

    /// Blank text clears the text condition.
    pub fn with_text(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        self.text = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_filter(mut self, field: FilterField, value: i64) -> Self {
        self.filters.insert(field, value);
        self
    }

    pub fn without_filter(mut self, field: FilterField) -> Self {
        self.filters.remove(&field);
        self
    }

    pub fn sorted_by(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Pages are 1-indexed; zero is clamped to the first page.
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn filters(&self) -> &BTreeMap<FilterField, i64> {
        &self.filters
    }

    pub fn sort(&self) -> Option<SortKey> {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    fn terms(&self) -> HashSet<String> {
        self.text.as_deref().map(tokenize).unwrap_or_default()
    }

    fn matches(&self, terms: &HashSet<String>, document: &ServiceDocument) -> bool {
        let filters_hold = self
            .filters
            .iter()
            .all(|(field, value)| document.filter_value(*field) == *value);
        if !filters_hold {
            return false;
        }
        if terms.is_empty() {
            return true;
        }
        document
            .searchable_text()
            .flat_map(tokenize)
            .any(|token| terms.contains(&token))
    }

    /// Evaluate against a document set, returning the requested page of ids
    /// and the total match count.
    pub fn execute<'a, I>(&self, documents: I) -> SearchHits
    where
        I: IntoIterator<Item = &'a ServiceDocument>,
    {
        let terms = self.terms();
        let mut seen = HashSet::new();
        let mut matched: Vec<&ServiceDocument> = documents
            .into_iter()
            .filter(|document| self.matches(&terms, document))
            .filter(|document| seen.insert(document.id))
            .collect();

        let sort = self
            .sort
            .unwrap_or(SortKey::ascending(SortField::Title));
        matched.sort_by(|left, right| sort.compare(left, right));

        let total = matched.len();
        let offset = (self.page as usize - 1).saturating_mul(PAGE_SIZE);
        let ids = matched
            .into_iter()
            .skip(offset)
            .take(PAGE_SIZE)
            .map(|document| document.id)
            .collect();

        SearchHits { ids, total }
    }
}

/// Ordered identifiers of one result page plus the overall match count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub ids: Vec<ServiceId>,
    pub total: usize,
}

impl SearchHits {
    pub fn pages(&self) -> usize {
        self.total.div_ceil(PAGE_SIZE)
    }
}

/// Case-folded characters, so "apple" sorts before "Zebra".
fn folded(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_lowercase)
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
