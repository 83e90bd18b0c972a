//! Pure filtering, sorting and facet discovery over catalog records.
//!
//! Nothing here performs I/O or fails: malformed selections are logged and
//! collapse to empty facets.

use std::{cmp::Ordering, collections::BTreeSet};

use serde_json::{Map, Value};
use shared::domain::{CatalogRecord, FacetKey, FeeBucket};
use tracing::warn;

use crate::{
    collation::{self, Collation},
    error::ValidationError,
    types::{slot, FilterState, Pagination, SortField, SortOrder, SortState},
};

/// Records matching `keyword` and every active facet of `filters`, in their
/// original relative order.
pub fn apply_filters<T>(records: &[T], keyword: &str, filters: &FilterState) -> Vec<T>
where
    T: AsRef<CatalogRecord> + Clone,
{
    let keyword = (!keyword.is_empty()).then(|| keyword.to_lowercase());
    let fee_buckets = filters.fee_buckets();
    records
        .iter()
        .filter(|record| matches(record.as_ref(), keyword.as_deref(), filters, &fee_buckets))
        .cloned()
        .collect()
}

fn matches(
    record: &CatalogRecord,
    keyword: Option<&str>,
    filters: &FilterState,
    fee_buckets: &[FeeBucket],
) -> bool {
    if let Some(keyword) = keyword {
        let hit = [&record.program_name, &record.university, &record.discipline]
            .into_iter()
            .any(|field| field.to_lowercase().contains(keyword));
        if !hit {
            return false;
        }
    }

    for (key, selected) in filters.active() {
        if key == FacetKey::FeeRange {
            let Some(lower) = record.international_fee_lower() else {
                return false;
            };
            if !fee_buckets.iter().any(|bucket| bucket.contains(lower)) {
                return false;
            }
            continue;
        }
        match record.facet_value(key) {
            Some(value) if selected.contains(value) => {}
            _ => return false,
        }
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey<'a> {
    Text(Option<&'a str>),
    Amount(Option<u64>),
}

fn text(value: &str) -> SortKey<'_> {
    SortKey::Text((!value.trim().is_empty()).then_some(value))
}

fn sort_key(record: &CatalogRecord, field: SortField) -> SortKey<'_> {
    match field {
        SortField::ProgramName => text(&record.program_name),
        SortField::Discipline => text(&record.discipline),
        SortField::SubDiscipline => text(&record.sub_discipline),
        SortField::University => text(&record.university),
        SortField::AcademicLevel => text(&record.academic_level),
        SortField::ProgrammeType => text(&record.programme_type),
        SortField::InternationalFee => SortKey::Amount(record.international_fee_lower()),
        SortField::DomesticFee => SortKey::Amount(record.domestic_fee_lower()),
    }
}

fn compare_keys(collation: &Collation, a: SortKey<'_>, b: SortKey<'_>) -> Ordering {
    match (a, b) {
        (SortKey::Text(a), SortKey::Text(b)) => match (a, b) {
            (Some(a), Some(b)) => collation.compare(a, b),
            (a, b) => a.is_some().cmp(&b.is_some()),
        },
        (SortKey::Amount(a), SortKey::Amount(b)) => a.cmp(&b),
        (SortKey::Text(_), SortKey::Amount(_)) => Ordering::Less,
        (SortKey::Amount(_), SortKey::Text(_)) => Ordering::Greater,
    }
}

/// Stable sort by `sort`; records with an absent value come first when
/// ascending. A no-op unless both field and order are set.
pub fn apply_sorter<T>(mut records: Vec<T>, sort: SortState) -> Vec<T>
where
    T: AsRef<CatalogRecord>,
{
    let (Some(field), Some(order)) = (sort.field, sort.order) else {
        return records;
    };
    let collation = Collation::root();
    records.sort_by(|a, b| {
        let ordering = compare_keys(
            &collation,
            sort_key(a.as_ref(), field),
            sort_key(b.as_ref(), field),
        );
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
    records
}

/// Selectable values per facet, derived from the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetOptions {
    values: [Vec<String>; 6],
}

impl FacetOptions {
    pub fn get(&self, key: FacetKey) -> &[String] {
        &self.values[slot(key)]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FacetKey, &[String])> {
        FacetKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }
}

/// Facet options are always computed from the unfiltered catalog so a
/// selection can never hide the options needed to undo it.
pub fn facet_options<T>(catalog: &[T]) -> FacetOptions
where
    T: AsRef<CatalogRecord>,
{
    let mut options = FacetOptions::default();
    for key in FacetKey::ALL {
        let index = slot(key);
        if key == FacetKey::FeeRange {
            options.values[index] = FeeBucket::ALL
                .iter()
                .map(|bucket| bucket.as_str().to_string())
                .collect();
            continue;
        }
        let distinct: BTreeSet<&str> = catalog
            .iter()
            .filter_map(|record| record.as_ref().facet_value(key))
            .collect();
        let mut values: Vec<String> = distinct.into_iter().map(str::to_string).collect();
        collation::sort_strings(&mut values);
        options.values[index] = values;
    }
    options
}

/// Rebuilds a [`FilterState`] from an untyped selection such as a table
/// callback payload. Every facet key is populated; anything malformed
/// collapses to an empty facet.
pub fn build_filter_state_from_selection(raw: &Value) -> FilterState {
    match raw {
        Value::Object(map) => filter_state_from_map(map),
        Value::Null => FilterState::new(),
        _ => {
            warn!(error = %ValidationError::NotAnObject, "filters: ignoring selection");
            FilterState::new()
        }
    }
}

/// Same conversion for an already-decoded JSON object. Unknown keys are
/// dropped; a single string counts as a one-element selection.
pub fn filter_state_from_map(map: &Map<String, Value>) -> FilterState {
    let mut state = FilterState::new();
    for (raw_key, value) in map {
        let Some(key) = FacetKey::from_wire(raw_key) else {
            continue;
        };
        match selection_values(key, value) {
            Ok(values) => state.set(key, values),
            Err(err) => {
                warn!(facet = %key, error = %err, "filters: facet selection reset");
                state.clear_facet(key);
            }
        }
    }
    state
}

fn selection_values(key: FacetKey, value: &Value) -> Result<Vec<String>, ValidationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(single) => Ok(vec![single.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.clone()),
                _ => Err(ValidationError::NonStringValue(key)),
            })
            .collect(),
        _ => Err(ValidationError::NotAnArray(key)),
    }
}

/// One page of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Slices `records` to the 1-based `pagination.page`. Pages past the end are
/// empty; a zero page size is treated as one.
pub fn paginate<T: Clone>(records: &[T], pagination: Pagination) -> Page<T> {
    let page_size = pagination.page_size.max(1);
    let page = pagination.page.max(1);
    let total = records.len();
    let page_count = total.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);
    let items = if start >= total {
        Vec::new()
    } else {
        records[start..(start + page_size).min(total)].to_vec()
    };
    Page {
        items,
        page,
        page_count,
        total,
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
