use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{ser::SerializeMap, Serialize, Serializer};
use shared::domain::{FacetKey, FeeBucket};
use tracing::warn;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Selected values per facet. Every facet key is always present; an empty set
/// means the facet is inactive. Sets are ordered, so two states holding the
/// same selections compare equal and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    selections: [BTreeSet<String>; 6],
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FilterState::set`].
    pub fn with<I, S>(mut self, key: FacetKey, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(key, values);
        self
    }

    pub fn get(&self, key: FacetKey) -> &BTreeSet<String> {
        &self.selections[slot(key)]
    }

    /// Replaces the selection of one facet. Blank values are dropped; fee
    /// bucket values are canonicalized and unknown buckets dropped.
    pub fn set<I, S>(&mut self, key: FacetKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = &mut self.selections[slot(key)];
        set.clear();
        for value in values {
            if let Some(value) = canonical_value(key, value.into()) {
                set.insert(value);
            }
        }
    }

    pub fn insert(&mut self, key: FacetKey, value: impl Into<String>) -> bool {
        match canonical_value(key, value.into()) {
            Some(value) => self.selections[slot(key)].insert(value),
            None => false,
        }
    }

    pub fn clear_facet(&mut self, key: FacetKey) {
        self.selections[slot(key)].clear();
    }

    pub fn clear(&mut self) {
        for set in &mut self.selections {
            set.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.iter().all(BTreeSet::is_empty)
    }

    /// Facets with at least one selected value.
    pub fn active(&self) -> impl Iterator<Item = (FacetKey, &BTreeSet<String>)> {
        FacetKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .filter(|(_, values)| !values.is_empty())
    }

    pub fn fee_buckets(&self) -> Vec<FeeBucket> {
        self.get(FacetKey::FeeRange)
            .iter()
            .filter_map(|value| value.parse().ok())
            .collect()
    }
}

impl Serialize for FilterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FacetKey::ALL.len()))?;
        for key in FacetKey::ALL {
            map.serialize_entry(key.as_str(), self.get(key))?;
        }
        map.end()
    }
}

/// Storage index of `key` in per-facet arrays.
pub(crate) fn slot(key: FacetKey) -> usize {
    match key {
        FacetKey::Discipline => 0,
        FacetKey::SubDiscipline => 1,
        FacetKey::University => 2,
        FacetKey::AcademicLevel => 3,
        FacetKey::ProgrammeType => 4,
        FacetKey::FeeRange => 5,
    }
}

fn canonical_value(key: FacetKey, value: String) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }
    if key != FacetKey::FeeRange {
        return Some(value);
    }
    match value.parse::<FeeBucket>() {
        Ok(bucket) => Some(bucket.as_str().to_string()),
        Err(err) => {
            warn!(error = %err, "filters: dropping fee bucket");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    ProgramName,
    Discipline,
    SubDiscipline,
    University,
    AcademicLevel,
    ProgrammeType,
    InternationalFee,
    DomesticFee,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::ProgramName => "program_name",
            SortField::Discipline => "discipline",
            SortField::SubDiscipline => "sub_discipline",
            SortField::University => "university",
            SortField::AcademicLevel => "academic_level",
            SortField::ProgrammeType => "programme_type",
            SortField::InternationalFee => "international_fee",
            SortField::DomesticFee => "domestic_fee",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "program_name" | "programName" => Ok(SortField::ProgramName),
            "discipline" => Ok(SortField::Discipline),
            "sub_discipline" | "subDiscipline" => Ok(SortField::SubDiscipline),
            "university" => Ok(SortField::University),
            "academic_level" | "academicLevel" => Ok(SortField::AcademicLevel),
            "programme_type" | "programmeType" => Ok(SortField::ProgrammeType),
            "international_fee" | "internationalFee" => Ok(SortField::InternationalFee),
            "domestic_fee" | "domesticFee" => Ok(SortField::DomesticFee),
            other => Err(format!("unknown sort field '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascend" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descend" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Sorting is applied only when both a field and an order are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub field: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl SortState {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self {
            field: Some(field),
            order: Some(order),
        }
    }

    pub fn is_active(&self) -> bool {
        self.field.is_some() && self.order.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingStatus {
    #[default]
    Idle,
    Thinking,
    Closed,
    Errored,
}

/// 1-based page position over the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
