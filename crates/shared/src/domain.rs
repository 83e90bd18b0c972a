use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ProgramId);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fee range lower bound {lower} exceeds upper bound {upper}")]
pub struct InvalidFeeRange {
    pub lower: u64,
    pub upper: u64,
}

/// Closed fee interval `[lower, upper]`, currency-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeeRange", into = "RawFeeRange")]
pub struct FeeRange {
    lower: u64,
    upper: u64,
}

impl FeeRange {
    pub fn new(lower: u64, upper: u64) -> Result<Self, InvalidFeeRange> {
        if lower > upper {
            return Err(InvalidFeeRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> u64 {
        self.upper
    }
}

#[derive(Serialize, Deserialize)]
struct RawFeeRange {
    fee_lower: u64,
    fee_upper: u64,
}

impl TryFrom<RawFeeRange> for FeeRange {
    type Error = InvalidFeeRange;

    fn try_from(value: RawFeeRange) -> Result<Self, Self::Error> {
        FeeRange::new(value.fee_lower, value.fee_upper)
    }
}

impl From<FeeRange> for RawFeeRange {
    fn from(value: FeeRange) -> Self {
        Self {
            fee_lower: value.lower,
            fee_upper: value.upper,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificRequirement {
    #[serde(default)]
    pub requirement_type: String,
    #[serde(default)]
    pub grade: f64,
    #[serde(default)]
    pub requirement_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementGroup {
    #[serde(default)]
    pub requirement_type: String,
    #[serde(default)]
    pub requirement_description: String,
    #[serde(default)]
    pub specific_requirements: Vec<SpecificRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRequirements {
    #[serde(default)]
    pub international: Vec<RequirementGroup>,
    #[serde(default)]
    pub domestic: Vec<RequirementGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEntry {
    #[serde(default)]
    pub course_name: String,
    #[serde(default)]
    pub course_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    #[serde(default)]
    pub module_name: String,
    #[serde(default, rename = "course_modules")]
    pub courses: Vec<CourseEntry>,
}

/// One academic program of the catalog.
///
/// Scalar facets default to the empty string when the source omits them; an
/// empty value is treated as absent by every filter and by facet discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "data_id")]
    pub id: ProgramId,
    pub program_name: String,
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub discipline: String,
    #[serde(default)]
    pub sub_discipline: String,
    #[serde(default)]
    pub academic_level: String,
    #[serde(default)]
    pub programme_type: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub application_dates: String,
    #[serde(default, rename = "fee_range")]
    pub fee_range_label: String,
    #[serde(default)]
    pub program_link: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub domestic_total_fee: Option<FeeRange>,
    #[serde(default)]
    pub international_total_fee: Option<FeeRange>,
    #[serde(default)]
    pub admission_requirements: AdmissionRequirements,
    #[serde(default)]
    pub course_modules: Vec<CourseModule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl CatalogRecord {
    /// Value of a scalar facet, `None` when absent. Fee buckets are not a
    /// scalar field of the record and always yield `None` here.
    pub fn facet_value(&self, key: FacetKey) -> Option<&str> {
        let value = match key {
            FacetKey::Discipline => &self.discipline,
            FacetKey::SubDiscipline => &self.sub_discipline,
            FacetKey::University => &self.university,
            FacetKey::AcademicLevel => &self.academic_level,
            FacetKey::ProgrammeType => &self.programme_type,
            FacetKey::FeeRange => return None,
        };
        non_empty(value)
    }

    pub fn international_fee_lower(&self) -> Option<u64> {
        self.international_total_fee.map(|fee| fee.lower())
    }

    pub fn domestic_fee_lower(&self) -> Option<u64> {
        self.domestic_total_fee.map(|fee| fee.lower())
    }
}

impl AsRef<CatalogRecord> for CatalogRecord {
    fn as_ref(&self) -> &CatalogRecord {
        self
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKey {
    Discipline,
    #[serde(alias = "subDiscipline")]
    SubDiscipline,
    University,
    #[serde(alias = "academicLevel")]
    AcademicLevel,
    #[serde(alias = "programmeType")]
    ProgrammeType,
    #[serde(alias = "feeRange")]
    FeeRange,
}

impl FacetKey {
    pub const ALL: [FacetKey; 6] = [
        FacetKey::Discipline,
        FacetKey::SubDiscipline,
        FacetKey::University,
        FacetKey::AcademicLevel,
        FacetKey::ProgrammeType,
        FacetKey::FeeRange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FacetKey::Discipline => "discipline",
            FacetKey::SubDiscipline => "sub_discipline",
            FacetKey::University => "university",
            FacetKey::AcademicLevel => "academic_level",
            FacetKey::ProgrammeType => "programme_type",
            FacetKey::FeeRange => "fee_range",
        }
    }

    /// Accepts the snake_case names the search server emits and the
    /// camelCase names used by table callbacks.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim() {
            "discipline" => Some(FacetKey::Discipline),
            "sub_discipline" | "subDiscipline" => Some(FacetKey::SubDiscipline),
            "university" => Some(FacetKey::University),
            "academic_level" | "academicLevel" => Some(FacetKey::AcademicLevel),
            "programme_type" | "programmeType" => Some(FacetKey::ProgrammeType),
            "fee_range" | "feeRange" => Some(FacetKey::FeeRange),
            _ => None,
        }
    }
}

impl fmt::Display for FacetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fee bucket '{0}'")]
pub struct UnknownFeeBucket(pub String);

/// Fixed international-fee buckets, each the half-open interval `[min, max)`
/// over the lower bound of a program's international fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeeBucket {
    Under100k,
    From100kTo150k,
    From150kTo200k,
    From200k,
}

impl FeeBucket {
    pub const ALL: [FeeBucket; 4] = [
        FeeBucket::Under100k,
        FeeBucket::From100kTo150k,
        FeeBucket::From150kTo200k,
        FeeBucket::From200k,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeeBucket::Under100k => "0-100000",
            FeeBucket::From100kTo150k => "100000-150000",
            FeeBucket::From150kTo200k => "150000-200000",
            FeeBucket::From200k => "200000-999999999",
        }
    }

    pub fn bounds(self) -> (u64, u64) {
        match self {
            FeeBucket::Under100k => (0, 100_000),
            FeeBucket::From100kTo150k => (100_000, 150_000),
            FeeBucket::From150kTo200k => (150_000, 200_000),
            FeeBucket::From200k => (200_000, 999_999_999),
        }
    }

    pub fn contains(self, amount: u64) -> bool {
        let (min, max) = self.bounds();
        amount >= min && amount < max
    }
}

impl FromStr for FeeBucket {
    type Err = UnknownFeeBucket;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '–' || c == '—' { '-' } else { c })
            .collect();
        FeeBucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == normalized)
            .ok_or_else(|| UnknownFeeBucket(raw.to_string()))
    }
}

impl fmt::Display for FeeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub query: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
