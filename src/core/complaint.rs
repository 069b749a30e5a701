//! Complaint records and the fixed issue-type palette.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A geographic point in the domain's `(latitude, longitude)` order.
///
/// Serialized as `[lat, lon]`. Conversion to the map's `(lon, lat)` order
/// lives in [`crate::surface::LngLat`] and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(ValidationError::InvalidCoordinates);
        }
        Ok(Self { lat, lon })
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Shift both axes; used for pulse jitter.
    pub fn offset(&self, dlat: f64, dlon: f64) -> Self {
        Self {
            lat: self.lat + dlat,
            lon: self.lon + dlon,
        }
    }
}

impl TryFrom<[f64; 2]> for Coordinates {
    type Error = ValidationError;

    fn try_from(pair: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(pair[0], pair[1])
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// Complaint category. Unknown labels are kept verbatim in `Other` so they
/// round-trip, but they render with the fallback color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    StreetSanitation,
    IllegalDumping,
    AirQuality,
    TrashAccumulation,
    InfrastructureCosts,
    HumanAnimalFeces,
    CommercialBlight,
    AirPollution,
    EncampmentWaste,
    Other(String),
}

/// Color used for `Other` and for any label outside the known set.
pub const FALLBACK_COLOR: &str = "#66BB6A";

impl IssueType {
    pub const KNOWN: [IssueType; 9] = [
        IssueType::StreetSanitation,
        IssueType::IllegalDumping,
        IssueType::AirQuality,
        IssueType::TrashAccumulation,
        IssueType::InfrastructureCosts,
        IssueType::HumanAnimalFeces,
        IssueType::CommercialBlight,
        IssueType::AirPollution,
        IssueType::EncampmentWaste,
    ];

    pub fn label(&self) -> &str {
        match self {
            IssueType::StreetSanitation => "Street Sanitation",
            IssueType::IllegalDumping => "Illegal Dumping",
            IssueType::AirQuality => "Air Quality",
            IssueType::TrashAccumulation => "Trash Accumulation",
            IssueType::InfrastructureCosts => "Infrastructure Costs",
            IssueType::HumanAnimalFeces => "Human/Animal Feces",
            IssueType::CommercialBlight => "Commercial Blight",
            IssueType::AirPollution => "Air Pollution",
            IssueType::EncampmentWaste => "Encampment Waste",
            IssueType::Other(label) => label,
        }
    }

    /// Display color for markers and pulses.
    pub fn color(&self) -> &'static str {
        match self {
            IssueType::StreetSanitation => "#2E7D32",
            IssueType::IllegalDumping => "#43A047",
            IssueType::AirQuality => "#4CAF50",
            IssueType::TrashAccumulation => "#66BB6A",
            IssueType::InfrastructureCosts => "#81C784",
            IssueType::HumanAnimalFeces => "#A5D6A7",
            IssueType::CommercialBlight => "#C8E6C9",
            IssueType::AirPollution => "#E8F5E9",
            IssueType::EncampmentWaste => "#43A047",
            IssueType::Other(_) => FALLBACK_COLOR,
        }
    }
}

impl From<String> for IssueType {
    fn from(label: String) -> Self {
        IssueType::KNOWN
            .iter()
            .find(|known| known.label() == label)
            .cloned()
            .unwrap_or(IssueType::Other(label))
    }
}

impl From<&str> for IssueType {
    fn from(label: &str) -> Self {
        IssueType::from(label.to_string())
    }
}

impl From<IssueType> for String {
    fn from(t: IssueType) -> Self {
        match t {
            IssueType::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Date a complaint was reported, kept exactly as the data endpoint sent it.
///
/// Stored records may carry ISO dates, RFC 3339 timestamps, free-form text
/// or nothing at all. The raw value always round-trips; [`ReportedDate::date`]
/// is `None` when it cannot be read as a calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub struct ReportedDate {
    raw: String,
    parsed: Option<NaiveDate>,
}

impl ReportedDate {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.parsed
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// "January 15, 2024"; the raw text when it is not a date.
    pub fn long_form(&self) -> String {
        self.format_or_raw("%B %-d, %Y")
    }

    /// "1/15/2024"; the raw text when it is not a date.
    pub fn short_form(&self) -> String {
        self.format_or_raw("%-m/%-d/%Y")
    }

    fn format_or_raw(&self, fmt: &str) -> String {
        match self.parsed {
            Some(d) => d.format(fmt).to_string(),
            None => self.raw.clone(),
        }
    }

    fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.date_naive()))
            .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
            .or_else(|| NaiveDate::parse_from_str(raw, "%B %d, %Y").ok())
    }
}

impl From<String> for ReportedDate {
    fn from(raw: String) -> Self {
        let parsed = Self::parse(&raw);
        Self { raw, parsed }
    }
}

impl From<Option<String>> for ReportedDate {
    fn from(raw: Option<String>) -> Self {
        raw.map(Self::from).unwrap_or_default()
    }
}

impl From<NaiveDate> for ReportedDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            raw: date.format("%Y-%m-%d").to_string(),
            parsed: Some(date),
        }
    }
}

impl From<ReportedDate> for String {
    fn from(d: ReportedDate) -> Self {
        d.raw
    }
}

impl fmt::Display for ReportedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A single geocoded report. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub issue_type: IssueType,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub date: ReportedDate,
    #[serde(default)]
    pub category: String,
    pub coordinates: Coordinates,
}

impl Complaint {
    #[inline]
    pub fn color(&self) -> &'static str {
        self.issue_type.color()
    }
}

/// Wire shape of the collection on the data endpoint: `{ "complaints": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintCollection {
    pub complaints: Vec<Complaint>,
}

/// Loosely-typed submission accepted by the data endpoint.
///
/// Only `issue_type` and `coordinates` are required; the remaining fields
/// default to empty and a missing or blank `date` becomes the submission
/// day. Any other date text is stored as given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintSubmission {
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub coordinates: Option<[f64; 2]>,
}

impl ComplaintSubmission {
    pub fn validate(self, today: NaiveDate) -> Result<Complaint, ValidationError> {
        let issue_type = match self.issue_type {
            Some(label) if !label.trim().is_empty() => IssueType::from(label),
            _ => return Err(ValidationError::MissingIssueType),
        };
        let coordinates = Coordinates::try_from(
            self.coordinates
                .ok_or(ValidationError::MissingCoordinates)?,
        )?;
        let date = match self.date {
            Some(raw) if !raw.trim().is_empty() => ReportedDate::from(raw),
            _ => ReportedDate::from(today),
        };

        Ok(Complaint {
            issue_type,
            location: self.location,
            description: self.description,
            source: self.source,
            source_links: self.source_links,
            date,
            category: self.category,
            coordinates,
        })
    }
}

/// Identity handle to one complaint inside a store snapshot.
///
/// Two refs are equal only when they point at the same slot of the same
/// snapshot; value-equal complaints in different slots stay distinct.
#[derive(Clone)]
pub struct ComplaintRef {
    set: Arc<[Complaint]>,
    index: usize,
}

impl ComplaintRef {
    /// Returns `None` when `index` is out of bounds.
    pub fn new(set: Arc<[Complaint]>, index: usize) -> Option<Self> {
        if index < set.len() {
            Some(Self { set, index })
        } else {
            None
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn snapshot(&self) -> &Arc<[Complaint]> {
        &self.set
    }

    pub fn is(&self, other: &Complaint) -> bool {
        std::ptr::eq(&self.set[self.index], other)
    }
}

impl Deref for ComplaintRef {
    type Target = Complaint;

    fn deref(&self) -> &Complaint {
        &self.set[self.index]
    }
}

impl PartialEq for ComplaintRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.set, &other.set) && self.index == other.index
    }
}

impl fmt::Debug for ComplaintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplaintRef")
            .field("index", &self.index)
            .field("issue_type", &self.issue_type)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn sample(issue: &str, lat: f64, lon: f64) -> Complaint {
    Complaint {
        issue_type: IssueType::from(issue),
        location: "Palo Alto".to_string(),
        description: format!("{issue} reported"),
        source: "311".to_string(),
        source_links: Vec::new(),
        date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().into(),
        category: "Environment".to_string(),
        coordinates: Coordinates::new(lat, lon).unwrap(),
    }
}
