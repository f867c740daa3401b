//! Pre-aggregated CSV datasets behind the browsing pages.
//!
//! Files are read from the data directory on every query; nothing is cached.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;

use camino::Utf8PathBuf;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::domain::MoleculeType;
use crate::error::DashError;
use crate::table::{CsvTable, FrequencyTable};

pub const ALL_SPECIES: &str = "All Species";
pub const DEFAULT_HOST: &str = "Homo sapiens";
pub const DEFAULT_REGION: &str = "Europa";
/// Upper bound of every collection-year range selector.
pub const MAX_YEAR: i32 = 2022;
pub const TOP_CHOICES: [usize; 3] = [5, 10, 20];
pub const DEFAULT_TOP: usize = 10;
/// Bars shown in the species page breakdown charts.
pub const BREAKDOWN_TOP: usize = 10;

const SPECIES_YEAR_FILE: &str = "species_year_nt_prot.csv";
const DESCRIPTIVE_FILE: &str = "descriptive-taxonomy_x2.csv";
const COUNTRY_FILE: &str = "country-cumulative-taxonomy.csv";
const HOST_TAXONOMY_FILE: &str = "host-taxonomy.csv";
const ISOLATION_FILE: &str = "isolation_source-taxonomy.csv";
const BALTIMORE_FILE: &str = "sunburst_500.csv";

fn host_species_file(molecule: MoleculeType) -> &'static str {
    match molecule {
        MoleculeType::Protein => "host-species.csv",
        MoleculeType::Nucleotide => "host-species-nt.csv",
    }
}

fn geography_file(molecule: MoleculeType) -> &'static str {
    match molecule {
        MoleculeType::Protein => "geography_species_with_dates.csv",
        MoleculeType::Nucleotide => "geography_species_with_dates-nt.csv",
    }
}

fn year_species_file(molecule: MoleculeType) -> &'static str {
    match molecule {
        MoleculeType::Protein => "year_species_aa.csv",
        MoleculeType::Nucleotide => "year_species_nt.csv",
    }
}

// Exported frames store integers as floats ("12.0") and leave gaps empty.
fn parse_whole(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("not a number: {raw}"))?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(format!("not a whole number: {raw}"));
    }
    Ok(Some(value))
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match parse_whole(&raw).map_err(serde::de::Error::custom)? {
        Some(value) if value >= 0.0 => Ok(value as u64),
        Some(_) => Err(serde::de::Error::custom(format!("negative count: {raw}"))),
        None => Ok(0),
    }
}

fn year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    optional_year(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing year"))
}

fn optional_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(parse_whole(&raw)
        .map_err(serde::de::Error::custom)?
        .map(|value| value as i32))
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesYearRow {
    #[serde(rename = "Taxonomy")]
    pub taxonomy: String,
    #[serde(rename = "Year", deserialize_with = "year")]
    pub year: i32,
    #[serde(rename = "Cumulative_collection_prot", deserialize_with = "count")]
    pub cumulative_prot: u64,
    #[serde(rename = "Count_collection_prot", deserialize_with = "count")]
    pub count_prot: u64,
    #[serde(rename = "Cumulative_collection_nt", deserialize_with = "count")]
    pub cumulative_nt: u64,
    #[serde(rename = "Count_collection_nt", deserialize_with = "count")]
    pub count_nt: u64,
}

impl SpeciesYearRow {
    fn values(&self, molecule: MoleculeType) -> (u64, u64) {
        match molecule {
            MoleculeType::Protein => (self.count_prot, self.cumulative_prot),
            MoleculeType::Nucleotide => (self.count_nt, self.cumulative_nt),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyTotalRow {
    #[serde(rename = "Taxonomy")]
    pub taxonomy: String,
    #[serde(rename = "Count_x", deserialize_with = "count")]
    pub protein: u64,
    #[serde(rename = "Count_y", deserialize_with = "count")]
    pub nucleotide: u64,
}

/// A `Taxonomy,<dimension>,Count` row of the country, host and isolation
/// source breakdowns.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyBreakdownRow {
    #[serde(rename = "Taxonomy")]
    pub taxonomy: String,
    #[serde(alias = "Country", alias = "Host", alias = "Isolation_Source")]
    pub key: String,
    #[serde(rename = "Count", deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSpeciesRow {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Count", deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeographyRow {
    #[serde(rename = "Region", default)]
    pub region: Option<String>,
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Collection_Date", deserialize_with = "optional_year")]
    pub collection_year: Option<i32>,
    #[serde(rename = "Count", deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearSpeciesRow {
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Collection_Date", deserialize_with = "optional_year")]
    pub collection_year: Option<i32>,
    #[serde(rename = "Count", deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaltimoreRow {
    #[serde(rename = "baltimore")]
    pub baltimore: String,
    #[serde(rename = "Family")]
    pub family: String,
    #[serde(rename = "Genus")]
    pub genus: String,
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Count", deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum TimelineMode {
    #[default]
    #[serde(rename = "cumulative")]
    Cumulative,
    #[serde(rename = "one-year")]
    OneYear,
}

impl TimelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineMode::Cumulative => "cumulative",
            TimelineMode::OneYear => "one-year",
        }
    }
}

/// Inclusive collection-year interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    pub fn new(from: i32, to: i32) -> Result<Self, DashError> {
        if from > to {
            return Err(DashError::InvalidQuery(format!(
                "year range {from}-{to} is reversed"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }
}

pub fn validate_top(top: usize) -> Result<usize, DashError> {
    if TOP_CHOICES.contains(&top) {
        Ok(top)
    } else {
        Err(DashError::InvalidQuery(format!(
            "top must be one of 5, 10 or 20, got {top}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(i32, u64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesReport {
    pub total_sequences: u64,
    pub timeline: Vec<Series>,
    pub countries: FrequencyTable,
    pub hosts: FrequencyTable,
    pub isolation_sources: FrequencyTable,
    pub download: CsvTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    pub species: FrequencyTable,
    pub download: CsvTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaltimoreReport {
    pub classes: FrequencyTable,
    pub rows: Vec<BaltimoreRow>,
    pub download: CsvTable,
}

#[derive(Debug, Clone)]
pub struct DataStore {
    root: Utf8PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_rows<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, DashError> {
        let path = self.root.join(file);
        let handle = File::open(&path).map_err(|err| DashError::DatasetRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(handle);
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(|err| DashError::DatasetParse {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        debug!(path = %path, rows = rows.len(), "dataset loaded");
        Ok(rows)
    }

    /// Taxa of the timeline dataset in file order, [`ALL_SPECIES`] first.
    pub fn taxonomy_options(&self) -> Result<Vec<String>, DashError> {
        let rows = self.read_rows::<SpeciesYearRow>(SPECIES_YEAR_FILE)?;
        let mut options = vec![ALL_SPECIES.to_string()];
        options.extend(rows.into_iter().map(|row| row.taxonomy));
        Ok(unique(options))
    }

    pub fn species_report(
        &self,
        taxa: &[String],
        molecule: MoleculeType,
        mode: TimelineMode,
    ) -> Result<SpeciesReport, DashError> {
        let selected = taxa.iter().map(String::as_str).collect::<HashSet<_>>();

        let total_sequences = self
            .read_rows::<TaxonomyTotalRow>(DESCRIPTIVE_FILE)?
            .into_iter()
            .filter(|row| selected.contains(row.taxonomy.as_str()))
            .map(|row| match molecule {
                MoleculeType::Protein => row.protein,
                MoleculeType::Nucleotide => row.nucleotide,
            })
            .sum();

        let timeline_rows = self
            .read_rows::<SpeciesYearRow>(SPECIES_YEAR_FILE)?
            .into_iter()
            .filter(|row| selected.contains(row.taxonomy.as_str()))
            .collect::<Vec<_>>();

        let mut download = CsvTable::new(&["Taxonomy", "Year", "Cumulative_Count", "Count"]);
        let mut grouped = BTreeMap::<&str, Vec<(i32, u64)>>::new();
        for row in &timeline_rows {
            let (annual, cumulative) = row.values(molecule);
            download.push_row(vec![
                row.taxonomy.clone(),
                row.year.to_string(),
                cumulative.to_string(),
                annual.to_string(),
            ]);
            let value = match mode {
                TimelineMode::Cumulative => cumulative,
                TimelineMode::OneYear => annual,
            };
            grouped
                .entry(row.taxonomy.as_str())
                .or_default()
                .push((row.year, value));
        }
        let timeline = unique(taxa.to_vec())
            .into_iter()
            .filter_map(|name| {
                let mut points = grouped.remove(name.as_str())?;
                points.sort_by_key(|(year, _)| *year);
                Some(Series { name, points })
            })
            .collect();

        Ok(SpeciesReport {
            total_sequences,
            timeline,
            countries: self.breakdown(COUNTRY_FILE, "Country", &selected)?,
            hosts: self.breakdown(HOST_TAXONOMY_FILE, "Host", &selected)?,
            isolation_sources: self.breakdown(ISOLATION_FILE, "Isolation_Source", &selected)?,
            download,
        })
    }

    fn breakdown(
        &self,
        file: &str,
        column: &str,
        selected: &HashSet<&str>,
    ) -> Result<FrequencyTable, DashError> {
        let rows = self.read_rows::<TaxonomyBreakdownRow>(file)?;
        let table = FrequencyTable::from_counts(
            column,
            rows.into_iter()
                .filter(|row| selected.contains(row.taxonomy.as_str()))
                .map(|row| (row.key, row.count)),
        );
        Ok(table.top(BREAKDOWN_TOP))
    }

    pub fn host_options(&self) -> Result<Vec<String>, DashError> {
        let rows = self.read_rows::<HostSpeciesRow>(host_species_file(MoleculeType::Protein))?;
        Ok(unique(rows.into_iter().map(|row| row.host).collect()))
    }

    pub fn host_report(
        &self,
        host: &str,
        molecule: MoleculeType,
        top: usize,
    ) -> Result<RangeReport, DashError> {
        let rows = self.read_rows::<HostSpeciesRow>(host_species_file(molecule))?;
        let species = FrequencyTable::from_counts(
            "Species",
            rows.into_iter()
                .filter(|row| row.host == host)
                .map(|row| (row.species, row.count)),
        )
        .top(top);

        let mut download = CsvTable::new(&["Host", "Species", "Count"]);
        for row in &species.rows {
            download.push_row(vec![host.to_string(), row.key.clone(), row.count.to_string()]);
        }
        Ok(RangeReport { species, download })
    }

    pub fn region_options(&self) -> Result<Vec<String>, DashError> {
        let rows = self.read_rows::<GeographyRow>(geography_file(MoleculeType::Protein))?;
        Ok(unique(rows.into_iter().filter_map(region_of).collect()))
    }

    /// Smallest collection year of the geography dataset and [`MAX_YEAR`].
    pub fn geography_bounds(&self, molecule: MoleculeType) -> Result<YearRange, DashError> {
        let rows = self.read_rows::<GeographyRow>(geography_file(molecule))?;
        bounds(rows.iter().filter_map(|row| row.collection_year))
    }

    pub fn geography_report(
        &self,
        region: &str,
        molecule: MoleculeType,
        range: YearRange,
        top: usize,
    ) -> Result<RangeReport, DashError> {
        let rows = self.read_rows::<GeographyRow>(geography_file(molecule))?;
        let in_range = rows
            .into_iter()
            .filter(|row| row.region.as_deref().map(str::trim) == Some(region))
            .filter(|row| row.collection_year.is_some_and(|year| range.contains(year)))
            .collect::<Vec<_>>();
        let species = FrequencyTable::from_counts(
            "Species",
            in_range
                .iter()
                .map(|row| (row.species.clone(), row.count)),
        )
        .top(top);

        let mut download = CsvTable::new(&["Region", "Species", "Count"]);
        for row in &species.rows {
            download.push_row(vec![
                region.to_string(),
                row.key.clone(),
                row.count.to_string(),
            ]);
        }
        Ok(RangeReport { species, download })
    }

    pub fn date_bounds(&self, molecule: MoleculeType) -> Result<YearRange, DashError> {
        let rows = self.read_rows::<YearSpeciesRow>(year_species_file(molecule))?;
        bounds(rows.iter().filter_map(|row| row.collection_year))
    }

    /// Top species collected within `range`; the download holds the
    /// range-filtered rows before grouping.
    pub fn date_report(
        &self,
        molecule: MoleculeType,
        range: YearRange,
        top: usize,
    ) -> Result<RangeReport, DashError> {
        let rows = self.read_rows::<YearSpeciesRow>(year_species_file(molecule))?;
        let mut download = CsvTable::new(&["Species", "Collection_Date", "Count"]);
        let mut counts = Vec::new();
        for row in rows {
            let Some(year) = row.collection_year.filter(|year| range.contains(*year)) else {
                continue;
            };
            download.push_row(vec![
                row.species.clone(),
                year.to_string(),
                row.count.to_string(),
            ]);
            counts.push((row.species, row.count));
        }
        let species = FrequencyTable::from_counts("Species", counts).top(top);
        Ok(RangeReport { species, download })
    }

    pub fn baltimore_report(&self) -> Result<BaltimoreReport, DashError> {
        let rows = self.read_rows::<BaltimoreRow>(BALTIMORE_FILE)?;
        let classes = FrequencyTable::from_counts(
            "Baltimore",
            rows.iter().map(|row| (row.baltimore.clone(), row.count)),
        );
        let mut download = CsvTable::new(&["baltimore", "Family", "Genus", "Species", "Count"]);
        for row in &rows {
            download.push_row(vec![
                row.baltimore.clone(),
                row.family.clone(),
                row.genus.clone(),
                row.species.clone(),
                row.count.to_string(),
            ]);
        }
        Ok(BaltimoreReport {
            classes,
            rows,
            download,
        })
    }
}

fn region_of(row: GeographyRow) -> Option<String> {
    row.region
        .map(|region| region.trim().to_string())
        .filter(|region| !region.is_empty())
}

fn bounds(years: impl Iterator<Item = i32>) -> Result<YearRange, DashError> {
    let min = years.min().unwrap_or(MAX_YEAR).min(MAX_YEAR);
    YearRange::new(min, MAX_YEAR)
}

fn unique(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_accept_float_exports() {
        assert_eq!(parse_whole("12"), Ok(Some(12.0)));
        assert_eq!(parse_whole("2019.0"), Ok(Some(2019.0)));
        assert_eq!(parse_whole(""), Ok(None));
        assert_eq!(parse_whole("nan"), Ok(None));
        assert!(parse_whole("2019.5").is_err());
        assert!(parse_whole("abc").is_err());
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(YearRange::new(2020, 2019).is_err());
        let range = YearRange::new(2010, 2012).unwrap();
        assert!(range.contains(2010));
        assert!(range.contains(2012));
        assert!(!range.contains(2013));
    }

    #[test]
    fn top_is_limited_to_choices() {
        assert_eq!(validate_top(20).unwrap(), 20);
        assert!(validate_top(7).is_err());
    }

    #[test]
    fn bounds_cap_at_max_year() {
        let range = bounds([1990, 1985, 2021].into_iter()).unwrap();
        assert_eq!(range, YearRange { from: 1985, to: MAX_YEAR });
        let empty = bounds(std::iter::empty()).unwrap();
        assert_eq!(empty.from, MAX_YEAR);
    }
}
