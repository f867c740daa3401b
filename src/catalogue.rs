//! Self catalogue: country, host and collection-year metadata of a set of
//! accessions, aggregated per dimension and merged per accession.
//!
//! [`Catalogue::build`] is pure; [`CatalogueService`] adds the remote fetch.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Accession, MoleculeType, UNKNOWN};
use crate::error::DashError;
use crate::genbank::GbSeq;
use crate::ncbi::GenbankClient;
use crate::table::{CsvTable, FrequencyTable, YearTable};

const COUNTRY_QUALIFIER: &str = "country";
const HOST_QUALIFIER: &str = "host";
const DATE_QUALIFIER: &str = "collection_date";

/// Separator between several values of one dimension in a merged cell.
pub const VALUE_SEPARATOR: &str = " | ";

static YEAR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})$").expect("year pattern is valid"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}$").expect("year-month pattern is valid"));
static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3,9}-\d{4}$").expect("month-year pattern is valid"));
static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2})T").expect("timestamp pattern is valid")
});

const FULL_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%b-%Y", "%d-%B-%Y", "%m/%d/%Y"];

pub fn normalize_country(raw: &str) -> String {
    raw.split(':').next().unwrap_or_default().trim().to_string()
}

pub fn normalize_host(raw: &str) -> String {
    let cut = if raw.contains(';') {
        raw.split(';').next()
    } else {
        raw.split(',').next()
    };
    cut.unwrap_or_default().trim().to_string()
}

/// Reduces a collection date to its year. `None` is the missing sentinel.
pub fn parse_year(raw: &str) -> Option<i32> {
    let value = raw.trim();
    let year = if let Some(captures) = YEAR_ONLY.captures(value) {
        captures[1].parse().ok()
    } else {
        parse_date(value).map(|date| date.year())
    };
    year.filter(|year| (1000..=9999).contains(year))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = ISO_TIMESTAMP
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|date| date.as_str())
        .unwrap_or(value);
    if YEAR_MONTH.is_match(value) {
        NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()
    } else if MONTH_YEAR.is_match(value) {
        NaiveDate::parse_from_str(&format!("01-{value}"), "%d-%b-%Y")
            .or_else(|_| NaiveDate::parse_from_str(&format!("01-{value}"), "%d-%B-%Y"))
            .ok()
    } else {
        FULL_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    }
}

/// Qualifier values of one fetched record and the accessions they belong to.
#[derive(Debug, Clone, Default)]
pub struct RecordValues {
    /// Requested accessions the record answers, or its own primary
    /// accession when it matches none of them.
    pub owners: Vec<Accession>,
    pub countries: Vec<String>,
    pub hosts: Vec<String>,
    pub dates: Vec<Option<i32>>,
}

/// Per-record values in document order, one entry per qualifier occurrence.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<RecordValues>,
}

impl Extraction {
    /// Matches each record to the requested accessions by any of its
    /// identifiers, so a lower-case or GI upload lands on the same row.
    pub fn from_records(requested: &[Accession], records: &[GbSeq]) -> Self {
        let mut extraction = Self::default();
        for record in records {
            let identifiers = record.identifiers();
            let mut owners = Vec::new();
            for accession in requested {
                if identifiers.contains(accession) && !owners.contains(accession) {
                    owners.push(accession.clone());
                }
            }
            if owners.is_empty() {
                let Some(primary) = identifiers.into_iter().next() else {
                    debug!(
                        accession = %record.primary_accession,
                        "skipping record with unusable accession"
                    );
                    continue;
                };
                owners.push(primary);
            }

            extraction.records.push(RecordValues {
                owners,
                countries: record
                    .source_qualifiers(COUNTRY_QUALIFIER)
                    .map(normalize_country)
                    .filter(|country| !country.is_empty())
                    .collect(),
                hosts: record
                    .source_qualifiers(HOST_QUALIFIER)
                    .map(normalize_host)
                    .filter(|host| !host.is_empty())
                    .collect(),
                dates: record
                    .source_qualifiers(DATE_QUALIFIER)
                    .map(parse_year)
                    .collect(),
            });
        }
        extraction
    }

    fn countries(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .flat_map(|record| record.countries.iter().map(String::as_str))
    }

    fn hosts(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .flat_map(|record| record.hosts.iter().map(String::as_str))
    }

    fn dates(&self) -> impl Iterator<Item = Option<i32>> + '_ {
        self.records
            .iter()
            .flat_map(|record| record.dates.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    pub accession: Accession,
    pub countries: String,
    pub hosts: String,
    pub dates: String,
}

/// One row per distinct accession; absent dimensions hold [`UNKNOWN`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedTable {
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn to_table(&self) -> CsvTable {
        let mut table = CsvTable::new(&["Accessions", "Countries", "Hosts", "Dates"]);
        for row in &self.rows {
            table.push_row(vec![
                row.accession.to_string(),
                row.countries.clone(),
                row.hosts.clone(),
                row.dates.clone(),
            ]);
        }
        table
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogueResult {
    pub requested: usize,
    pub countries: FrequencyTable,
    pub hosts: FrequencyTable,
    pub years: YearTable,
    /// Collection dates that could not be reduced to a year.
    pub unparsed_dates: u64,
    pub merged: MergedTable,
    /// Requested accessions the database returned no record for.
    pub unresolved: Vec<Accession>,
}

pub struct Catalogue;

impl Catalogue {
    pub fn build(requested: &[Accession], records: &[GbSeq]) -> CatalogueResult {
        let mut distinct = Vec::new();
        let mut seen = HashSet::new();
        for accession in requested {
            if seen.insert(accession.clone()) {
                distinct.push(accession.clone());
            }
        }
        let extraction = Extraction::from_records(&distinct, records);

        let countries = FrequencyTable::from_values("Countries", extraction.countries());
        let hosts = FrequencyTable::from_values("Hosts", extraction.hosts());
        let years = YearTable::from_years(extraction.dates().flatten());
        let unparsed_dates = extraction.dates().filter(Option::is_none).count() as u64;

        let resolved = extraction
            .records
            .iter()
            .flat_map(|record| record.owners.iter())
            .collect::<HashSet<_>>();
        let unresolved = distinct
            .iter()
            .filter(|accession| !resolved.contains(accession))
            .cloned()
            .collect();

        let merged = merge(&distinct, &extraction);
        CatalogueResult {
            requested: distinct.len(),
            countries,
            hosts,
            years,
            unparsed_dates,
            merged,
            unresolved,
        }
    }
}

/// Requested accessions first, then records that matched none of them.
fn merge(distinct: &[Accession], extraction: &Extraction) -> MergedTable {
    let mut order = distinct.to_vec();
    let mut countries = HashMap::<Accession, Vec<String>>::new();
    let mut hosts = HashMap::<Accession, Vec<String>>::new();
    let mut dates = HashMap::<Accession, Vec<String>>::new();
    for record in &extraction.records {
        for owner in &record.owners {
            if !order.contains(owner) {
                order.push(owner.clone());
            }
            extend_unique(countries.entry(owner.clone()).or_default(), &record.countries);
            extend_unique(hosts.entry(owner.clone()).or_default(), &record.hosts);
            let years = record
                .dates
                .iter()
                .flatten()
                .map(i32::to_string)
                .collect::<Vec<_>>();
            extend_unique(dates.entry(owner.clone()).or_default(), &years);
        }
    }

    let rows = order
        .into_iter()
        .map(|accession| MergedRow {
            countries: cell(countries.get(&accession)),
            hosts: cell(hosts.get(&accession)),
            dates: cell(dates.get(&accession)),
            accession,
        })
        .collect();
    MergedTable { rows }
}

fn extend_unique(values: &mut Vec<String>, new: &[String]) {
    for value in new {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
}

fn cell(values: Option<&Vec<String>>) -> String {
    match values {
        Some(values) if !values.is_empty() => values.join(VALUE_SEPARATOR),
        _ => UNKNOWN.to_string(),
    }
}

/// Fetch-then-build wrapper around [`Catalogue::build`].
pub struct CatalogueService<C: GenbankClient> {
    client: C,
}

impl<C: GenbankClient> CatalogueService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn run(
        &self,
        accessions: &[Accession],
        molecule: MoleculeType,
    ) -> Result<CatalogueResult, DashError> {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for accession in accessions {
            if seen.insert(accession) {
                unique.push(accession.clone());
            }
        }
        info!(
            accessions = unique.len(),
            db = molecule.entrez_db(),
            "building self catalogue"
        );
        let records = self.client.fetch_records(molecule, &unique)?;
        let result = Catalogue::build(accessions, &records);
        info!(
            records = records.len(),
            unresolved = result.unresolved.len(),
            "self catalogue ready"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genbank::{FeatureTable, GbFeature, GbQualifier, Qualifiers, SeqIds};

    fn record(accession: &str, quals: &[(&str, &str)]) -> GbSeq {
        GbSeq {
            primary_accession: accession.to_string(),
            accession_version: Some(format!("{accession}.1")),
            other_seqids: SeqIds::default(),
            organism: None,
            feature_table: FeatureTable {
                features: vec![GbFeature {
                    key: "source".to_string(),
                    quals: Qualifiers {
                        qualifiers: quals
                            .iter()
                            .map(|(name, value)| GbQualifier {
                                name: name.to_string(),
                                value: Some(value.to_string()),
                            })
                            .collect(),
                    },
                }],
            },
        }
    }

    fn acc(value: &str) -> Accession {
        value.parse().unwrap()
    }

    #[test]
    fn country_is_cut_at_colon() {
        assert_eq!(normalize_country("USA: New York, NY"), "USA");
        assert_eq!(normalize_country("Germany"), "Germany");
    }

    #[test]
    fn host_prefers_semicolon_over_comma() {
        assert_eq!(normalize_host("Homo sapiens; female"), "Homo sapiens");
        assert_eq!(normalize_host("Homo sapiens; female, 45"), "Homo sapiens");
        assert_eq!(normalize_host("Gallus gallus, chicken"), "Gallus gallus");
        assert_eq!(normalize_host("Sus scrofa"), "Sus scrofa");
    }

    #[test]
    fn year_from_common_date_shapes() {
        assert_eq!(parse_year("2019-05-02"), Some(2019));
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year("2020-03"), Some(2020));
        assert_eq!(parse_year("12-Mar-2018"), Some(2018));
        assert_eq!(parse_year("Mar-2017"), Some(2017));
        assert_eq!(parse_year("2021-07-15T10:30Z"), Some(2021));
        assert_eq!(parse_year("2016/11/30"), Some(2016));
    }

    #[test]
    fn year_missing_for_unparseable() {
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year("missing"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("2019/2020"), None);
    }

    #[test]
    fn year_reduction_is_idempotent() {
        for raw in ["2019-05-02", "Mar-2017", "2020-03", "1999"] {
            let year = parse_year(raw).unwrap();
            assert_eq!(parse_year(&year.to_string()), Some(year));
        }
    }

    #[test]
    fn merged_table_has_one_row_per_accession() {
        let records = vec![
            record(
                "MN908947",
                &[
                    ("country", "China: Wuhan"),
                    ("host", "Homo sapiens"),
                    ("collection_date", "Dec-2019"),
                ],
            ),
            record(
                "MT020880",
                &[
                    ("country", "USA: WA"),
                    ("country", "USA"),
                    ("country", "Canada"),
                ],
            ),
        ];
        let requested = vec![
            acc("MN908947.3"),
            acc("MT020880"),
            acc("MN908947"),
            acc("XX000001"),
        ];
        let result = Catalogue::build(&requested, &records);

        assert_eq!(result.requested, 3);
        assert_eq!(result.merged.rows.len(), 3);
        let second = &result.merged.rows[1];
        assert_eq!(second.countries, "USA | Canada");
        assert_eq!(second.hosts, UNKNOWN);
        assert_eq!(second.dates, UNKNOWN);
        let missing = &result.merged.rows[2];
        assert_eq!(missing.accession.as_str(), "XX000001");
        assert_eq!(missing.countries, UNKNOWN);
        assert_eq!(result.unresolved, vec![acc("XX000001")]);
    }

    #[test]
    fn lower_case_upload_matches_returned_record() {
        let records = vec![record("QHD43416", &[("country", "China: Wuhan")])];
        let result = Catalogue::build(&[acc("qhd43416.1")], &records);

        assert_eq!(result.requested, 1);
        assert_eq!(result.merged.rows.len(), 1);
        assert_eq!(result.merged.rows[0].accession.as_str(), "QHD43416");
        assert_eq!(result.merged.rows[0].countries, "China");
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn gi_upload_keeps_the_uploaded_id() {
        let mut spike = record("QHD43416", &[("country", "China: Wuhan")]);
        spike.other_seqids.ids = vec![
            "gb|QHD43416.1|".to_string(),
            "gi|1798174254".to_string(),
        ];
        let result = Catalogue::build(&[acc("1798174254")], &[spike]);

        assert_eq!(result.merged.rows.len(), 1);
        let row = &result.merged.rows[0];
        assert_eq!(row.accession.as_str(), "1798174254");
        assert_eq!(row.countries, "China");
        assert!(result.unresolved.is_empty());
        assert_eq!(result.countries.total(), 1);
    }

    #[test]
    fn unrequested_record_gets_its_own_row() {
        let records = vec![
            record("A00001", &[("host", "Sus scrofa")]),
            record("B00002", &[("host", "Gallus gallus")]),
        ];
        let result = Catalogue::build(&[acc("A00001")], &records);
        let ids = result
            .merged
            .rows
            .iter()
            .map(|row| row.accession.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["A00001", "B00002"]);
        assert_eq!(result.merged.rows[1].hosts, "Gallus gallus");
    }

    #[test]
    fn aggregates_count_occurrences_not_accessions() {
        let records = vec![
            record(
                "A00001",
                &[
                    ("country", "USA"),
                    ("country", "USA: CA"),
                    ("collection_date", "n/a"),
                ],
            ),
            record("A00002", &[("collection_date", "2020-01-01")]),
        ];
        let result = Catalogue::build(&[acc("A00001"), acc("A00002")], &records);
        assert_eq!(result.countries.total(), 2);
        assert_eq!(result.countries.rows[0].key, "USA");
        assert_eq!(result.hosts.total(), 0);
        assert_eq!(result.years.total(), 1);
        assert_eq!(result.unparsed_dates, 1);
    }
}
