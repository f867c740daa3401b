use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use viromedash::datasets::{
    ALL_SPECIES, DataStore, MAX_YEAR, TimelineMode, YearRange,
};
use viromedash::domain::MoleculeType;
use viromedash::error::DashError;
use viromedash::table::CsvTable;

fn bundled() -> DataStore {
    DataStore::new(Utf8PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data")))
}

fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, DataStore) {
    let temp = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        fs::write(temp.path().join(name), contents).unwrap();
    }
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, DataStore::new(root))
}

#[test]
fn host_report_sorts_and_truncates() {
    let (_temp, store) = store_with(&[(
        "host-species.csv",
        "Host,Species,Count\n\
         Homo sapiens,Dengue virus 2,12\n\
         Homo sapiens,Zika virus,40.0\n\
         Sus scrofa,Porcine epidemic diarrhea virus,99\n\
         Homo sapiens,Hepatitis B virus,25\n",
    )]);
    let report = store
        .host_report("Homo sapiens", MoleculeType::Protein, 2)
        .unwrap();
    let bars = report.species.bars();
    assert_eq!(
        bars,
        vec![
            ("Zika virus".to_string(), 40),
            ("Hepatitis B virus".to_string(), 25)
        ]
    );
    assert_eq!(report.download.headers, vec!["Host", "Species", "Count"]);
    assert_eq!(report.download.rows.len(), 2);
}

#[test]
fn geography_drops_rows_without_region_and_filters_years() {
    let (_temp, store) = store_with(&[(
        "geography_species_with_dates.csv",
        "Region,Species,Collection_Date,Count\n\
         Europa,Influenza A virus,2010.0,5\n\
         Europa,Influenza A virus,2015.0,7\n\
         Europa,Rabies lyssavirus,2021.0,30\n\
         ,Influenza A virus,2015.0,100\n\
         Asia,Influenza A virus,2015.0,100\n",
    )]);
    let regions = store.region_options().unwrap();
    assert_eq!(regions, vec!["Europa", "Asia"]);

    let bounds = store.geography_bounds(MoleculeType::Protein).unwrap();
    assert_eq!(bounds, YearRange::new(2010, MAX_YEAR).unwrap());

    let range = YearRange::new(2012, 2020).unwrap();
    let report = store
        .geography_report("Europa", MoleculeType::Protein, range, 10)
        .unwrap();
    assert_eq!(report.species.bars(), vec![("Influenza A virus".to_string(), 7)]);
}

#[test]
fn date_download_keeps_filtered_rows() {
    let (_temp, store) = store_with(&[(
        "year_species_nt.csv",
        "Species,Collection_Date,Count\n\
         Zika virus,2015,10\n\
         Zika virus,2016,5\n\
         Dengue virus 2,2016,12\n\
         Dengue virus 2,1999,400\n\
         Dengue virus 2,,3\n",
    )]);
    let range = YearRange::new(2015, 2016).unwrap();
    let report = store
        .date_report(MoleculeType::Nucleotide, range, 5)
        .unwrap();
    assert_eq!(
        report.species.bars(),
        vec![
            ("Zika virus".to_string(), 15),
            ("Dengue virus 2".to_string(), 12)
        ]
    );
    assert_eq!(report.download.rows.len(), 3);
    let reloaded = CsvTable::from_csv(&report.download.to_csv().unwrap()).unwrap();
    assert_eq!(reloaded.headers, report.download.headers);
    assert_eq!(reloaded.rows.len(), report.download.rows.len());
}

#[test]
fn missing_dataset_is_a_read_error() {
    let (_temp, store) = store_with(&[]);
    let err = store.baltimore_report().unwrap_err();
    assert_matches!(err, DashError::DatasetRead { .. });
}

#[test]
fn malformed_count_is_a_parse_error() {
    let (_temp, store) = store_with(&[(
        "host-species.csv",
        "Host,Species,Count\nHomo sapiens,Zika virus,many\n",
    )]);
    let err = store
        .host_report("Homo sapiens", MoleculeType::Protein, 5)
        .unwrap_err();
    assert_matches!(err, DashError::DatasetParse { .. });
}

#[test]
fn species_report_over_bundled_data() {
    let store = bundled();
    let options = store.taxonomy_options().unwrap();
    assert_eq!(options[0], ALL_SPECIES);
    assert!(options.iter().any(|taxon| taxon == "Coronaviridae"));

    let taxa = vec!["Coronaviridae".to_string(), "Flaviviridae".to_string()];
    let cumulative = store
        .species_report(&taxa, MoleculeType::Protein, TimelineMode::Cumulative)
        .unwrap();
    assert_eq!(cumulative.timeline.len(), 2);
    assert_eq!(cumulative.timeline[0].name, "Coronaviridae");
    let points = &cumulative.timeline[0].points;
    assert!(points.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert!(points.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    assert!(cumulative.total_sequences > 0);
    assert!(cumulative.countries.rows.len() <= 10);
    assert_eq!(
        cumulative.download.headers,
        vec!["Taxonomy", "Year", "Cumulative_Count", "Count"]
    );

    let annual = store
        .species_report(&taxa, MoleculeType::Protein, TimelineMode::OneYear)
        .unwrap();
    let annual_sum = annual.timeline[0]
        .points
        .iter()
        .map(|(_, count)| count)
        .sum::<u64>();
    let last_cumulative = points.last().map(|(_, value)| *value).unwrap();
    assert_eq!(annual_sum, last_cumulative);
}

#[test]
fn baltimore_classes_sum_species_counts() {
    let report = bundled().baltimore_report().unwrap();
    let species_total = report.rows.iter().map(|row| row.count).sum::<u64>();
    assert_eq!(report.classes.total(), species_total);
    assert_eq!(report.download.rows.len(), report.rows.len());
}
