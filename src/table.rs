use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::DashError;

/// Column separator of every CSV download.
pub const EXPORT_DELIMITER: u8 = b';';

/// Headers plus string cells; the shape every download goes through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| header.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> Result<String, DashError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(EXPORT_DELIMITER)
            .from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|err| DashError::Csv(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| DashError::Csv(err.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| DashError::Csv(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| DashError::Csv(err.to_string()))
    }

    pub fn from_csv(text: &str) -> Result<Self, DashError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(EXPORT_DELIMITER)
            .from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .map_err(|err| DashError::Csv(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|record| record.map(|record| record.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()
            .map_err(|err| DashError::Csv(err.to_string()))?;
        Ok(Self { headers, rows })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyRow {
    pub key: String,
    pub count: u64,
}

/// Counts per distinct key, largest first; ties ordered by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    pub column: String,
    pub rows: Vec<FrequencyRow>,
}

impl FrequencyTable {
    pub fn from_values<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_counts(
            column,
            values
                .into_iter()
                .map(|value| (value.as_ref().to_string(), 1)),
        )
    }

    /// Sums the counts of repeated keys.
    pub fn from_counts<I>(column: &str, counts: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut grouped = BTreeMap::<String, u64>::new();
        for (key, count) in counts {
            *grouped.entry(key).or_default() += count;
        }
        let mut rows = grouped
            .into_iter()
            .map(|(key, count)| FrequencyRow { key, count })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        Self {
            column: column.to_string(),
            rows,
        }
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|row| row.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn top(&self, n: usize) -> Self {
        Self {
            column: self.column.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn bars(&self) -> Vec<(String, u64)> {
        self.rows
            .iter()
            .map(|row| (row.key.clone(), row.count))
            .collect()
    }

    pub fn to_table(&self) -> CsvTable {
        let mut table = CsvTable::new(&[self.column.as_str(), "Count"]);
        for row in &self.rows {
            table.push_row(vec![row.key.clone(), row.count.to_string()]);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRow {
    pub year: i32,
    pub count: u64,
    pub cumulative: u64,
}

/// Counts per collection year in ascending year order with a running total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearTable {
    pub rows: Vec<YearRow>,
}

impl YearTable {
    pub fn from_years<I>(years: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        let mut grouped = BTreeMap::<i32, u64>::new();
        for year in years {
            *grouped.entry(year).or_default() += 1;
        }
        let mut cumulative = 0;
        let rows = grouped
            .into_iter()
            .map(|(year, count)| {
                cumulative += count;
                YearRow {
                    year,
                    count,
                    cumulative,
                }
            })
            .collect();
        Self { rows }
    }

    pub fn total(&self) -> u64 {
        self.rows.iter().map(|row| row.count).sum()
    }

    pub fn to_table(&self) -> CsvTable {
        let mut table = CsvTable::new(&["Dates", "Count", "Cumsum"]);
        for row in &self.rows {
            table.push_row(vec![
                row.year.to_string(),
                row.count.to_string(),
                row.cumulative.to_string(),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_orders_by_count_then_key() {
        let table = FrequencyTable::from_values(
            "Hosts",
            ["Sus scrofa", "Homo sapiens", "Homo sapiens", "Bos taurus"],
        );
        let keys = table
            .rows
            .iter()
            .map(|row| row.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["Homo sapiens", "Bos taurus", "Sus scrofa"]);
        assert_eq!(table.total(), 4);
        assert_eq!(table.top(1).rows.len(), 1);
    }

    #[test]
    fn year_table_is_cumulative() {
        let table = YearTable::from_years([2021, 2019, 2021, 2020]);
        let rows = table
            .rows
            .iter()
            .map(|row| (row.year, row.count, row.cumulative))
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![(2019, 1, 1), (2020, 1, 2), (2021, 2, 4)]);
    }

    #[test]
    fn csv_uses_semicolons_and_quotes() {
        let mut table = CsvTable::new(&["Countries", "Count"]);
        table.push_row(vec!["Korea; South".to_string(), "3".to_string()]);
        let text = table.to_csv().unwrap();
        assert_eq!(text, "Countries;Count\n\"Korea; South\";3\n");
        assert_eq!(CsvTable::from_csv(&text).unwrap(), table);
    }
}
