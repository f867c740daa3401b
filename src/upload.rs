use crate::domain::{Accession, UploadKind};
use crate::error::DashError;

/// Database tags that precede the accession in pipe-delimited FASTA ids.
const FASTA_DB_TAGS: &[&str] = &["gb", "emb", "dbj", "ref", "sp", "tr", "pdb", "tpg", "tpe"];

pub fn parse_upload(file_name: &str, bytes: &[u8]) -> Result<Vec<Accession>, DashError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| DashError::UploadParse(format!("{file_name} is not UTF-8: {err}")))?;
    let text = text.trim_start_matches('\u{feff}');
    let accessions = match UploadKind::from_file_name(file_name) {
        UploadKind::Fasta => parse_fasta_ids(text)?,
        UploadKind::Text => parse_accession_list(text)?,
        UploadKind::Csv | UploadKind::Other => parse_accession_csv(text)?,
    };
    if accessions.is_empty() {
        return Err(DashError::UploadParse(format!("{file_name} contains no accessions")));
    }
    Ok(accessions)
}

/// Headerless CSV; the first field of every record is an accession.
pub fn parse_accession_csv(text: &str) -> Result<Vec<Accession>, DashError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut accessions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|err| DashError::UploadParse(format!("row {}: {err}", index + 1)))?;
        let Some(field) = record.get(0).filter(|field| !field.is_empty()) else {
            continue;
        };
        let accession = field
            .parse::<Accession>()
            .map_err(|err| DashError::UploadParse(format!("row {}: {err}", index + 1)))?;
        accessions.push(accession);
    }
    Ok(accessions)
}

/// One accession per line; anything after a comma is ignored.
pub fn parse_accession_list(text: &str) -> Result<Vec<Accession>, DashError> {
    let mut accessions = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let field = line.split(',').next().unwrap_or_default().trim();
        if field.is_empty() {
            continue;
        }
        let accession = field
            .parse::<Accession>()
            .map_err(|err| DashError::UploadParse(format!("line {}: {err}", index + 1)))?;
        accessions.push(accession);
    }
    Ok(accessions)
}

pub fn parse_fasta_ids(text: &str) -> Result<Vec<Accession>, DashError> {
    let mut accessions = Vec::new();
    let mut saw_sequence_line = false;
    for (index, line) in text.lines().enumerate() {
        let Some(header) = line.strip_prefix('>') else {
            saw_sequence_line |= !line.trim().is_empty();
            continue;
        };
        let id = fasta_record_id(header);
        let accession = id
            .parse::<Accession>()
            .map_err(|err| DashError::UploadParse(format!("line {}: {err}", index + 1)))?;
        accessions.push(accession);
    }
    if accessions.is_empty() && saw_sequence_line {
        return Err(DashError::UploadParse("no FASTA headers found".to_string()));
    }
    Ok(accessions)
}

pub fn fasta_record_id(header: &str) -> &str {
    let id = header.split_whitespace().next().unwrap_or_default();
    if !id.contains('|') {
        return id;
    }
    let parts = id.split('|').collect::<Vec<_>>();
    parts
        .windows(2)
        .find(|pair| FASTA_DB_TAGS.contains(&pair[0]) && !pair[1].is_empty())
        .map(|pair| pair[1])
        .unwrap_or_else(|| parts.iter().find(|part| !part.is_empty()).copied().unwrap_or(id))
}
