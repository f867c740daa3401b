use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DashError;

/// Placeholder for absent or unparseable metadata.
pub const UNKNOWN: &str = "Unknown";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MoleculeType {
    Nucleotide,
    #[default]
    Protein,
}

impl MoleculeType {
    /// Entrez database queried for this molecule type.
    pub fn entrez_db(&self) -> &'static str {
        match self {
            MoleculeType::Nucleotide => "nuccore",
            MoleculeType::Protein => "protein",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoleculeType::Nucleotide => "Nucleotide",
            MoleculeType::Protein => "Protein",
        }
    }

    pub fn all() -> [MoleculeType; 2] {
        [MoleculeType::Nucleotide, MoleculeType::Protein]
    }
}

impl fmt::Display for MoleculeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoleculeType::Nucleotide => write!(f, "nucleotide"),
            MoleculeType::Protein => write!(f, "protein"),
        }
    }
}

impl FromStr for MoleculeType {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nucleotide" | "nuccore" | "nt" => Ok(MoleculeType::Nucleotide),
            "protein" | "aa" | "prot" => Ok(MoleculeType::Protein),
            _ => Err(DashError::InvalidMoleculeType(value.to_string())),
        }
    }
}

/// A sequence accession without its version suffix, upper-cased
/// (`mn908947.3` → `MN908947`). GI numbers are kept as digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_matches(|ch: char| ch == '"' || ch == '\'').trim();
        let base = trimmed.split('.').next().unwrap_or_default();
        let is_valid =
            !base.is_empty() && base.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !is_valid {
            return Err(DashError::InvalidAccession(value.to_string()));
        }
        Ok(Self(base.to_ascii_uppercase()))
    }
}

/// How an uploaded file is read, decided from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Csv,
    Text,
    Fasta,
    Other,
}

impl UploadKind {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let extension = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
        if lower.contains("csv") {
            UploadKind::Csv
        } else if lower.contains("txt") {
            UploadKind::Text
        } else if lower.contains("fasta") || matches!(extension, "fa" | "faa" | "fna" | "fas") {
            UploadKind::Fasta
        } else {
            UploadKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_strips_version() {
        let acc: Accession = "MN908947.3".parse().unwrap();
        assert_eq!(acc.as_str(), "MN908947");
    }

    #[test]
    fn parse_accession_keeps_refseq_underscore() {
        let acc: Accession = " NC_045512.2 ".parse().unwrap();
        assert_eq!(acc.as_str(), "NC_045512");
    }

    #[test]
    fn parse_accession_upper_cases() {
        let acc: Accession = "qhd43416.1".parse().unwrap();
        assert_eq!(acc, "QHD43416".parse().unwrap());
        assert_eq!(acc.as_str(), "QHD43416");
    }

    #[test]
    fn parse_accession_invalid() {
        let err = "MN 908947".parse::<Accession>().unwrap_err();
        assert_matches!(err, DashError::InvalidAccession(_));
        let err = "".parse::<Accession>().unwrap_err();
        assert_matches!(err, DashError::InvalidAccession(_));
    }

    #[test]
    fn molecule_type_routes_to_entrez_db() {
        let nt: MoleculeType = "Nucleotide".parse().unwrap();
        assert_eq!(nt.entrez_db(), "nuccore");
        assert_eq!(MoleculeType::default().entrez_db(), "protein");
        assert_matches!(
            "rna".parse::<MoleculeType>(),
            Err(DashError::InvalidMoleculeType(_))
        );
    }

    #[test]
    fn upload_kind_from_name() {
        assert_eq!(UploadKind::from_file_name("ids.CSV"), UploadKind::Csv);
        assert_eq!(UploadKind::from_file_name("list.txt"), UploadKind::Text);
        assert_eq!(UploadKind::from_file_name("seqs.fasta"), UploadKind::Fasta);
        assert_eq!(UploadKind::from_file_name("seqs.faa"), UploadKind::Fasta);
        assert_eq!(UploadKind::from_file_name("sequence.gb"), UploadKind::Other);
    }
}
