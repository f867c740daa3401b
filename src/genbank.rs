//! GenBank records as returned by Entrez `efetch` with `rettype=gb&retmode=xml`.
//!
//! Only the parts of the GBSeq document the catalogue reads are modelled;
//! every other element is skipped by the deserializer.

use serde::Deserialize;

use crate::domain::Accession;
use crate::error::DashError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GbSet {
    #[serde(rename = "GBSeq", default)]
    pub records: Vec<GbSeq>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbSeq {
    #[serde(rename = "GBSeq_primary-accession")]
    pub primary_accession: String,
    #[serde(rename = "GBSeq_accession-version", default)]
    pub accession_version: Option<String>,
    #[serde(rename = "GBSeq_other-seqids", default)]
    pub other_seqids: SeqIds,
    #[serde(rename = "GBSeq_organism", default)]
    pub organism: Option<String>,
    #[serde(rename = "GBSeq_feature-table", default)]
    pub feature_table: FeatureTable,
}

/// `db|accession|name` style identifiers, e.g. `gb|QHD43416.1|`, `gi|1798174254`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeqIds {
    #[serde(rename = "GBSeqid", default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureTable {
    #[serde(rename = "GBFeature", default)]
    pub features: Vec<GbFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbFeature {
    #[serde(rename = "GBFeature_key")]
    pub key: String,
    #[serde(rename = "GBFeature_quals", default)]
    pub quals: Qualifiers,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Qualifiers {
    #[serde(rename = "GBQualifier", default)]
    pub qualifiers: Vec<GbQualifier>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbQualifier {
    #[serde(rename = "GBQualifier_name")]
    pub name: String,
    #[serde(rename = "GBQualifier_value", default)]
    pub value: Option<String>,
}

impl GbSeq {
    /// Every accession the record can be requested by: the primary and
    /// versioned accessions, then the ids listed in the other seqids.
    pub fn identifiers(&self) -> Vec<Accession> {
        let seqid_tokens = self
            .other_seqids
            .ids
            .iter()
            .flat_map(|seqid| seqid.split('|').skip(1));
        let mut identifiers = Vec::new();
        let candidates = std::iter::once(self.primary_accession.as_str())
            .chain(self.accession_version.as_deref())
            .chain(seqid_tokens);
        for candidate in candidates {
            if candidate.trim().is_empty() {
                continue;
            }
            if let Ok(accession) = candidate.parse::<Accession>()
                && !identifiers.contains(&accession)
            {
                identifiers.push(accession);
            }
        }
        identifiers
    }

    /// Values of `name` across every `source` feature, in document order.
    pub fn source_qualifiers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.feature_table
            .features
            .iter()
            .filter(|feature| feature.key == "source")
            .flat_map(|feature| feature.quals.qualifiers.iter())
            .filter(move |qualifier| qualifier.name == name)
            .filter_map(|qualifier| qualifier.value.as_deref())
    }
}

pub fn parse_gbset(xml: &str) -> Result<Vec<GbSeq>, DashError> {
    if xml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let set: GbSet =
        quick_xml::de::from_str(xml).map_err(|err| DashError::GenbankParse(err.to_string()))?;
    Ok(set.records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE GBSet PUBLIC "-//NCBI//NCBI GBSeq/EN" "https://www.ncbi.nlm.nih.gov/dtd/NCBI_GBSeq.dtd">
<GBSet>
  <GBSeq>
    <GBSeq_locus>QHD43416</GBSeq_locus>
    <GBSeq_length>1273</GBSeq_length>
    <GBSeq_primary-accession>QHD43416</GBSeq_primary-accession>
    <GBSeq_accession-version>QHD43416.1</GBSeq_accession-version>
    <GBSeq_other-seqids>
      <GBSeqid>gb|QHD43416.1|</GBSeqid>
      <GBSeqid>gi|1798174254</GBSeqid>
    </GBSeq_other-seqids>
    <GBSeq_organism>Severe acute respiratory syndrome coronavirus 2</GBSeq_organism>
    <GBSeq_feature-table>
      <GBFeature>
        <GBFeature_key>source</GBFeature_key>
        <GBFeature_location>1..1273</GBFeature_location>
        <GBFeature_quals>
          <GBQualifier>
            <GBQualifier_name>host</GBQualifier_name>
            <GBQualifier_value>Homo sapiens</GBQualifier_value>
          </GBQualifier>
          <GBQualifier>
            <GBQualifier_name>country</GBQualifier_name>
            <GBQualifier_value>China: Wuhan</GBQualifier_value>
          </GBQualifier>
          <GBQualifier>
            <GBQualifier_name>environmental_sample</GBQualifier_name>
          </GBQualifier>
        </GBFeature_quals>
      </GBFeature>
      <GBFeature>
        <GBFeature_key>Protein</GBFeature_key>
        <GBFeature_quals>
          <GBQualifier>
            <GBQualifier_name>country</GBQualifier_name>
            <GBQualifier_value>ignored</GBQualifier_value>
          </GBQualifier>
        </GBFeature_quals>
      </GBFeature>
    </GBSeq_feature-table>
  </GBSeq>
</GBSet>"#;

    #[test]
    fn parses_source_qualifiers_only() {
        let records = parse_gbset(RECORD).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.primary_accession, "QHD43416");
        assert_eq!(record.accession_version.as_deref(), Some("QHD43416.1"));
        assert_eq!(
            record.source_qualifiers("country").collect::<Vec<_>>(),
            vec!["China: Wuhan"]
        );
        assert_eq!(
            record.source_qualifiers("host").collect::<Vec<_>>(),
            vec!["Homo sapiens"]
        );
        assert_eq!(record.source_qualifiers("collection_date").count(), 0);
        assert_eq!(record.source_qualifiers("environmental_sample").count(), 0);
    }

    #[test]
    fn identifiers_include_gi_number() {
        let records = parse_gbset(RECORD).unwrap();
        let ids = records[0]
            .identifiers()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["QHD43416", "1798174254"]);
    }

    #[test]
    fn empty_body_is_empty_set() {
        assert!(parse_gbset("  \n").unwrap().is_empty());
        assert!(parse_gbset("<GBSet></GBSet>").unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_is_error() {
        assert!(parse_gbset("<GBSet><GBSeq>").is_err());
    }
}
