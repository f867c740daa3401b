//! VIROMEdash: a server-rendered dashboard for viral sequence metadata and a
//! GenBank "self catalogue" of uploaded accession lists.

pub mod catalogue;
pub mod chart;
pub mod config;
pub mod datasets;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod genbank;
pub mod ncbi;
pub mod output;
pub mod table;
pub mod upload;
pub mod web;
