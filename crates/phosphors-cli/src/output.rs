use phosphors_core::profile::residue_of;
use phosphors_core::scoring::Localization;
use rayon::prelude::*;

use crate::runner::Runner;

/// Localization of one peptide-spectrum match, with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedMatch {
    pub file: String,
    pub title: String,
    pub sequence: String,
    /// Modified peptide as given in the query
    pub peptide: String,
    pub localization: Localization,
}

/// Everything localized from a set of query files
#[derive(Default)]
pub struct LocalizationResults {
    pub matches: Vec<LocalizedMatch>,
    pub failed: usize,
}

impl Runner {
    /// One record per candidate site of a localized match
    pub fn serialize_sites(&self, localized: &LocalizedMatch) -> Vec<csv::ByteRecord> {
        let best = localized.localization.best_site().map(|(site, _)| site);
        let residues = localized.sequence.as_bytes();
        localized
            .localization
            .sites
            .iter()
            .map(|(&site, &score)| {
                let residue = residues
                    .get(residue_of(site, residues.len()).saturating_sub(1))
                    .copied()
                    .unwrap_or(b'X');
                let mut record = csv::ByteRecord::new();
                record.push_field(localized.file.as_bytes());
                record.push_field(localized.title.as_bytes());
                record.push_field(localized.peptide.as_bytes());
                record.push_field(itoa::Buffer::new().format(site).as_bytes());
                record.push_field(&[residue]);
                record.push_field(ryu::Buffer::new().format(score).as_bytes());
                record.push_field(if best == Some(site) { b"1" } else { b"0" });
                record
            })
            .collect()
    }

    /// Write site scores as TSV. Returns where they went.
    pub fn write_sites(&self, matches: &[LocalizedMatch]) -> anyhow::Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        let csv_headers = vec![
            "filename",
            "title",
            "peptide",
            "site",
            "residue",
            "site_probability",
            "best_site",
        ];

        let headers = csv::ByteRecord::from(csv_headers);

        wtr.write_byte_record(&headers)?;
        for record in matches
            .par_iter()
            .flat_map(|localized| self.serialize_sites(localized))
            .collect::<Vec<_>>()
        {
            wtr.write_byte_record(&record)?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        match &self.parameters.output_path {
            Some(path) => {
                std::fs::write(path, bytes)?;
                Ok(path.clone())
            }
            None => {
                use std::io::Write;
                std::io::stdout().lock().write_all(&bytes)?;
                Ok("stdout".into())
            }
        }
    }
}
