use super::input::Localize;
use super::output::{LocalizationResults, LocalizedMatch};
use anyhow::Context;
use log::info;
use phosphors_core::scoring::{Query, Scorer};
use std::time::Instant;

pub struct Runner {
    pub parameters: Localize,
    scorer: Scorer,
    start: Instant,
}

impl Runner {
    pub fn new(parameters: Localize) -> Self {
        let scorer = Scorer::new(parameters.scoring.clone());
        if let Ok(json) = serde_json::to_string_pretty(&parameters) {
            log::debug!("{}", json);
        }
        info!(
            "scoring with {} Da windows, depth {}-{}, fragment tolerance {:?}",
            parameters.scoring.window_size,
            parameters.scoring.min_depth,
            parameters.scoring.max_depth,
            parameters.scoring.annotation.fragment_tol
        );
        Runner {
            parameters,
            scorer,
            start: Instant::now(),
        }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Queries are stored as a JSON array
    pub fn read_queries<S: AsRef<str>>(path: S) -> anyhow::Result<Vec<Query>> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read `{path}`"))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse queries in `{path}`"))
    }

    fn localize_file(&self, path: &str) -> anyhow::Result<LocalizationResults> {
        let queries = Self::read_queries(path)?;
        let mut results = LocalizationResults::default();
        for (query, result) in queries.iter().zip(self.scorer.score_batch(&queries)) {
            match result {
                Ok(localization) => results.matches.push(LocalizedMatch {
                    file: query.spectrum.file.clone().unwrap_or_else(|| path.to_string()),
                    title: query.spectrum.title.clone(),
                    sequence: query.peptide.sequence.clone(),
                    peptide: query.peptide.to_string(),
                    localization,
                }),
                Err(err) => {
                    log::warn!(
                        "skipping {} on `{}`: {}",
                        query.peptide,
                        query.spectrum.title,
                        err
                    );
                    results.failed += 1;
                }
            }
        }
        info!(
            "- localized {} matches from {} in {}ms",
            results.matches.len(),
            path,
            (Instant::now() - self.start).as_millis()
        );
        Ok(results)
    }

    pub fn run(self) -> anyhow::Result<LocalizationResults> {
        let mut outputs = LocalizationResults::default();
        for path in &self.parameters.query_paths {
            match self.localize_file(path) {
                Ok(results) => {
                    outputs.matches.extend(results.matches);
                    outputs.failed += results.failed;
                }
                Err(err) => log::error!("{:?}", err),
            }
        }

        if outputs.failed > 0 {
            log::warn!("{} matches could not be localized", outputs.failed);
        }

        let path = self.write_sites(&outputs.matches)?;
        info!("wrote {} localized matches to {}", outputs.matches.len(), path);
        info!(
            "- {} distributions built, {} cached",
            self.scorer.cache().built(),
            self.scorer.cache().len()
        );
        info!("finished in {}s", (Instant::now() - self.start).as_secs());
        Ok(outputs)
    }
}
