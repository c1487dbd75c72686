use anyhow::{ensure, Context};
use clap::ArgMatches;
use phosphors_core::{
    mass::Tolerance,
    settings::{Builder, Parameters},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
/// Actual localization parameters - may include overrides or default values not set by user
pub struct Localize {
    pub version: String,
    pub scoring: Parameters,
    pub query_paths: Vec<String>,
    pub output_path: Option<String>,
}

#[derive(Deserialize, Default)]
/// Input parameters deserialized from JSON file
pub struct Input {
    #[serde(default)]
    pub scoring: Builder,
    pub query_paths: Option<Vec<String>>,
    pub output_path: Option<String>,
}

impl Input {
    pub fn from_arguments(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut input = match matches.get_one::<String>("parameters") {
            Some(path) => Input::load(path)
                .with_context(|| format!("Failed to read parameters from `{path}`"))?,
            None => Input::default(),
        };

        // Handle JSON configuration overrides
        if let Some(output_path) = matches.get_one::<String>("output") {
            log::trace!("overriding `output_path` parameter.");
            input.output_path = Some(output_path.into());
        }
        if let Some(query_paths) = matches.get_many::<String>("query_paths") {
            log::trace!("overriding `query_paths` parameter.");
            input.query_paths = Some(query_paths.into_iter().map(|p| p.into()).collect());
        }
        if let Some(tolerance) = matches.get_one::<f64>("fragment-ppm").copied() {
            log::trace!("overriding `scoring.fragment_tol` parameter.");
            input.scoring.fragment_tol = Some(Tolerance::Ppm(-tolerance, tolerance));
        }
        if let Some(tolerance) = matches.get_one::<f64>("fragment-da").copied() {
            log::trace!("overriding `scoring.fragment_tol` parameter.");
            input.scoring.fragment_tol = Some(Tolerance::Da(-tolerance, tolerance));
        }
        if matches.get_flag("neutral-losses") {
            input.scoring.account_neutral_losses = Some(true);
        }

        ensure!(
            input.query_paths.as_ref().map_or(false, |p| !p.is_empty()),
            "`query_paths` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::load_str(&contents)
    }

    pub fn load_str(contents: &str) -> anyhow::Result<Self> {
        serde_json::from_str(contents).map_err(anyhow::Error::from)
    }

    pub fn build(self) -> anyhow::Result<Localize> {
        let scoring = self.scoring.make_parameters();

        let query_paths = self
            .query_paths
            .context("'query_paths' must be provided!")?;

        Ok(Localize {
            version: clap::crate_version!().into(),
            scoring,
            query_paths,
            output_path: self.output_path,
        })
    }
}
