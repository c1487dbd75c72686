pub mod annotation;
pub mod binomial;
pub mod fragment;
pub mod ion_series;
pub mod mass;
pub mod modification;
pub mod peptide;
pub mod profile;
pub mod scoring;
pub mod settings;
pub mod site_ions;
pub mod spectrum;
pub mod window;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("probability {value} outside of [0, 1] ({context})")]
    ProbabilityRange { value: f64, context: &'static str },
    #[error("sum of inverse probabilities is not positive: {0}")]
    Normalization(f64),
    #[error("site {site} received no score for spectrum `{title}`")]
    IncompleteCoverage { site: usize, title: String },
    #[error("cannot reduce a spectrum without peaks")]
    EmptySpectrum,
    #[error("filtering with a fragment accuracy of {tolerance} Da removes every peak")]
    OverFiltered { tolerance: f64 },
    #[error(transparent)]
    Collaborator(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an error raised by a site locator, fragmenter or annotator
    pub fn collaborator<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Collaborator(err.into())
    }

    /// Check that `value` is a probability
    pub(crate) fn check_probability(value: f64, context: &'static str) -> Result<f64, Error> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(Error::ProbabilityRange { value, context })
        }
    }
}
