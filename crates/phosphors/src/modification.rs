use std::{
    fmt::{Display, Write},
    str::FromStr,
};

use serde::{de::Visitor, Deserialize, Serialize};

use crate::mass::VALID_AA;

/// Where a modification is allowed to sit
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModificationSpecificity {
    PeptideN(Option<u8>),
    PeptideC(Option<u8>),
    ProteinN(Option<u8>),
    ProteinC(Option<u8>),
    Residue(u8),
}

impl ModificationSpecificity {
    pub fn is_n_term(&self) -> bool {
        matches!(self, Self::PeptideN(_) | Self::ProteinN(_))
    }

    pub fn is_c_term(&self) -> bool {
        matches!(self, Self::PeptideC(_) | Self::ProteinC(_))
    }
}

impl Display for ModificationSpecificity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = match self {
            ModificationSpecificity::PeptideN(r) => {
                f.write_char('^')?;
                *r
            }
            ModificationSpecificity::PeptideC(r) => {
                f.write_char('$')?;
                *r
            }
            ModificationSpecificity::ProteinN(r) => {
                f.write_char('[')?;
                *r
            }
            ModificationSpecificity::ProteinC(r) => {
                f.write_char(']')?;
                *r
            }
            ModificationSpecificity::Residue(r) => Some(*r),
        };

        if let Some(r) = r {
            f.write_char(r as char)?;
        }

        Ok(())
    }
}

impl Serialize for ModificationSpecificity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct SpecificityVisitor;

impl<'de> Visitor<'de> for SpecificityVisitor {
    type Value = ModificationSpecificity;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a modification specificity such as `S`, `^`, `$K` or `[M`")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(|err| E::custom(format!("{err:?}")))
    }
}

impl<'de> Deserialize<'de> for ModificationSpecificity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(SpecificityVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidModification {
    Empty,
    InvalidResidue(char),
    TooLong(String),
}

fn terminal_residue(rest: &str) -> Result<Option<u8>, InvalidModification> {
    match rest.chars().next() {
        None => Ok(None),
        Some(c) if VALID_AA.contains(&(c as u8)) => Ok(Some(c as u8)),
        Some(c) => Err(InvalidModification::InvalidResidue(c)),
    }
}

impl FromStr for ModificationSpecificity {
    type Err = InvalidModification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 2 {
            return Err(InvalidModification::TooLong(s.into()));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return terminal_residue(rest).map(ModificationSpecificity::PeptideN);
        }
        if let Some(rest) = s.strip_prefix('$') {
            return terminal_residue(rest).map(ModificationSpecificity::PeptideC);
        }
        if let Some(rest) = s.strip_prefix('[') {
            return terminal_residue(rest).map(ModificationSpecificity::ProteinN);
        }
        if let Some(rest) = s.strip_prefix(']') {
            return terminal_residue(rest).map(ModificationSpecificity::ProteinC);
        }
        match s.chars().next() {
            Some(c) => {
                if s.len() == 1 && VALID_AA.contains(&(c as u8)) {
                    Ok(ModificationSpecificity::Residue(c as u8))
                } else {
                    Err(InvalidModification::InvalidResidue(c))
                }
            }
            None => Err(InvalidModification::Empty),
        }
    }
}

/// A PTM definition from the modification catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PtmDefinition {
    pub name: String,
    /// Monoisotopic mass shift
    pub mass: f64,
    pub specificity: ModificationSpecificity,
}

impl PtmDefinition {
    pub fn new<S: Into<String>>(name: S, mass: f64, specificity: ModificationSpecificity) -> Self {
        Self {
            name: name.into(),
            mass,
            specificity,
        }
    }

    pub fn is_n_term(&self) -> bool {
        self.specificity.is_n_term()
    }

    pub fn is_c_term(&self) -> bool {
        self.specificity.is_c_term()
    }
}

/// A modification placed on a peptide residue.
///
/// `site` is 1-based; terminal modifications sit on the first or last residue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModificationMatch {
    pub name: String,
    pub mass: f64,
    pub variable: bool,
    pub site: usize,
}

impl ModificationMatch {
    pub fn variable(ptm: &PtmDefinition, site: usize) -> Self {
        Self {
            name: ptm.name.clone(),
            mass: ptm.mass,
            variable: true,
            site,
        }
    }

    pub fn fixed(ptm: &PtmDefinition, site: usize) -> Self {
        Self {
            variable: false,
            ..Self::variable(ptm, site)
        }
    }
}
