//! Class sets and their canonical form

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator joining sorted class names in the derivation input
pub const CLASS_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    #[error("class names must not be empty")]
    Empty,

    #[error("class name {0:?} contains the separator ','")]
    ContainsSeparator(String),

    #[error("class name {0:?} has leading or trailing whitespace")]
    Whitespace(String),
}

/// A set of access classes.
///
/// Membership is unordered, but iteration and [`ClassSet::canonical`] are
/// always in lexicographic order, which is what key derivation hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ClassSet(BTreeSet<String>);

impl ClassSet {
    pub fn new<I, S>(classes: I) -> Result<Self, ClassError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for class in classes {
            let class = class.into();
            validate(&class)?;
            set.insert(class);
        }
        Ok(Self(set))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.0.contains(class)
    }

    /// Sorted class names joined with `,`.
    pub fn canonical(&self) -> String {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        names.join(CLASS_SEPARATOR)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Classes in `self` that `catalogue` does not contain
    pub fn missing_from<'a>(&'a self, catalogue: &'a ClassSet) -> Vec<&'a str> {
        self.0
            .difference(&catalogue.0)
            .map(String::as_str)
            .collect()
    }
}

fn validate(class: &str) -> Result<(), ClassError> {
    if class.is_empty() {
        return Err(ClassError::Empty);
    }
    if class.contains(CLASS_SEPARATOR) {
        return Err(ClassError::ContainsSeparator(class.to_string()));
    }
    if class.trim() != class {
        return Err(ClassError::Whitespace(class.to_string()));
    }
    Ok(())
}

impl TryFrom<Vec<String>> for ClassSet {
    type Error = ClassError;

    fn try_from(classes: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(classes)
    }
}

impl From<ClassSet> for Vec<String> {
    fn from(set: ClassSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl std::fmt::Display for ClassSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
