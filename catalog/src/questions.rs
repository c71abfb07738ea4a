//! The questionnaire catalog.
//!
//! Questions are grouped by category. The same question may appear under
//! more than one category; each occurrence is a separate stored question and
//! counts toward its own category's risk.

use std::io::BufReader;
use std::path::Path;

use riskcheck_core::NewQuestion;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

const BUNDLED_QUESTIONS: &str = include_str!("../data/questions.yaml");

/// One question as written in the catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, alias = "howTo", skip_serializing_if = "Option::is_none")]
    pub how_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub category: String,
    pub questions: Vec<CatalogQuestion>,
}

/// A validated set of questionnaire categories.
///
/// # Examples
///
/// ```
/// use riskcheck_catalog::QuestionCatalog;
///
/// let catalog = QuestionCatalog::bundled().unwrap();
/// let questions = catalog.to_new_questions();
/// assert_eq!(questions.len(), catalog.len());
/// assert!(questions.iter().all(|q| !q.question.is_empty()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    categories: Vec<CatalogCategory>,
}

impl QuestionCatalog {
    /// The questionnaire shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(BUNDLED_QUESTIONS)
    }

    /// Loads and validates a catalog from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let catalog: Self = serde_yaml::from_reader(BufReader::new(file))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses and validates a catalog from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(CatalogError::InvalidCatalog("no categories defined".into()));
        }
        for category in &self.categories {
            if category.category.trim().is_empty() {
                return Err(CatalogError::InvalidCatalog("category name cannot be empty".into()));
            }
            if category.questions.is_empty() {
                return Err(CatalogError::InvalidCatalog(format!(
                    "category '{}' has no questions",
                    category.category
                )));
            }
            if let Some(index) = category
                .questions
                .iter()
                .position(|q| q.question.trim().is_empty())
            {
                return Err(CatalogError::InvalidCatalog(format!(
                    "question {} in category '{}' has no text",
                    index + 1,
                    category.category
                )));
            }
        }
        Ok(())
    }

    pub fn categories(&self) -> &[CatalogCategory] {
        &self.categories
    }

    /// Total number of questions across all categories.
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the catalog into rows ready for storage, in file order.
    pub fn to_new_questions(&self) -> Vec<NewQuestion> {
        self.categories
            .iter()
            .flat_map(|category| {
                category.questions.iter().map(|q| NewQuestion {
                    category: category.category.clone(),
                    subcategory: q.subcategory.clone(),
                    question: q.question.clone(),
                    action: q.action.clone(),
                    how_to: q.how_to.clone(),
                    why: q.why.clone(),
                })
            })
            .collect()
    }
}
