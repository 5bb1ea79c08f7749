//! Correspondence finders.
//!
//! Mappers run before the comparators and feed positive facts into the
//! correspondence engine. The engine guards admission, so a mapper never
//! needs to re-check existing facts: proposals contradicting a negative
//! fact are rejected wholesale and simply leave no trace.

use kgdelta_engine::{CorrespondenceStore, PatternMatcher};
use kgdelta_model::{
    Aspect, AspectId, AspectRegistry, ConfigurationError, DatasetId, DatasetPair, EntityTerm,
    Finding, FindingStore,
};
use ahash::AHashMap;
use tracing::debug;

pub trait Mapper {
    fn aspect(&self) -> &AspectId;

    /// Discovers correspondences between two datasets of the aspect.
    fn map_datasets(
        &self,
        aspect: &Aspect,
        matcher: &dyn PatternMatcher,
        first: &DatasetId,
        second: &DatasetId,
        store: &mut CorrespondenceStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError>;

    /// Runs [`Self::map_datasets`] for every unordered dataset pair.
    fn run(
        &self,
        registry: &AspectRegistry,
        matcher: &dyn PatternMatcher,
        store: &mut CorrespondenceStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError> {
        let aspect = registry.get(self.aspect())?;
        let datasets = aspect.datasets();
        for pair in DatasetPair::pairs_of(&datasets) {
            self.map_datasets(aspect, matcher, &pair.first, &pair.second, store, findings)?;
        }
        Ok(())
    }
}

/// Maps entities whose literal value of one variable is equal, optionally
/// ignoring case. Entity references bound where a literal is expected are
/// recovered as an issue finding and excluded from matching.
pub struct ValueMapper {
    pub aspect: AspectId,
    pub variable: String,
    pub case_insensitive: bool,
}

impl ValueMapper {
    pub fn new(aspect: AspectId, variable: impl Into<String>) -> Self {
        Self {
            aspect,
            variable: variable.into(),
            case_insensitive: false,
        }
    }

    fn normalize(&self, lexical: &str) -> String {
        if self.case_insensitive {
            lexical.to_lowercase()
        } else {
            lexical.to_string()
        }
    }

    /// Lexical match keys of one dataset's entities for the mapping
    /// variable.
    fn match_keys(
        &self,
        aspect: &Aspect,
        matcher: &dyn PatternMatcher,
        dataset: &DatasetId,
        findings: &mut FindingStore,
    ) -> Result<Vec<(EntityTerm, Vec<String>)>, ConfigurationError> {
        let variables = [self.variable.clone()];
        let mut keys = Vec::new();
        for entity in matcher.resource_keys(aspect, dataset)? {
            let Some(bindings) = matcher.resource_values(aspect, dataset, &entity, &variables)?
            else {
                continue;
            };
            let mut lexicals = Vec::new();
            for value in bindings.get(&self.variable).into_iter().flatten() {
                match value.as_literal() {
                    Some(literal) => lexicals.push(self.normalize(&literal.lexical)),
                    None => {
                        findings.add(
                            dataset,
                            Finding::Issue {
                                aspect: self.aspect.clone(),
                                entity: entity.clone(),
                                message: format!(
                                    "expected a literal value for variable \"{}\", found {}",
                                    self.variable, value
                                ),
                            },
                        );
                    }
                }
            }
            keys.push((entity, lexicals));
        }
        Ok(keys)
    }
}

impl Mapper for ValueMapper {
    fn aspect(&self) -> &AspectId {
        &self.aspect
    }

    fn map_datasets(
        &self,
        aspect: &Aspect,
        matcher: &dyn PatternMatcher,
        first: &DatasetId,
        second: &DatasetId,
        store: &mut CorrespondenceStore,
        findings: &mut FindingStore,
    ) -> Result<(), ConfigurationError> {
        let first_keys = self.match_keys(aspect, matcher, first, findings)?;
        let second_keys = self.match_keys(aspect, matcher, second, findings)?;

        let mut by_lexical: AHashMap<&str, Vec<&EntityTerm>> = AHashMap::new();
        for (entity, lexicals) in &first_keys {
            for lexical in lexicals {
                by_lexical.entry(lexical.as_str()).or_default().push(entity);
            }
        }

        let mut proposed = 0usize;
        for (entity, lexicals) in &second_keys {
            for lexical in lexicals {
                for matched in by_lexical.get(lexical.as_str()).into_iter().flatten() {
                    if store.add_correspondence(&self.aspect, &[(*matched).clone(), entity.clone()])
                    {
                        proposed += 1;
                    }
                }
            }
        }
        debug!(
            aspect = self.aspect.as_str(),
            first = first.as_str(),
            second = second.as_str(),
            admitted = proposed,
            "value mapping done"
        );
        Ok(())
    }
}
