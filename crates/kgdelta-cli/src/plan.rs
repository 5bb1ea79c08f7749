//! Comparison plan files.
//!
//! A plan is one JSON document: datasets, aspect definitions, inline data
//! tables, optional seed facts and known-wrong values, and the step DAG.
//! Deserialization gives the raw shapes; `Plan::build` validates the cross
//! references (aspects exist, datasets are covered, step inputs resolve)
//! and produces the runtime structures the steps operate on.

use anyhow::{anyhow, bail, Context, Result};
use kgdelta_compare::ValueComparisonConfig;
use kgdelta_engine::{CorrespondenceStore, TableMatcher};
use kgdelta_model::{
    Aspect, AspectId, AspectPattern, AspectRegistry, DatasetId, EntityTerm, FindingStore, Value,
    WrongValueRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct Plan {
    pub datasets: Vec<DatasetDecl>,
    pub aspects: Vec<AspectDecl>,
    #[serde(default)]
    pub data: Vec<DataRow>,
    #[serde(default)]
    pub correspondences: Vec<CorrespondenceDecl>,
    #[serde(default)]
    pub incorrespondences: Vec<IncorrespondenceDecl>,
    #[serde(default)]
    pub wrong_values: Vec<WrongValueDecl>,
    pub steps: Vec<StepDecl>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetDecl {
    pub id: DatasetId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AspectDecl {
    pub id: AspectId,
    pub key_variable: String,
    /// Dataset IRI to its pattern declaration.
    pub patterns: BTreeMap<DatasetId, PatternDecl>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatternDecl {
    pub covered_variables: BTreeSet<String>,
}

/// One entity row of the inline data table: its key and variable bindings.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataRow {
    pub aspect: AspectId,
    pub dataset: DatasetId,
    pub entity: EntityTerm,
    #[serde(default)]
    pub values: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CorrespondenceDecl {
    pub aspect: AspectId,
    pub entities: Vec<EntityTerm>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncorrespondenceDecl {
    pub aspect: AspectId,
    pub first: EntityTerm,
    pub second: EntityTerm,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WrongValueDecl {
    pub dataset: DatasetId,
    pub entity: EntityTerm,
    pub variable: String,
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepDecl {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum StepKind {
    ValueMapping(ValueMappingParams),
    PopulationComparison(PopulationComparisonParams),
    PropertyComparison(ValueComparisonConfig),
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::ValueMapping(_) => "value_mapping",
            StepKind::PopulationComparison(_) => "population_comparison",
            StepKind::PropertyComparison(_) => "property_comparison",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueMappingParams {
    pub aspect: AspectId,
    pub variable: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopulationComparisonParams {
    pub aspects: Vec<AspectId>,
}

/// Validated runtime structures of one plan.
pub struct BuiltPlan {
    pub datasets: Vec<DatasetId>,
    pub registry: AspectRegistry,
    pub matcher: TableMatcher,
    pub correspondences: CorrespondenceStore,
    pub wrong_values: WrongValueRegistry,
    pub findings: FindingStore,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file {}", path.display()))?;
        let plan: Plan = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse plan file {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            bail!("plan declares no datasets");
        }
        if self.steps.is_empty() {
            bail!("plan declares no steps");
        }
        let datasets: BTreeSet<&DatasetId> = self.datasets.iter().map(|d| &d.id).collect();
        if datasets.len() != self.datasets.len() {
            bail!("plan declares a dataset twice");
        }
        let aspects: BTreeSet<&AspectId> = self.aspects.iter().map(|a| &a.id).collect();

        for aspect in &self.aspects {
            for dataset in aspect.patterns.keys() {
                if !datasets.contains(dataset) {
                    bail!(
                        "aspect {} declares a pattern for undeclared dataset {}",
                        aspect.id,
                        dataset
                    );
                }
            }
        }
        for row in &self.data {
            if !aspects.contains(&row.aspect) {
                bail!("data row references undeclared aspect {}", row.aspect);
            }
            if !datasets.contains(&row.dataset) {
                bail!("data row references undeclared dataset {}", row.dataset);
            }
        }
        for wrong in &self.wrong_values {
            if !datasets.contains(&wrong.dataset) {
                bail!(
                    "wrong value references undeclared dataset {}",
                    wrong.dataset
                );
            }
        }

        let mut step_ids = BTreeSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id.as_str()) {
                bail!("step id \"{}\" is declared twice", step.id);
            }
            let referenced = match &step.kind {
                StepKind::ValueMapping(params) => vec![&params.aspect],
                StepKind::PopulationComparison(params) => {
                    if params.aspects.is_empty() {
                        bail!("step \"{}\" compares no aspects", step.id);
                    }
                    params.aspects.iter().collect()
                }
                StepKind::PropertyComparison(config) => {
                    if config.variables.is_empty() {
                        bail!("step \"{}\" compares no variables", step.id);
                    }
                    vec![&config.aspect]
                }
            };
            for aspect in referenced {
                if !aspects.contains(aspect) {
                    bail!("step \"{}\" references undeclared aspect {}", step.id, aspect);
                }
            }
        }
        // Inputs must point at earlier steps; the scheduler re-checks the
        // indices, but the id resolution happens here.
        let mut earlier = BTreeSet::new();
        for step in &self.steps {
            for input in &step.inputs {
                if !earlier.contains(input.as_str()) {
                    bail!(
                        "step \"{}\" references input \"{}\", which is not defined before it",
                        step.id,
                        input
                    );
                }
            }
            earlier.insert(step.id.as_str());
        }
        Ok(())
    }

    /// Resolved input indices per step, in declaration order.
    pub fn input_indices(&self) -> Result<Vec<Vec<usize>>> {
        let mut indices: BTreeMap<&str, usize> = BTreeMap::new();
        let mut resolved = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let inputs = step
                .inputs
                .iter()
                .map(|input| {
                    indices
                        .get(input.as_str())
                        .copied()
                        .ok_or_else(|| anyhow!("unresolved step input \"{input}\""))
                })
                .collect::<Result<Vec<usize>>>()?;
            resolved.push(inputs);
            indices.insert(step.id.as_str(), index);
        }
        Ok(resolved)
    }

    /// Builds the runtime structures: aspect registry, data tables, seed
    /// facts and the wrong-value registry.
    pub fn build(&self) -> Result<BuiltPlan> {
        let mut registry = AspectRegistry::new();
        for decl in &self.aspects {
            let mut aspect = Aspect::new(decl.id.clone(), decl.key_variable.clone());
            for (dataset, pattern) in &decl.patterns {
                aspect.set_pattern(
                    dataset.clone(),
                    AspectPattern::new(pattern.covered_variables.iter().cloned()),
                )?;
            }
            registry.insert(aspect)?;
        }

        let mut matcher = TableMatcher::new();
        for row in &self.data {
            let aspect = registry.get(&row.aspect)?;
            matcher.insert_key(aspect, &row.dataset, row.entity.clone());
            for (variable, values) in &row.values {
                for value in values {
                    matcher.insert_value(
                        aspect,
                        &row.dataset,
                        row.entity.clone(),
                        variable.clone(),
                        value.clone(),
                    );
                }
            }
        }

        let mut correspondences = CorrespondenceStore::new();
        for decl in &self.correspondences {
            correspondences.add_correspondence(&decl.aspect, &decl.entities);
        }
        for decl in &self.incorrespondences {
            correspondences.add_incorrespondence(&decl.aspect, &decl.first, &decl.second);
        }

        let mut wrong_values = WrongValueRegistry::new();
        for decl in &self.wrong_values {
            wrong_values.mark(
                decl.dataset.clone(),
                decl.entity.clone(),
                decl.variable.clone(),
                decl.value.clone(),
            );
        }

        Ok(BuiltPlan {
            datasets: self.datasets.iter().map(|d| d.id.clone()).collect(),
            registry,
            matcher,
            correspondences,
            wrong_values,
            findings: FindingStore::new(),
        })
    }
}
