//! Plan steps as scheduler units.
//!
//! Every step works on the shared run state behind locks. Exclusion is by
//! DAG shape: the plan declares fact-writing steps as inputs of the steps
//! that read their facts, so the scheduler's join barrier orders the lock
//! acquisitions and the locks only guard against plan mistakes, not
//! intended concurrency on the same store.

use crate::plan::{BuiltPlan, Plan, StepKind};
use anyhow::Result;
use kgdelta_compare::{Mapper, PopulationComparator, ValueComparator, ValueMapper};
use kgdelta_engine::{CorrespondenceStore, TableMatcher};
use kgdelta_model::{AspectRegistry, DatasetId, FindingStore, MeasurementStore, WrongValueRegistry};
use kgdelta_pipeline::{Pipeline, Step};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared state of one plan run.
#[derive(Clone)]
pub struct RunState {
    pub datasets: Vec<DatasetId>,
    pub registry: Arc<AspectRegistry>,
    pub matcher: Arc<TableMatcher>,
    pub correspondences: Arc<RwLock<CorrespondenceStore>>,
    pub wrong_values: Arc<WrongValueRegistry>,
    pub measurements: Arc<RwLock<MeasurementStore>>,
    pub findings: Arc<RwLock<FindingStore>>,
}

impl RunState {
    pub fn new(built: BuiltPlan) -> Self {
        Self {
            datasets: built.datasets,
            registry: Arc::new(built.registry),
            matcher: Arc::new(built.matcher),
            correspondences: Arc::new(RwLock::new(built.correspondences)),
            wrong_values: Arc::new(built.wrong_values),
            measurements: Arc::new(RwLock::new(MeasurementStore::new())),
            findings: Arc::new(RwLock::new(built.findings)),
        }
    }
}

struct ValueMappingStep {
    id: String,
    mapper: ValueMapper,
    state: RunState,
}

impl Step for ValueMappingStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> Result<()> {
        let mut correspondences = self.state.correspondences.write();
        let mut findings = self.state.findings.write();
        self.mapper.run(
            &self.state.registry,
            self.state.matcher.as_ref(),
            &mut correspondences,
            &mut findings,
        )?;
        Ok(())
    }
}

struct PopulationComparisonStep {
    id: String,
    comparator: PopulationComparator,
    state: RunState,
}

impl Step for PopulationComparisonStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> Result<()> {
        let mut correspondences = self.state.correspondences.write();
        let mut measurements = self.state.measurements.write();
        let mut findings = self.state.findings.write();
        self.comparator.run(
            &self.state.registry,
            self.state.matcher.as_ref(),
            &mut correspondences,
            &mut measurements,
            &mut findings,
        )?;
        Ok(())
    }
}

struct PropertyComparisonStep {
    id: String,
    comparator: ValueComparator,
    state: RunState,
}

impl Step for PropertyComparisonStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> Result<()> {
        let mut correspondences = self.state.correspondences.write();
        let mut measurements = self.state.measurements.write();
        let mut findings = self.state.findings.write();
        self.comparator.run(
            &self.state.registry,
            self.state.matcher.as_ref(),
            &mut correspondences,
            &self.state.wrong_values,
            &mut measurements,
            &mut findings,
        )?;
        Ok(())
    }
}

/// Translates a validated plan into a scheduler pipeline over `state`.
pub fn build_pipeline(plan: &Plan, state: &RunState) -> Result<Pipeline> {
    let inputs = plan.input_indices()?;
    let mut pipeline = Pipeline::new();
    for (step, inputs) in plan.steps.iter().zip(inputs) {
        let step: Arc<dyn Step> = match &step.kind {
            StepKind::ValueMapping(params) => {
                let mut mapper = ValueMapper::new(params.aspect.clone(), params.variable.clone());
                mapper.case_insensitive = params.case_insensitive;
                Arc::new(ValueMappingStep {
                    id: step.id.clone(),
                    mapper,
                    state: state.clone(),
                })
            }
            StepKind::PopulationComparison(params) => Arc::new(PopulationComparisonStep {
                id: step.id.clone(),
                comparator: PopulationComparator::new(params.aspects.clone()),
                state: state.clone(),
            }),
            StepKind::PropertyComparison(config) => Arc::new(PropertyComparisonStep {
                id: step.id.clone(),
                comparator: ValueComparator::new(config.clone()),
                state: state.clone(),
            }),
        };
        pipeline.add_step(step, inputs)?;
    }
    Ok(pipeline)
}
