//! Integration tests for the complete kgdelta pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - CorrespondenceStore → PopulationComparator → measurements/findings
//! - CorrespondenceStore → ValueComparator → deviations/omissions
//! - ValueMapper → scheduler → comparison steps over shared state
//!
//! Run with: cargo test --test integration_tests

use kgdelta_compare::{
    Mapper, PopulationComparator, ValueComparator, ValueComparisonConfig, ValueMapper,
};
use kgdelta_engine::{CorrespondenceStore, TableMatcher};
use kgdelta_model::{
    Aspect, AspectId, AspectPattern, AspectRegistry, DatasetId, EntityTerm, Finding, FindingStore,
    Literal, MeasurementKind, MeasurementStore, Value, WrongValueRegistry,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;

fn dataset(n: u32) -> DatasetId {
    DatasetId::new(format!("http://example.org/dataset/{n}"))
}

fn entity(n: &str) -> EntityTerm {
    EntityTerm::iri(format!("http://example.org/entity/{n}"))
}

fn aspect_id(name: &str) -> AspectId {
    AspectId::new(format!("http://example.org/aspect/{name}"))
}

fn registry_with(aspect: &Aspect) -> AspectRegistry {
    let mut registry = AspectRegistry::new();
    registry.insert(aspect.clone()).unwrap();
    registry
}

fn aspect_over(name: &str, datasets: &[DatasetId], variables: &[&str]) -> Aspect {
    let mut aspect = Aspect::new(aspect_id(name), "key");
    for dataset in datasets {
        aspect
            .set_pattern(
                dataset.clone(),
                AspectPattern::new(variables.iter().copied()),
            )
            .unwrap();
    }
    aspect
}

fn measurement(
    measurements: &MeasurementStore,
    kind: MeasurementKind,
    aspect: &AspectId,
    dataset: &DatasetId,
    variable: Option<&str>,
    compared_to: &[&DatasetId],
) -> Option<Decimal> {
    let compared: BTreeSet<DatasetId> = compared_to.iter().map(|d| (*d).clone()).collect();
    measurements.value(kind, aspect, dataset, variable, &compared)
}

// ============================================================================
// Population comparison across three datasets
// ============================================================================

#[test]
fn test_population_comparison_three_datasets() {
    let (d1, d2, d3) = (dataset(1), dataset(2), dataset(3));
    let aspect = aspect_over("person", &[d1.clone(), d2.clone(), d3.clone()], &[]);
    let registry = registry_with(&aspect);

    let mut matcher = TableMatcher::new();
    for n in ["111", "112", "113", "114"] {
        matcher.insert_key(&aspect, &d1, entity(n));
    }
    for n in ["211", "212"] {
        matcher.insert_key(&aspect, &d2, entity(n));
    }
    matcher.insert_key(&aspect, &d3, entity("315"));

    let id = aspect_id("person");
    let mut store = CorrespondenceStore::new();
    assert!(store.add_correspondence(&id, &[entity("111"), entity("211")]));
    assert!(store.add_correspondence(&id, &[entity("112"), entity("212")]));

    let mut measurements = MeasurementStore::new();
    let mut findings = FindingStore::new();
    PopulationComparator::new(vec![id.clone()])
        .run(&registry, &matcher, &mut store, &mut measurements, &mut findings)
        .unwrap();

    assert_eq!(
        measurement(&measurements, MeasurementKind::Count, &id, &d1, None, &[]),
        Some(Decimal::from(4))
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::AbsoluteCoverage, &id, &d1, None, &[&d2]),
        Some(Decimal::from(2))
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::AbsoluteCoverage, &id, &d1, None, &[&d3]),
        Some(Decimal::ZERO)
    );
    // both of d2's entities are matched in d1
    assert_eq!(
        measurement(&measurements, MeasurementKind::RelativeCoverage, &id, &d1, None, &[&d2]),
        Some(Decimal::ONE)
    );

    // d2 misses 113 and 114, d1 misses 315, d3 misses everything
    assert!(findings.of_dataset(&d2).contains(&Finding::ResourceOmission {
        aspect: id.clone(),
        compared_to_dataset: d1.clone(),
        compared_to_entity: entity("113"),
    }));
    assert!(findings.of_dataset(&d1).contains(&Finding::ResourceOmission {
        aspect: id.clone(),
        compared_to_dataset: d3.clone(),
        compared_to_entity: entity("315"),
    }));
    let d3_omissions = findings
        .of_dataset(&d3)
        .iter()
        .filter(|f| matches!(f, Finding::ResourceOmission { .. }))
        .count();
    assert_eq!(d3_omissions, 6);
}

#[test]
fn test_population_duplicates_and_completeness() {
    let (d1, d2) = (dataset(1), dataset(2));
    let aspect = aspect_over("person", &[d1.clone(), d2.clone()], &[]);
    let registry = registry_with(&aspect);

    let mut matcher = TableMatcher::new();
    for n in ["121", "122", "123"] {
        matcher.insert_key(&aspect, &d1, entity(n));
    }
    for n in ["221", "2211", "222"] {
        matcher.insert_key(&aspect, &d2, entity(n));
    }

    let id = aspect_id("person");
    let mut store = CorrespondenceStore::new();
    assert!(store.add_correspondence(&id, &[entity("121"), entity("221"), entity("2211")]));
    assert!(store.add_correspondence(&id, &[entity("122"), entity("222")]));

    let mut measurements = MeasurementStore::new();
    let mut findings = FindingStore::new();
    PopulationComparator::new(vec![id.clone()])
        .run(&registry, &matcher, &mut store, &mut measurements, &mut findings)
        .unwrap();

    // 221 and 2211 collapse: count 3, deduplicated 2
    assert_eq!(
        measurement(&measurements, MeasurementKind::Count, &id, &d2, None, &[]),
        Some(Decimal::from(3))
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::DeduplicatedCount, &id, &d2, None, &[]),
        Some(Decimal::from(2))
    );
    let duplicates: Vec<&Finding> = findings
        .of_dataset(&d2)
        .iter()
        .filter(|f| matches!(f, Finding::Duplicate { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);

    // population estimate: 3 * 2 / 2 = 3, completeness 2/3 for d2
    assert_eq!(
        measurement(&measurements, MeasurementKind::MarCompleteness, &id, &d2, None, &[&d1]),
        Some(Decimal::from_str("0.6666666666666667").unwrap())
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::MarCompleteness, &id, &d1, None, &[&d2]),
        Some(Decimal::ONE)
    );
}

// ============================================================================
// Value comparison of corresponding entities
// ============================================================================

fn value_scenario() -> (AspectRegistry, Aspect, TableMatcher, CorrespondenceStore, DatasetId, DatasetId)
{
    let (d1, d2) = (dataset(1), dataset(2));
    let aspect = aspect_over("person", &[d1.clone(), d2.clone()], &["name"]);
    let registry = registry_with(&aspect);

    let mut matcher = TableMatcher::new();
    matcher.insert_key(&aspect, &d1, entity("r1"));
    matcher.insert_key(&aspect, &d2, entity("r2"));
    let mut store = CorrespondenceStore::new();
    store.add_correspondence(&aspect_id("person"), &[entity("r1"), entity("r2")]);
    (registry, aspect, matcher, store, d1, d2)
}

#[test]
fn test_property_comparison_equal_values() {
    let (registry, aspect, mut matcher, mut store, d1, d2) = value_scenario();
    for dataset in [&d1, &d2] {
        let key = if dataset == &d1 { "r1" } else { "r2" };
        for value in ["value1", "value2"] {
            matcher.insert_value(
                &aspect,
                dataset,
                entity(key),
                "name",
                Value::Literal(Literal::string(value)),
            );
        }
    }

    let id = aspect_id("person");
    let mut measurements = MeasurementStore::new();
    let mut findings = FindingStore::new();
    ValueComparator::new(ValueComparisonConfig::new(id.clone(), ["name"]))
        .run(
            &registry,
            &matcher,
            &mut store,
            &WrongValueRegistry::new(),
            &mut measurements,
            &mut findings,
        )
        .unwrap();

    assert!(findings.is_empty());
    assert_eq!(
        measurement(&measurements, MeasurementKind::AbsoluteCoverage, &id, &d1, Some("name"), &[&d2]),
        Some(Decimal::from(2))
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::RelativeCoverage, &id, &d2, Some("name"), &[&d1]),
        Some(Decimal::ONE)
    );
    assert_eq!(
        measurement(&measurements, MeasurementKind::MarCompleteness, &id, &d1, Some("name"), &[&d2]),
        Some(Decimal::ONE)
    );
}

#[test]
fn test_property_comparison_reports_deviations() {
    let (registry, aspect, mut matcher, mut store, d1, d2) = value_scenario();
    matcher.insert_value(
        &aspect,
        &d1,
        entity("r1"),
        "name",
        Value::Literal(Literal::string("alpha")),
    );
    matcher.insert_value(
        &aspect,
        &d1,
        entity("r1"),
        "age",
        Value::Literal(Literal::typed("42", "http://www.w3.org/2001/XMLSchema#integer")),
    );
    matcher.insert_value(
        &aspect,
        &d2,
        entity("r2"),
        "name",
        Value::Literal(Literal::string("beta")),
    );

    let id = aspect_id("person");
    let mut measurements = MeasurementStore::new();
    let mut findings = FindingStore::new();
    ValueComparator::new(ValueComparisonConfig::new(id.clone(), ["name"]))
        .run(
            &registry,
            &matcher,
            &mut store,
            &WrongValueRegistry::new(),
            &mut measurements,
            &mut findings,
        )
        .unwrap();

    // the name mismatch is a deviation on both sides; age is not compared
    assert!(findings
        .of_dataset(&d1)
        .iter()
        .all(|f| matches!(f, Finding::Deviation { variable, .. } if variable == "name")));
    assert_eq!(findings.of_dataset(&d1).len(), 1);
    assert_eq!(findings.of_dataset(&d2).len(), 1);
    assert_eq!(
        measurement(&measurements, MeasurementKind::AbsoluteCoverage, &id, &d1, Some("name"), &[&d2]),
        Some(Decimal::ZERO)
    );
}

// ============================================================================
// Scheduler: mapping feeds the comparison over shared state
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_pipeline_runs_mapping_before_comparison() {
    use kgdelta_pipeline::{Pipeline, Step};
    use std::sync::{Arc, Mutex};

    struct Shared {
        registry: AspectRegistry,
        matcher: TableMatcher,
        store: Mutex<CorrespondenceStore>,
        measurements: Mutex<MeasurementStore>,
        findings: Mutex<FindingStore>,
    }

    struct MappingStep(Arc<Shared>);
    impl Step for MappingStep {
        fn id(&self) -> &str {
            "map-names"
        }
        fn run(&self) -> anyhow::Result<()> {
            let mut store = self.0.store.lock().unwrap();
            let mut findings = self.0.findings.lock().unwrap();
            ValueMapper::new(aspect_id("person"), "name").run(
                &self.0.registry,
                &self.0.matcher,
                &mut store,
                &mut findings,
            )?;
            Ok(())
        }
    }

    struct PopulationStep(Arc<Shared>);
    impl Step for PopulationStep {
        fn id(&self) -> &str {
            "population"
        }
        fn run(&self) -> anyhow::Result<()> {
            let mut store = self.0.store.lock().unwrap();
            let mut measurements = self.0.measurements.lock().unwrap();
            let mut findings = self.0.findings.lock().unwrap();
            PopulationComparator::new(vec![aspect_id("person")]).run(
                &self.0.registry,
                &self.0.matcher,
                &mut store,
                &mut measurements,
                &mut findings,
            )?;
            Ok(())
        }
    }

    let (d1, d2) = (dataset(1), dataset(2));
    let aspect = aspect_over("person", &[d1.clone(), d2.clone()], &["name"]);
    let registry = registry_with(&aspect);
    let mut matcher = TableMatcher::new();
    for (dataset, key, name) in [
        (&d1, "a", "Alice"),
        (&d1, "b", "Bob"),
        (&d2, "x", "Alice"),
        (&d2, "y", "Carol"),
    ] {
        matcher.insert_value(
            &aspect,
            dataset,
            entity(key),
            "name",
            Value::Literal(Literal::string(name)),
        );
    }

    let shared = Arc::new(Shared {
        registry,
        matcher,
        store: Mutex::new(CorrespondenceStore::new()),
        measurements: Mutex::new(MeasurementStore::new()),
        findings: Mutex::new(FindingStore::new()),
    });

    let mut pipeline = Pipeline::new();
    let mapping = pipeline
        .add_step(Arc::new(MappingStep(Arc::clone(&shared))), [])
        .unwrap();
    pipeline
        .add_step(Arc::new(PopulationStep(Arc::clone(&shared))), [mapping])
        .unwrap();
    pipeline.run().await.unwrap();

    // the mapped pair is visible to the comparison step
    let id = aspect_id("person");
    let measurements = shared.measurements.lock().unwrap();
    assert_eq!(
        measurement(&measurements, MeasurementKind::AbsoluteCoverage, &id, &d1, None, &[&d2]),
        Some(Decimal::ONE)
    );
    let findings = shared.findings.lock().unwrap();
    assert!(findings.of_dataset(&d1).contains(&Finding::ResourceOmission {
        aspect: id.clone(),
        compared_to_dataset: d2.clone(),
        compared_to_entity: entity("y"),
    }));
}

// ============================================================================
// Measurement serialization
// ============================================================================

#[test]
fn test_measurement_serialization_shape() {
    let (d1, d2) = (dataset(1), dataset(2));
    let aspect = aspect_over("person", &[d1.clone(), d2.clone()], &[]);
    let registry = registry_with(&aspect);
    let mut matcher = TableMatcher::new();
    matcher.insert_key(&aspect, &d1, entity("a"));
    matcher.insert_key(&aspect, &d2, entity("b"));
    let id = aspect_id("person");
    let mut store = CorrespondenceStore::new();
    store.add_correspondence(&id, &[entity("a"), entity("b")]);

    let mut measurements = MeasurementStore::new();
    let mut findings = FindingStore::new();
    PopulationComparator::new(vec![id])
        .run(&registry, &matcher, &mut store, &mut measurements, &mut findings)
        .unwrap();

    let json = serde_json::to_value(measurements.iter().collect::<Vec<_>>()).unwrap();
    let entries = json.as_array().unwrap();
    assert!(entries.iter().any(|m| m["kind"] == "mar_completeness"
        && m["unit"] == "one"
        && m["compared_to"].is_array()));
    // population-level measurements carry no variable scope
    assert!(entries.iter().all(|m| m["variable"].is_null()));
}
