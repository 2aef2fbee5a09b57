//! Tests for the ParameterIndexer

use odmrfit_rs::parameters::ParameterKind;
use odmrfit_rs::{ModelKind, OdmrFitError, ParameterIndexer};

#[test]
fn test_slot_names_per_model() {
    let names = |model: ModelKind| ParameterIndexer::from_template(model.template()).slot_names();

    assert_eq!(names(ModelKind::EsrSingle), ["center", "width", "contrast", "offset"]);
    assert_eq!(names(ModelKind::Gauss1d), ["center", "width", "contrast", "offset"]);
    assert_eq!(
        names(ModelKind::Esr15n),
        ["center", "width", "contrast_0", "contrast_1", "offset"]
    );
    assert_eq!(
        names(ModelKind::Esr14n),
        ["center", "width", "contrast_0", "contrast_1", "contrast_2", "offset"]
    );
}

#[test]
fn test_lookup_names_and_aliases() {
    let indexer = ParameterIndexer::from_template(ModelKind::Esr14n.template());

    assert_eq!(indexer.lookup("center").unwrap(), vec![0]);
    assert_eq!(indexer.lookup("resonance").unwrap(), vec![0]);
    assert_eq!(indexer.lookup("contrast_2").unwrap(), vec![4]);
    assert_eq!(indexer.lookup("contrast").unwrap(), vec![2, 3, 4]);
    assert_eq!(indexer.lookup("mean_contrast").unwrap(), vec![2, 3, 4]);
    assert_eq!(indexer.kind_of(5), Some(ParameterKind::Offset));
    assert_eq!(indexer.kind_of(6), None);
}

#[test]
fn test_lookup_unknown_name() {
    let indexer = ParameterIndexer::from_template(ModelKind::EsrSingle.template());

    match indexer.lookup("contrast_1") {
        Err(OdmrFitError::ParameterLookup(msg)) => assert!(msg.contains("contrast_1")),
        other => panic!("Expected ParameterLookup error, got {:?}", other),
    }
    assert!(indexer.lookup("amplitude").is_err());
}

#[test]
fn test_units() {
    assert_eq!(ParameterKind::Center.unit(), "GHz");
    assert_eq!(ParameterKind::Width.unit(), "GHz");
    assert_eq!(ParameterKind::Contrast.unit(), "a.u.");
    assert_eq!(ParameterKind::Offset.unit(), "a.u.");
}
