// crates/pf_flow/tests/phase_rows.rs

//! 相行映射：流体与相渗模型按相名匹配

use pf_flow::prelude::*;
use pf_flow::{FlowError, PhaseRowMap};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_order() -> Vec<String> {
    names(&["water", "oil", "gas"])
}

#[test]
fn test_water_oil_with_reordered_relperm() {
    let map = PhaseRowMap::build(&default_order(), &names(&["water", "oil"]), &names(&["oil", "water"])).unwrap();
    assert_eq!(map.row_of("water"), Some(0));
    assert_eq!(map.row_of("oil"), Some(1));
    assert_eq!(map.fluid_index_of_relperm(0), 1);
    assert_eq!(map.fluid_index_of_relperm(1), 0);
}

#[test]
fn test_fluid_order_does_not_change_rows() {
    let map = PhaseRowMap::build(&default_order(), &names(&["oil", "water"]), &names(&["water", "oil"])).unwrap();
    assert_eq!(map.row(0), 1);
    assert_eq!(map.row(1), 0);
}

#[test]
fn test_mismatched_names_rejected() {
    let err = PhaseRowMap::build(&default_order(), &names(&["water", "oil"]), &names(&["water", "gas"])).unwrap_err();
    assert!(matches!(err, FlowError::PhaseMismatch(_)));
    assert!(err.is_configuration());
}

#[test]
fn test_updater_rejects_phase_count_mismatch() {
    let fluid = CompressibleFluid::new(
        vec![
            PhaseFluidProps::incompressible("water", 1000.0, 1e-3),
            PhaseFluidProps::incompressible("oil", 800.0, 5e-3),
        ],
        0.0,
    );
    let relperm = BrooksCoreyRelPerm::new(vec![BrooksCoreyPhase::new("water", 0.0, 2.0)]);
    let result = PhaseStateUpdater::new(
        Box::new(fluid),
        Box::new(relperm),
        Box::new(PoreCompressibility::rigid()),
        &default_order(),
    );
    assert!(matches!(result, Err(FlowError::PhaseMismatch(_))));
}

#[test]
fn test_relperm_values_follow_phase_names() {
    let fluid = CompressibleFluid::new(
        vec![
            PhaseFluidProps::incompressible("water", 1000.0, 1e-3),
            PhaseFluidProps::incompressible("oil", 800.0, 4e-3),
        ],
        0.0,
    );
    // 相渗模型顺序与流体相反，且两相指数不同
    let relperm = BrooksCoreyRelPerm::new(vec![
        BrooksCoreyPhase::new("oil", 0.0, 1.0),
        BrooksCoreyPhase::new("water", 0.0, 2.0),
    ]);
    let updater = PhaseStateUpdater::new(
        Box::new(fluid),
        Box::new(relperm),
        Box::new(PoreCompressibility::rigid()),
        &default_order(),
    )
    .unwrap();

    let mut sub = SubRegion::new(1, 2);
    sub.set_saturation(0, &[0.3, 0.7]).unwrap();
    let mut domain = FlowDomain::new(2, vec![Region::new("rock", vec![sub])]).unwrap();
    updater.update(&mut domain);

    let cell = &domain.regions[0].subregions[0];
    assert!((cell.relperm[0][0] - 0.09).abs() < 1e-12);
    assert!((cell.relperm[0][1] - 0.7).abs() < 1e-12);
    assert!((cell.mobility[0][0] - 0.09 * 1000.0 / 1e-3).abs() < 1e-6);
}
