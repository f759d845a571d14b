use std::io::Write;
use winder_rs::planner::{self, DomainError, LayerOutcome, WinderMachine, ZERO_MOVE_COMMAND};
use winder_shared::gcode::ParameterHeader;
use winder_shared::wind::load_wind_file;
use winder_shared::{
    Coordinate, HelicalLayer, HoopLayer, Layer, LayerKind, MandrelParameters, PartialCoordinate,
    SkipLayer, TowParameters, WindDefinition,
};

const MANDREL: MandrelParameters = MandrelParameters { diameter: 10.0, wind_length: 100.0 };
const TOW: TowParameters = TowParameters { width: 1.0, thickness: 0.1 };

fn definition(layers: Vec<Layer>) -> WindDefinition {
    WindDefinition {
        layers,
        mandrel_parameters: MANDREL,
        tow_parameters: TOW,
        default_feed_rate: 1000.0,
    }
}

fn helical(pattern_number: u32) -> Layer {
    Layer::Helical(HelicalLayer {
        wind_angle: 45.0,
        pattern_number,
        skip_index: 1,
        lock_degrees: 180.0,
        lead_in_mm: 10.0,
        lead_out_degrees: 20.0,
        skip_initial_near_lock: None,
    })
}

#[test]
fn test_single_terminal_hoop_program() {
    let layers = vec![Layer::Hoop(HoopLayer { terminal: true })];
    let plan = planner::plan_wind(&definition(layers), false).unwrap();
    let commands = &plan.commands;

    assert_eq!(commands[0], ZERO_MOVE_COMMAND);
    assert_eq!(commands[1], "G0 F1000");
    let header = ParameterHeader::from_comment(&commands[2]).unwrap();
    assert_eq!(header.mandrel, MANDREL);
    assert_eq!(header.tow, TOW);

    assert_eq!(commands[3], "G0 X0 Y180 Z0");
    // 90 - (10 / 1 rad in degrees), negated
    assert_eq!(commands[4], "G0 Z482.957795");
    // 100 mm traverse in 101 waypoints, starting at the current position
    assert_eq!(commands[5], "G0 X0 Y180 Z482.957795");
    assert_eq!(commands[6], "G0 X1 Y540 Z482.957795");
    assert_eq!(commands[105], "G0 X100 Y36180 Z482.957795");
    assert_eq!(commands[106], "G0 Y36360 Z0");
    assert_eq!(commands.len(), 107);
    assert!(!commands.iter().any(|line| line.starts_with("G92")));

    assert_eq!(plan.layers.len(), 1);
    assert_eq!(plan.layers[0].kind, LayerKind::Hoop);
    assert!(plan.total_time_s > 0.0);
    assert!(plan.total_tow_m > 0.0);
}

#[test]
fn test_header_is_found_in_leading_lines() {
    let plan = planner::plan_wind(&definition(vec![helical(3)]), true).unwrap();
    let header = ParameterHeader::find_in(plan.commands.iter().map(String::as_str)).unwrap();
    assert_eq!(header, ParameterHeader::new(MANDREL, TOW));
}

#[test]
fn test_verbose_program_labels_layers() {
    let layers = vec![
        Layer::Skip(SkipLayer { mandrel_rotation: 90.0 }),
        Layer::Hoop(HoopLayer { terminal: true }),
    ];
    let plan = planner::plan_wind(&definition(layers), true).unwrap();
    assert!(plan.commands.contains(&"; Layer 1 of 2: skip".to_string()));
    assert!(plan.commands.contains(&"; Layer 2 of 2: hoop".to_string()));

    let skip_only = vec![Layer::Skip(SkipLayer { mandrel_rotation: 90.0 })];
    let quiet = planner::plan_wind(&definition(skip_only), false).unwrap();
    assert_eq!(quiet.commands.iter().filter(|line| line.starts_with(';')).count(), 1);
}

#[test]
fn test_layers_after_terminal_are_not_planned() {
    let layers = vec![
        Layer::Hoop(HoopLayer { terminal: true }),
        Layer::Skip(SkipLayer { mandrel_rotation: 90.0 }),
        helical(3),
    ];
    let plan = planner::plan_wind(&definition(layers), false).unwrap();
    assert_eq!(plan.layers.len(), 1);
    assert_eq!(plan.rejected_after_terminal, 2);
    assert_eq!(plan.commands.last().map(String::as_str), Some("G0 Y36360 Z0"));
}

#[test]
fn test_mismatched_pattern_emits_no_motion() {
    // 45 degrees on this mandrel gives 24 circuits; 5 does not divide it
    let plan = planner::plan_wind(&definition(vec![helical(5)]), false).unwrap();
    assert_eq!(plan.commands.len(), 3);
    assert!(matches!(plan.layers[0].outcome, LayerOutcome::SoftSkip { .. }));
    assert_eq!(plan.total_time_s, 0.0);
}

#[test]
fn test_zero_pattern_number_fails_the_plan() {
    let err = planner::plan_wind(&definition(vec![helical(0)]), false).unwrap_err();
    assert!(matches!(err, DomainError::InvalidPatternNumber));
}

#[test]
fn test_zero_feed_rate_fails_first_move() {
    let mut definition = definition(vec![Layer::Hoop(HoopLayer { terminal: true })]);
    definition.default_feed_rate = 0.0;
    let err = planner::plan_wind(&definition, false).unwrap_err();
    assert!(matches!(err, DomainError::NonPositiveFeedRate(_)));
}

#[test]
fn test_non_positive_dimensions_fail_before_any_output() {
    let hoop = vec![Layer::Hoop(HoopLayer { terminal: true })];

    let mut zero_width = definition(hoop.clone());
    zero_width.tow_parameters.width = 0.0;
    let err = planner::plan_wind(&zero_width, false).unwrap_err();
    assert!(matches!(err, DomainError::InvalidParameter { name: "tow width", .. }));

    let mut negative_diameter = definition(hoop.clone());
    negative_diameter.mandrel_parameters.diameter = -10.0;
    let err = planner::plan_wind(&negative_diameter, false).unwrap_err();
    assert!(matches!(err, DomainError::InvalidParameter { name: "mandrel diameter", .. }));

    let mut no_length = definition(hoop);
    no_length.mandrel_parameters.wind_length = 0.0;
    let err = planner::plan_wind(&no_length, false).unwrap_err();
    assert!(matches!(err, DomainError::InvalidParameter { name: "mandrel wind length", .. }));
}

#[test]
fn test_huge_wind_length_is_an_error_not_a_panic() {
    let mut definition = definition(vec![Layer::Hoop(HoopLayer { terminal: true })]);
    definition.mandrel_parameters.wind_length = 1e20;
    let err = planner::plan_wind(&definition, false).unwrap_err();
    assert!(matches!(err, DomainError::TooManySegments(_)));
}

#[test]
fn test_last_position_is_deep_merge_of_moves() {
    let moves = [
        PartialCoordinate::new().mandrel(90.0),
        PartialCoordinate::new().carriage(2.5).delivery_head(-15.0),
        PartialCoordinate::new().mandrel(-30.0),
        PartialCoordinate::new().carriage(0.75),
        PartialCoordinate::new().delivery_head(4.0).mandrel(12.0),
    ];

    let mut machine = WinderMachine::new(MANDREL.diameter, false);
    machine.set_feed_rate(500.0);
    let mut expected = Coordinate::default();
    for partial in moves {
        machine.move_to(partial).unwrap();
        expected = expected.merged(&partial);
        assert!(machine.last_position().approx_eq(&expected, 1e-9));
    }
    assert!(machine.last_position().approx_eq(&Coordinate::new(0.75, 12.0, 4.0), 1e-9));
}

#[test]
fn test_plan_from_wind_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "layers": [
                {{"windType": "hoop", "terminal": false}},
                {{"windType": "helical", "windAngle": 45, "patternNumber": 3, "skipIndex": 1,
                  "lockDegrees": 180, "leadInMM": 10, "leadOutDegrees": 20}},
                {{"windType": "skip", "mandrelRotation": 45}},
                {{"windType": "hoop", "terminal": true}}
            ],
            "mandrelParameters": {{"diameter": 10, "windLength": 100}},
            "towParameters": {{"width": 1, "thickness": 0.1}},
            "defaultFeedRate": 2000
        }}"#
    )
    .unwrap();

    let definition = load_wind_file(file.path()).unwrap();
    let plan = planner::plan_wind(&definition, false).unwrap();
    let kinds: Vec<LayerKind> = plan.layers.iter().map(|report| report.kind).collect();
    assert_eq!(kinds, [LayerKind::Hoop, LayerKind::Helical, LayerKind::Skip, LayerKind::Hoop]);
    assert!(plan.layers.iter().all(|report| report.outcome.is_planned()));
    assert_eq!(plan.commands[1], "G0 F2000");

    let summed: f64 = plan.layers.iter().map(|report| report.time_s).sum();
    assert!((summed - plan.total_time_s).abs() < 1e-6);
}
