// # Wind Planner
//
// Turns a `WindDefinition` into the G-code program for the winder.
//
// - `machine`: the position-tracking emitter every layer writes through.
// - `layers`: hoop, helical and skip layer waypoint generation.
// - `helpers`: coordinate interpolation shared by the above.
//
// Planning is synchronous and does no I/O; the resulting command list is
// handed to `communication::MarlinPort` or written to a file by the CLI.

pub mod helpers;
pub mod layers;
pub mod machine;

pub use helpers::{interpolate_coordinates, interpolation_steps};
pub use layers::{LayerOutcome, plan_helical_layer, plan_hoop_layer, plan_skip_layer};
pub use machine::WinderMachine;

use thiserror::Error;
use winder_shared::gcode::ParameterHeader;
use winder_shared::{Axis, Layer, LayerKind, WindDefinition};

/// Initial move; written raw because no feed rate is active yet.
pub const ZERO_MOVE_COMMAND: &str = "G0 X0 Y0 Z0";

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Steps must be >= 1, got {0}")]
    InvalidSteps(usize),
    #[error("Feed rate must be positive before moving, currently {0}")]
    NonPositiveFeedRate(f64),
    #[error("Position names no axes")]
    EmptyPosition,
    #[error("{axis} target {value} is not a finite number")]
    NonFiniteTarget { axis: Axis, value: f64 },
    #[error("Carriage move of {0} mm needs too many segments")]
    TooManySegments(f64),
    #[error("{name} must be a positive number, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Helical pattern number must be >= 1")]
    InvalidPatternNumber,
    #[error("Failed to encode parameter header: {0}")]
    Header(#[from] serde_json::Error),
}

/// Per-layer diagnostics gathered while planning.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerReport {
    pub index: usize,
    pub kind: LayerKind,
    pub outcome: LayerOutcome,
    pub time_s: f64,
    pub tow_m: f64,
}

#[derive(Debug, Clone)]
pub struct WindPlan {
    pub commands: Vec<String>,
    pub layers: Vec<LayerReport>,
    pub total_time_s: f64,
    pub total_tow_m: f64,
    /// Layers that followed a terminal hoop and were not planned.
    pub rejected_after_terminal: usize,
}

fn check_positive(name: &'static str, value: f64) -> Result<(), DomainError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DomainError::InvalidParameter { name, value })
    }
}

/// Plans every layer of `definition` in order against a single machine.
pub fn plan_wind(definition: &WindDefinition, verbose: bool) -> Result<WindPlan, DomainError> {
    let mandrel = &definition.mandrel_parameters;
    let tow = &definition.tow_parameters;
    check_positive("mandrel diameter", mandrel.diameter)?;
    check_positive("mandrel wind length", mandrel.wind_length)?;
    check_positive("tow width", tow.width)?;
    let mut machine = WinderMachine::new(mandrel.diameter, verbose);

    machine.add_raw_command(ZERO_MOVE_COMMAND);
    machine.set_feed_rate(definition.default_feed_rate);
    machine.add_raw_command(ParameterHeader::new(*mandrel, *tow).to_comment()?);

    let layer_count = definition.layers.len();
    let mut reports = Vec::with_capacity(layer_count);
    let mut encountered_terminal_layer = false;
    let mut rejected_after_terminal = 0;
    let mut cumulative_time_s = 0.0;
    let mut cumulative_tow_m = 0.0;

    for (index, layer) in definition.layers.iter().enumerate() {
        if encountered_terminal_layer {
            rejected_after_terminal = layer_count - index;
            tracing::warn!(
                "Attempting to plan {} layer(s) after a terminal layer, aborting",
                rejected_after_terminal
            );
            break;
        }

        let description = format!("Layer {} of {}: {}", index + 1, layer_count, layer.kind());
        tracing::info!("{}", description);
        if verbose {
            machine.insert_comment(&description);
        }

        let outcome = match layer {
            Layer::Hoop(hoop) => plan_hoop_layer(&mut machine, hoop, mandrel, tow)?,
            Layer::Helical(helical) => plan_helical_layer(&mut machine, helical, mandrel, tow)?,
            Layer::Skip(skip) => plan_skip_layer(&mut machine, skip)?,
        };
        encountered_terminal_layer = layer.is_terminal();

        let layer_time_s = machine.elapsed_time_s() - cumulative_time_s;
        let layer_tow_m = machine.tow_length_m() - cumulative_tow_m;
        tracing::info!("Layer time estimate: {:.1} seconds", layer_time_s);
        tracing::info!("Layer tow required: {:.3} meters", layer_tow_m);
        cumulative_time_s = machine.elapsed_time_s();
        cumulative_tow_m = machine.tow_length_m();

        reports.push(LayerReport {
            index,
            kind: layer.kind(),
            outcome,
            time_s: layer_time_s,
            tow_m: layer_tow_m,
        });
    }

    tracing::info!("Total time estimate: {:.1} seconds", cumulative_time_s);
    tracing::info!("Total tow required: {:.3} meters", cumulative_tow_m);

    Ok(WindPlan {
        commands: machine.into_commands(),
        layers: reports,
        total_time_s: cumulative_time_s,
        total_tow_m: cumulative_tow_m,
        rejected_after_terminal,
    })
}
