// src/planner/layers.rs - Waypoint generation for each layer type
use super::DomainError;
use super::machine::WinderMachine;
use std::f64::consts::PI;
use winder_shared::{
    HelicalLayer, HoopLayer, MandrelParameters, PartialCoordinate, SkipLayer, TowParameters,
};

/// Mandrel dwell at each end of a hoop layer.
const HOOP_LOCK_DEGREES: f64 = 180.0;

/// Delivery head offset applied before each helical pass starts moving.
const DELIVERY_HEAD_PASS_START_ANGLE: f64 = -10.0;

/// What a layer contributed to the program.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOutcome {
    Planned,
    /// The layer was left out; nothing was emitted for it.
    SoftSkip { reason: String },
}

impl LayerOutcome {
    pub fn is_planned(&self) -> bool {
        matches!(self, LayerOutcome::Planned)
    }
}

pub fn plan_hoop_layer(
    machine: &mut WinderMachine,
    layer: &HoopLayer,
    mandrel: &MandrelParameters,
    tow: &TowParameters,
) -> Result<LayerOutcome, DomainError> {
    let lock_degrees = HOOP_LOCK_DEGREES;

    // The diameter / width ratio is applied as an angle in radians directly.
    let wind_angle = 90.0 - (mandrel.diameter / tow.width).to_degrees();
    let mandrel_rotations = mandrel.wind_length / tow.width;
    let far_mandrel_position_degrees = lock_degrees + mandrel_rotations * 360.0;
    let far_lock_position_degrees = far_mandrel_position_degrees + lock_degrees;
    let near_mandrel_position_degrees = far_lock_position_degrees + mandrel_rotations * 360.0;
    let near_lock_position_degrees = near_mandrel_position_degrees + lock_degrees;

    machine.move_to(
        PartialCoordinate::new()
            .carriage(0.0)
            .mandrel(lock_degrees)
            .delivery_head(0.0),
    )?;
    machine.move_to(PartialCoordinate::new().delivery_head(-wind_angle))?;
    machine.move_to(
        PartialCoordinate::new()
            .carriage(mandrel.wind_length)
            .mandrel(far_mandrel_position_degrees),
    )?;
    machine.move_to(
        PartialCoordinate::new()
            .mandrel(far_lock_position_degrees)
            .delivery_head(0.0),
    )?;

    if layer.terminal {
        // the wind ends at the far end; no return leg
        return Ok(LayerOutcome::Planned);
    }

    machine.move_to(PartialCoordinate::new().delivery_head(wind_angle))?;
    machine.move_to(
        PartialCoordinate::new()
            .carriage(0.0)
            .mandrel(near_mandrel_position_degrees),
    )?;
    machine.move_to(
        PartialCoordinate::new()
            .mandrel(near_lock_position_degrees)
            .delivery_head(0.0),
    )?;
    machine.zero_axes(near_lock_position_degrees)?;

    Ok(LayerOutcome::Planned)
}

/// One direction of travel along the mandrel.
struct HalfPass {
    delivery_head_sign: f64,
    lead_in_end_mm: f64,
    full_pass_end_mm: f64,
}

pub fn plan_helical_layer(
    machine: &mut WinderMachine,
    layer: &HelicalLayer,
    mandrel: &MandrelParameters,
    tow: &TowParameters,
) -> Result<LayerOutcome, DomainError> {
    if layer.pattern_number == 0 {
        return Err(DomainError::InvalidPatternNumber);
    }

    let delivery_head_angle_degrees = -(90.0 - layer.wind_angle);
    let mandrel_circumference = PI * mandrel.diameter;
    let tow_arc_length = tow.width / layer.wind_angle.to_radians();
    let circuits = (mandrel_circumference / tow_arc_length).floor();

    tracing::info!("Doing helical wind, {} circuits", circuits);

    if !circuits.is_finite() || circuits < 1.0 {
        let reason = format!("no circuits fit on the mandrel (computed {})", circuits);
        tracing::warn!("Skipping helical layer: {}", reason);
        return Ok(LayerOutcome::SoftSkip { reason });
    }
    let num_circuits = circuits as u64;
    let pattern_number = u64::from(layer.pattern_number);

    if num_circuits % pattern_number != 0 {
        let reason = format!(
            "circuit number {} not divisible by pattern number {}",
            num_circuits, pattern_number
        );
        tracing::warn!("Skipping helical layer: {}", reason);
        return Ok(LayerOutcome::SoftSkip { reason });
    }

    let pattern_step_degrees = 360.0 / num_circuits as f64;
    let pass_rotation_mm = mandrel.wind_length * layer.wind_angle.to_radians();
    let pass_rotation_degrees = 360.0 * (pass_rotation_mm / mandrel_circumference);
    let pass_degrees_per_mm = pass_rotation_degrees / mandrel.wind_length;
    let number_of_patterns = num_circuits / pattern_number;
    let lead_in_degrees = pass_degrees_per_mm * layer.lead_in_mm;
    let main_pass_degrees = pass_degrees_per_mm * (mandrel.wind_length - layer.lead_in_mm);
    let pass_turnaround_degrees =
        layer.lock_degrees - layer.lead_out_degrees - pass_rotation_degrees.rem_euclid(360.0);

    let half_passes = [
        HalfPass {
            delivery_head_sign: 1.0,
            lead_in_end_mm: layer.lead_in_mm,
            full_pass_end_mm: mandrel.wind_length,
        },
        HalfPass {
            delivery_head_sign: -1.0,
            lead_in_end_mm: mandrel.wind_length - layer.lead_in_mm,
            full_pass_end_mm: 0.0,
        },
    ];

    let mut mandrel_position_degrees = 0.0;

    for _pattern in 0..number_of_patterns {
        for _in_pattern in 0..pattern_number {
            for pass in &half_passes {
                machine.move_to(
                    PartialCoordinate::new()
                        .mandrel(mandrel_position_degrees)
                        .delivery_head(0.0),
                )?;
                machine.move_to(
                    PartialCoordinate::new()
                        .delivery_head(pass.delivery_head_sign * DELIVERY_HEAD_PASS_START_ANGLE),
                )?;

                mandrel_position_degrees += lead_in_degrees;
                machine.move_to(
                    PartialCoordinate::new()
                        .carriage(pass.lead_in_end_mm)
                        .mandrel(mandrel_position_degrees)
                        .delivery_head(pass.delivery_head_sign * delivery_head_angle_degrees),
                )?;

                mandrel_position_degrees += main_pass_degrees;
                machine.move_to(
                    PartialCoordinate::new()
                        .carriage(pass.full_pass_end_mm)
                        .mandrel(mandrel_position_degrees),
                )?;

                mandrel_position_degrees += pass_turnaround_degrees;
            }

            mandrel_position_degrees +=
                pattern_step_degrees * num_circuits as f64 / pattern_number as f64;
        }

        mandrel_position_degrees += pattern_step_degrees;
    }

    mandrel_position_degrees += layer.lock_degrees;
    machine.move_to(
        PartialCoordinate::new()
            .mandrel(mandrel_position_degrees)
            .delivery_head(0.0),
    )?;
    machine.zero_axes(mandrel_position_degrees)?;

    Ok(LayerOutcome::Planned)
}

pub fn plan_skip_layer(
    machine: &mut WinderMachine,
    layer: &SkipLayer,
) -> Result<LayerOutcome, DomainError> {
    machine.move_to(
        PartialCoordinate::new()
            .carriage(0.0)
            .mandrel(layer.mandrel_rotation)
            .delivery_head(0.0),
    )?;
    machine.set_position(PartialCoordinate::new().mandrel(0.0))?;
    Ok(LayerOutcome::Planned)
}
