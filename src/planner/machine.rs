// src/planner/machine.rs - Position-tracking G-code emitter for the winder
use super::DomainError;
use super::helpers::interpolation_steps;
use std::f64::consts::PI;
use winder_shared::gcode;
use winder_shared::{Axis, Coordinate, PartialCoordinate};

/// Upper bound on the waypoints a single carriage move may be split into.
pub const MAX_SEGMENTS_PER_MOVE: usize = 10_000_000;

/// Tracks where the machine is believed to be and turns move requests into
/// G-code, keeping running estimates of wind time and tow consumption.
///
/// Every emitted motion command covers at most roughly one unit of carriage
/// travel: carriage moves are split into segments before they are written.
#[derive(Debug, Clone)]
pub struct WinderMachine {
    verbose: bool,
    commands: Vec<String>,
    feed_rate_mm_per_min: f64,
    total_time_s: f64,
    total_tow_length_mm: f64,
    last_position: Coordinate,
    mandrel_diameter: f64,
}

impl WinderMachine {
    pub fn new(mandrel_diameter: f64, verbose: bool) -> Self {
        Self {
            verbose,
            commands: Vec::new(),
            feed_rate_mm_per_min: 0.0,
            total_time_s: 0.0,
            total_tow_length_mm: 0.0,
            last_position: Coordinate::default(),
            mandrel_diameter,
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<String> {
        self.commands
    }

    pub fn last_position(&self) -> Coordinate {
        self.last_position
    }

    pub fn feed_rate(&self) -> f64 {
        self.feed_rate_mm_per_min
    }

    pub fn elapsed_time_s(&self) -> f64 {
        self.total_time_s
    }

    pub fn tow_length_mm(&self) -> f64 {
        self.total_tow_length_mm
    }

    pub fn tow_length_m(&self) -> f64 {
        self.total_tow_length_mm / 1000.0
    }

    /// Appends a line verbatim. Nothing is tracked.
    pub fn add_raw_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn insert_comment(&mut self, text: &str) {
        self.commands.push(gcode::comment(text));
    }

    pub fn set_feed_rate(&mut self, feed_rate_mm_per_min: f64) {
        self.feed_rate_mm_per_min = feed_rate_mm_per_min;
        self.commands.push(gcode::feed_rate_command(feed_rate_mm_per_min));
    }

    /// Moves to `position`, splitting the move into unit carriage segments
    /// whenever the carriage changes.
    pub fn move_to(&mut self, position: PartialCoordinate) -> Result<(), DomainError> {
        self.check_move(&position)?;
        let end = self.last_position.merged(&position);

        if self.last_position.carriage == end.carriage {
            if self.verbose {
                self.insert_comment(&format!(
                    "Move from {} to {} as a simple move",
                    self.last_position, end
                ));
            }
            return self.move_segment(position);
        }

        let distance = (self.last_position.carriage - end.carriage).abs();
        let num_segments = segment_count(distance)?;

        if self.verbose {
            self.insert_comment(&format!(
                "Move from {} to {} in {} segments",
                self.last_position, end, num_segments
            ));
        }

        for waypoint in interpolation_steps(&self.last_position, &end, num_segments)? {
            self.move_segment(waypoint.into())?;
        }
        Ok(())
    }

    /// Emits a single `G0` for the axes in `position` and accounts for it.
    ///
    /// Time uses the root of the summed squared axis deltas (mixed units, the
    /// way the controller applies the feed rate). Tow length counts carriage
    /// travel and mandrel surface travel, never delivery head rotation.
    pub fn move_segment(&mut self, position: PartialCoordinate) -> Result<(), DomainError> {
        self.check_move(&position)?;
        let mut total_distance_sq = 0.0;
        let mut tow_length_sq = 0.0;

        for (axis, value) in position.axes() {
            let move_component = value - self.last_position[axis];
            total_distance_sq += move_component * move_component;

            match axis {
                Axis::Mandrel => {
                    let arc_length_mm = move_component / 360.0 * self.mandrel_diameter * PI;
                    tow_length_sq += arc_length_mm * arc_length_mm;
                }
                Axis::Carriage => tow_length_sq += move_component * move_component,
                Axis::DeliveryHead => {}
            }

            self.last_position[axis] = value;
        }

        self.total_time_s += total_distance_sq.sqrt() / self.feed_rate_mm_per_min * 60.0;
        self.total_tow_length_mm += tow_length_sq.sqrt();
        self.commands.push(gcode::move_command(&position));
        Ok(())
    }

    /// Redefines the current coordinates without moving.
    pub fn set_position(&mut self, position: PartialCoordinate) -> Result<(), DomainError> {
        if position.is_empty() {
            return Err(DomainError::EmptyPosition);
        }
        check_finite(&position)?;
        for (axis, value) in position.axes() {
            self.last_position[axis] = value;
        }
        self.commands.push(gcode::set_position_command(&position));
        Ok(())
    }

    /// Rebases the axes after a layer so the mandrel coordinate stays small.
    ///
    /// The extra full turn is real motion: the controller has to spin the
    /// mandrel once to reach the rebased angle.
    pub fn zero_axes(&mut self, current_angle_degrees: f64) -> Result<(), DomainError> {
        self.set_position(
            PartialCoordinate::new()
                .carriage(0.0)
                .mandrel(current_angle_degrees.rem_euclid(360.0))
                .delivery_head(0.0),
        )?;
        self.move_to(PartialCoordinate::new().mandrel(360.0))?;
        self.set_position(PartialCoordinate::new().mandrel(0.0))
    }

    fn check_move(&self, position: &PartialCoordinate) -> Result<(), DomainError> {
        if position.is_empty() {
            return Err(DomainError::EmptyPosition);
        }
        if !(self.feed_rate_mm_per_min > 0.0 && self.feed_rate_mm_per_min.is_finite()) {
            return Err(DomainError::NonPositiveFeedRate(self.feed_rate_mm_per_min));
        }
        check_finite(position)
    }
}

fn check_finite(position: &PartialCoordinate) -> Result<(), DomainError> {
    match position.axes().find(|(_, value)| !value.is_finite()) {
        Some((axis, value)) => Err(DomainError::NonFiniteTarget { axis, value }),
        None => Ok(()),
    }
}

/// Waypoints for a carriage move of `distance` mm: one per millimetre plus
/// the start.
fn segment_count(distance: f64) -> Result<usize, DomainError> {
    let rounded = distance.round_ties_even();
    if !(rounded < MAX_SEGMENTS_PER_MOVE as f64) {
        return Err(DomainError::TooManySegments(distance));
    }
    Ok(rounded as usize + 1)
}
