//! Machine coordinate model: three axes, full positions and partial move requests.

use std::fmt;
use std::ops::{Index, IndexMut};

/// The three independently addressable axes of the winder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Linear carriage travelling along the mandrel.
    Carriage,
    /// Rotary mandrel (the spool being wound).
    Mandrel,
    /// Rotary fiber delivery head.
    DeliveryHead,
}

impl Axis {
    /// All axes in wire order (X, Y, Z).
    pub const ALL: [Axis; 3] = [Axis::Carriage, Axis::Mandrel, Axis::DeliveryHead];

    /// One-letter code used on the wire.
    pub fn letter(self) -> char {
        match self {
            Axis::Carriage => 'X',
            Axis::Mandrel => 'Y',
            Axis::DeliveryHead => 'Z',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'X' => Some(Axis::Carriage),
            'Y' => Some(Axis::Mandrel),
            'Z' => Some(Axis::DeliveryHead),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Carriage => "carriage",
            Axis::Mandrel => "mandrel",
            Axis::DeliveryHead => "delivery head",
        };
        f.write_str(name)
    }
}

/// A position on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub carriage: f64,
    pub mandrel: f64,
    pub delivery_head: f64,
}

impl Coordinate {
    pub fn new(carriage: f64, mandrel: f64, delivery_head: f64) -> Self {
        Self { carriage, mandrel, delivery_head }
    }

    /// Returns a copy with every axis present in `partial` overwritten.
    pub fn merged(&self, partial: &PartialCoordinate) -> Coordinate {
        let mut merged = *self;
        for (axis, value) in partial.axes() {
            merged[axis] = value;
        }
        merged
    }

    pub fn approx_eq(&self, other: &Coordinate, tolerance: f64) -> bool {
        Axis::ALL
            .iter()
            .all(|&axis| (self[axis] - other[axis]).abs() <= tolerance)
    }
}

impl Index<Axis> for Coordinate {
    type Output = f64;

    fn index(&self, axis: Axis) -> &f64 {
        match axis {
            Axis::Carriage => &self.carriage,
            Axis::Mandrel => &self.mandrel,
            Axis::DeliveryHead => &self.delivery_head,
        }
    }
}

impl IndexMut<Axis> for Coordinate {
    fn index_mut(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::Carriage => &mut self.carriage,
            Axis::Mandrel => &mut self.mandrel,
            Axis::DeliveryHead => &mut self.delivery_head,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.carriage, self.mandrel, self.delivery_head)
    }
}

/// A relative move request: only the axes that are set change.
///
/// Built with the chained setters:
///
/// ```
/// use winder_shared::coordinate::{Axis, PartialCoordinate};
/// let target = PartialCoordinate::new().carriage(0.0).mandrel(180.0);
/// assert_eq!(target.get(Axis::Mandrel), Some(180.0));
/// assert_eq!(target.get(Axis::DeliveryHead), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialCoordinate {
    carriage: Option<f64>,
    mandrel: Option<f64>,
    delivery_head: Option<f64>,
}

impl PartialCoordinate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn carriage(self, value: f64) -> Self {
        self.with(Axis::Carriage, value)
    }

    pub fn mandrel(self, value: f64) -> Self {
        self.with(Axis::Mandrel, value)
    }

    pub fn delivery_head(self, value: f64) -> Self {
        self.with(Axis::DeliveryHead, value)
    }

    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        *self.slot(axis) = Some(value);
        self
    }

    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::Carriage => self.carriage,
            Axis::Mandrel => self.mandrel,
            Axis::DeliveryHead => self.delivery_head,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.carriage.is_none() && self.mandrel.is_none() && self.delivery_head.is_none()
    }

    /// Present axes in wire order.
    pub fn axes(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL
            .into_iter()
            .filter_map(move |axis| self.get(axis).map(|value| (axis, value)))
    }

    fn slot(&mut self, axis: Axis) -> &mut Option<f64> {
        match axis {
            Axis::Carriage => &mut self.carriage,
            Axis::Mandrel => &mut self.mandrel,
            Axis::DeliveryHead => &mut self.delivery_head,
        }
    }
}

impl From<Coordinate> for PartialCoordinate {
    fn from(coordinate: Coordinate) -> Self {
        Self {
            carriage: Some(coordinate.carriage),
            mandrel: Some(coordinate.mandrel),
            delivery_head: Some(coordinate.delivery_head),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_letters_are_fixed() {
        assert_eq!(Axis::Carriage.letter(), 'X');
        assert_eq!(Axis::Mandrel.letter(), 'Y');
        assert_eq!(Axis::DeliveryHead.letter(), 'Z');
        assert_eq!(Axis::from_letter('y'), Some(Axis::Mandrel));
        assert_eq!(Axis::from_letter('E'), None);
    }

    #[test]
    fn test_merge_keeps_absent_axes() {
        let start = Coordinate::new(1.0, 2.0, 3.0);
        let merged = start.merged(&PartialCoordinate::new().mandrel(90.0));
        assert_eq!(merged, Coordinate::new(1.0, 90.0, 3.0));
    }

    #[test]
    fn test_partial_axes_iterate_in_wire_order() {
        let partial = PartialCoordinate::new().delivery_head(5.0).carriage(1.0);
        let axes: Vec<_> = partial.axes().collect();
        assert_eq!(axes, vec![(Axis::Carriage, 1.0), (Axis::DeliveryHead, 5.0)]);
        assert!(PartialCoordinate::new().is_empty());
    }

    #[test]
    fn test_display_matches_brace_format() {
        assert_eq!(Coordinate::new(0.0, 180.5, -3.0).to_string(), "{0 180.5 -3}");
    }
}
