use super::DomainError;
use winder_shared::Coordinate;

/// Evenly spaced coordinates from `start` to `end`, both ends included.
///
/// A single step jumps straight to `end`.
pub fn interpolate_coordinates(
    start: &Coordinate,
    end: &Coordinate,
    steps: usize,
) -> Result<Vec<Coordinate>, DomainError> {
    Ok(interpolation_steps(start, end, steps)?.collect())
}

/// Lazy form of [`interpolate_coordinates`]; waypoints are computed as they
/// are consumed.
pub fn interpolation_steps(
    start: &Coordinate,
    end: &Coordinate,
    steps: usize,
) -> Result<impl Iterator<Item = Coordinate> + use<>, DomainError> {
    if steps == 0 {
        return Err(DomainError::InvalidSteps(steps));
    }

    let (start, end) = (*start, *end);
    let divisor = steps.saturating_sub(1).max(1) as f64;
    let carriage_step = (end.carriage - start.carriage) / divisor;
    let mandrel_step = (end.mandrel - start.mandrel) / divisor;
    let delivery_head_step = (end.delivery_head - start.delivery_head) / divisor;

    Ok((0..steps).map(move |step| {
        // last waypoint is the exact target, not an accumulated approximation
        if step + 1 == steps {
            return end;
        }
        let step = step as f64;
        Coordinate::new(
            start.carriage + step * carriage_step,
            start.mandrel + step * mandrel_step,
            start.delivery_head + step * delivery_head_step,
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step_is_end() {
        let start = Coordinate::new(0.0, 0.0, 0.0);
        let end = Coordinate::new(5.0, 90.0, -10.0);
        assert_eq!(interpolate_coordinates(&start, &end, 1).unwrap(), vec![end]);
    }

    #[test]
    fn test_zero_steps_is_rejected() {
        let origin = Coordinate::default();
        assert!(matches!(
            interpolate_coordinates(&origin, &origin, 0),
            Err(DomainError::InvalidSteps(0))
        ));
    }

    #[test]
    fn test_endpoints_and_spacing() {
        let start = Coordinate::new(0.0, 180.0, 0.0);
        let end = Coordinate::new(10.0, 380.0, -20.0);
        let points = interpolate_coordinates(&start, &end, 11).unwrap();
        assert_eq!(points.len(), 11);
        assert_eq!(points[0], start);
        assert_eq!(points[10], end);
        assert!(points[5].approx_eq(&Coordinate::new(5.0, 280.0, -10.0), 1e-9));
    }

    #[test]
    fn test_lazy_steps_match_collected() {
        let start = Coordinate::new(0.0, 0.0, 0.0);
        let end = Coordinate::new(1e12, 3.0, -1.0);
        let mut lazy = interpolation_steps(&start, &end, usize::MAX).unwrap();
        assert_eq!(lazy.next(), Some(start));
        assert!(interpolation_steps(&start, &end, 0).is_err());

        let collected = interpolate_coordinates(&start, &end, 4).unwrap();
        let streamed: Vec<Coordinate> = interpolation_steps(&start, &end, 4).unwrap().collect();
        assert_eq!(collected, streamed);
    }

    #[test]
    fn test_two_steps_are_start_and_end() {
        let start = Coordinate::new(1.0, 2.0, 3.0);
        let end = Coordinate::new(0.3, 0.1, 0.7);
        assert_eq!(interpolate_coordinates(&start, &end, 2).unwrap(), vec![start, end]);
    }
}
