//! # Cent Meter
//!
//! A one-line text meter for a cents error, used for each bin of the
//! error chart.
//!
//! ```text
//! -50 [.........|..*......] +50
//! ```

/// Cents shown at either end of the meter. Larger errors pin to the edge.
const METER_RANGE: f64 = 50.0;

/// Cells on each side of the centre mark.
const HALF_WIDTH: usize = 10;

/// Text cent meter for one error value.
pub struct CentMeter {
    cents: Option<f64>,
    tolerance_cents: f64,
}

impl CentMeter {
    /// # Arguments
    /// * `cents` - Error in cents (None for a gap)
    /// * `tolerance_cents` - Errors within this render as `*`, beyond it as `!`
    pub fn new(cents: Option<f64>, tolerance_cents: f64) -> Self {
        Self { cents, tolerance_cents }
    }

    pub fn render(&self) -> String {
        let mut cells = vec!['.'; HALF_WIDTH * 2 + 1];
        cells[HALF_WIDTH] = '|';
        if let Some(cents) = self.cents {
            let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
            let offset = (clamped / METER_RANGE * HALF_WIDTH as f64).round() as i64;
            let index = (HALF_WIDTH as i64 + offset) as usize;
            cells[index] = if cents.abs() <= self.tolerance_cents { '*' } else { '!' };
        }
        format!(
            "-{range:.0} [{}] +{range:.0}",
            cells.into_iter().collect::<String>(),
            range = METER_RANGE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centred_needle() {
        assert_eq!(CentMeter::new(Some(0.0), 40.0).render(), "-50 [..........*..........] +50");
    }

    #[test]
    fn out_of_tolerance_pins_to_edge() {
        assert_eq!(CentMeter::new(Some(-300.0), 40.0).render(), "-50 [!.........|..........] +50");
    }

    #[test]
    fn gap_has_no_needle() {
        assert_eq!(CentMeter::new(None, 40.0).render(), "-50 [..........|..........] +50");
    }
}
