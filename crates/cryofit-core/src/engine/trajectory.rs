use nalgebra::Point3;

/// Receives the coordinates the engine reports after each temperature.
pub trait StateSink {
    fn record(&mut self, sites: &[Point3<f64>]);
}

/// Ordered, append-only snapshots of a fit. The first entry is the state the
/// fit started from.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<Vec<Point3<f64>>>,
}

impl Trajectory {
    pub fn new(initial: Vec<Point3<f64>>) -> Self {
        Self {
            states: vec![initial],
        }
    }

    pub fn push(&mut self, sites: Vec<Point3<f64>>) {
        self.states.push(sites);
    }

    /// Number of snapshots, the starting state included. Never zero.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[Vec<Point3<f64>>] {
        &self.states
    }
}

impl StateSink for Trajectory {
    fn record(&mut self, sites: &[Point3<f64>]) {
        self.push(sites.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_keep_call_order() {
        let a = vec![Point3::new(0.0, 0.0, 0.0)];
        let b = vec![Point3::new(1.0, 0.0, 0.0)];
        let c = vec![Point3::new(2.0, 0.0, 0.0)];

        let mut trajectory = Trajectory::new(a.clone());
        trajectory.record(&b);
        trajectory.record(&c);

        assert_eq!(trajectory.state_count(), 3);
        assert_eq!(trajectory.states(), &[a, b, c]);
    }
}
