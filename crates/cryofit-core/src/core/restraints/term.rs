use std::ops::{Add, AddAssign};

/// Geometry restraint energy split by restraint kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RestraintEnergy {
    pub bond: f64,
    pub angle: f64,
    pub nonbonded: f64,
}

impl RestraintEnergy {
    pub fn new(bond: f64, angle: f64, nonbonded: f64) -> Self {
        Self {
            bond,
            angle,
            nonbonded,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.nonbonded
    }
}

impl Add for RestraintEnergy {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            nonbonded: self.nonbonded + rhs.nonbonded,
        }
    }
}

impl AddAssign for RestraintEnergy {
    fn add_assign(&mut self, rhs: Self) {
        self.bond += rhs.bond;
        self.angle += rhs.angle;
        self.nonbonded += rhs.nonbonded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_all_terms() {
        let term = RestraintEnergy::new(1.5, -2.0, 0.5);
        assert_eq!(term.total(), 0.0);
    }

    #[test]
    fn add_assign_accumulates_each_term() {
        let mut term = RestraintEnergy::new(1.0, 2.0, 3.0);
        term += RestraintEnergy::new(0.5, 0.5, 0.5);
        assert_eq!(term, RestraintEnergy::new(1.5, 2.5, 3.5));
        assert_eq!(term + RestraintEnergy::default(), term);
    }
}
