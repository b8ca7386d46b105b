use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_START_TEMPERATURE: f64 = 2000.0;
pub const DEFAULT_FINAL_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_COOL_RATE: f64 = 100.0;
pub const DEFAULT_NUMBER_OF_STEPS: usize = 1000;
pub const DEFAULT_UPDATE_GRADS_SHIFT: f64 = 0.0;
pub const DEFAULT_TIME_STEP: f64 = 0.0005;
pub const DEFAULT_RANDOM_SEED: u64 = 2679941;
pub const DEFAULT_MAP_WEIGHT: f64 = 100.0;
pub const DEFAULT_RESTRAINT_WEIGHT: f64 = 1.0;
/// Upper bound on the length of the temperature ladder.
pub const MAX_TEMPERATURE_CYCLES: usize = 100_000;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("Unknown parameter: '{0}'")]
    UnknownParameter(String),

    #[error("Ambiguous parameter '{key}', could be any of: {}", candidates.join(", "))]
    AmbiguousParameter {
        key: String,
        candidates: Vec<String>,
    },

    #[error("Malformed parameter argument: '{0}'")]
    MalformedParameter(String),

    #[error("Invalid parameter file {}: {reason}", path.display())]
    InvalidParameterFile { path: PathBuf, reason: String },

    #[error("Model file is not a recognized atomic-structure file: {0}")]
    UnrecognizedModelFile(PathBuf),
}

/// Relative weights of the two terms of the fitting target
/// `wc * E_geom + wx * E_map`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitWeights {
    /// `wx`, scales the density term.
    pub map: f64,
    /// `wc`, scales the stereochemical restraints.
    pub restraints: f64,
}

impl Default for FitWeights {
    fn default() -> Self {
        Self {
            map: DEFAULT_MAP_WEIGHT,
            restraints: DEFAULT_RESTRAINT_WEIGHT,
        }
    }
}

/// A validated simulated-annealing protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingSchedule {
    pub start_temperature: f64,
    pub final_temperature: f64,
    pub cool_rate: f64,
    pub number_of_steps: usize,
    pub update_grads_shift: f64,
    pub interleave_minimization: bool,
    /// Integration time step in picoseconds.
    pub time_step: f64,
    pub random_seed: u64,
    pub weights: FitWeights,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            start_temperature: DEFAULT_START_TEMPERATURE,
            final_temperature: DEFAULT_FINAL_TEMPERATURE,
            cool_rate: DEFAULT_COOL_RATE,
            number_of_steps: DEFAULT_NUMBER_OF_STEPS,
            update_grads_shift: DEFAULT_UPDATE_GRADS_SHIFT,
            interleave_minimization: false,
            time_step: DEFAULT_TIME_STEP,
            random_seed: DEFAULT_RANDOM_SEED,
            weights: FitWeights::default(),
        }
    }
}

impl AnnealingSchedule {
    pub fn builder() -> AnnealingScheduleBuilder {
        AnnealingScheduleBuilder::new()
    }

    /// The temperature ladder `start, start - cool_rate, ...` down to and
    /// including the last value not below `final_temperature`.
    pub fn temperatures(&self) -> Vec<f64> {
        let cycles = self.cycle_span().min(MAX_TEMPERATURE_CYCLES as f64) as usize;
        (0..cycles)
            .map(|k| {
                let t = self.start_temperature - k as f64 * self.cool_rate;
                t.max(self.final_temperature)
            })
            .collect()
    }

    // Number of ladder rungs, unbounded. Round-off is tolerated so that
    // e.g. 2000 - 20 * 100 still reaches 0.
    fn cycle_span(&self) -> f64 {
        ((self.start_temperature - self.final_temperature + 1e-9) / self.cool_rate).floor() + 1.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = |parameter: &'static str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    parameter,
                    reason: format!("must be finite, got {value}"),
                })
            }
        };
        finite("start_temperature", self.start_temperature)?;
        finite("final_temperature", self.final_temperature)?;
        finite("cool_rate", self.cool_rate)?;
        finite("update_grads_shift", self.update_grads_shift)?;
        finite("time_step", self.time_step)?;
        finite("map_weight", self.weights.map)?;
        finite("restraint_weight", self.weights.restraints)?;

        if self.start_temperature <= self.final_temperature {
            return Err(ConfigError::InvalidValue {
                parameter: "start_temperature",
                reason: format!(
                    "must exceed final_temperature ({} <= {})",
                    self.start_temperature, self.final_temperature
                ),
            });
        }
        if self.final_temperature < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "final_temperature",
                reason: "must not be negative".to_string(),
            });
        }
        if self.cool_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "cool_rate",
                reason: "must be positive".to_string(),
            });
        }
        if self.cycle_span() > MAX_TEMPERATURE_CYCLES as f64 {
            return Err(ConfigError::InvalidValue {
                parameter: "cool_rate",
                reason: format!(
                    "cooling from {} to {} K at {} K per cycle needs more than {} cycles",
                    self.start_temperature,
                    self.final_temperature,
                    self.cool_rate,
                    MAX_TEMPERATURE_CYCLES
                ),
            });
        }
        if self.number_of_steps == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "number_of_steps",
                reason: "must be positive".to_string(),
            });
        }
        if self.time_step <= 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "time_step",
                reason: "must be positive".to_string(),
            });
        }
        if self.update_grads_shift < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "update_grads_shift",
                reason: "must not be negative".to_string(),
            });
        }
        if self.weights.map < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "map_weight",
                reason: "must not be negative".to_string(),
            });
        }
        if self.weights.restraints < 0.0 {
            return Err(ConfigError::InvalidValue {
                parameter: "restraint_weight",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds an [`AnnealingSchedule`]; unset fields take the default protocol.
#[derive(Default)]
pub struct AnnealingScheduleBuilder {
    start_temperature: Option<f64>,
    final_temperature: Option<f64>,
    cool_rate: Option<f64>,
    number_of_steps: Option<usize>,
    update_grads_shift: Option<f64>,
    interleave_minimization: Option<bool>,
    time_step: Option<f64>,
    random_seed: Option<u64>,
    map_weight: Option<f64>,
    restraint_weight: Option<f64>,
}

impl AnnealingScheduleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_temperature(mut self, kelvin: f64) -> Self {
        self.start_temperature = Some(kelvin);
        self
    }
    pub fn final_temperature(mut self, kelvin: f64) -> Self {
        self.final_temperature = Some(kelvin);
        self
    }
    pub fn cool_rate(mut self, kelvin_per_cycle: f64) -> Self {
        self.cool_rate = Some(kelvin_per_cycle);
        self
    }
    pub fn number_of_steps(mut self, steps: usize) -> Self {
        self.number_of_steps = Some(steps);
        self
    }
    pub fn update_grads_shift(mut self, angstroms: f64) -> Self {
        self.update_grads_shift = Some(angstroms);
        self
    }
    pub fn interleave_minimization(mut self, enabled: bool) -> Self {
        self.interleave_minimization = Some(enabled);
        self
    }
    pub fn time_step(mut self, picoseconds: f64) -> Self {
        self.time_step = Some(picoseconds);
        self
    }
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
    pub fn map_weight(mut self, wx: f64) -> Self {
        self.map_weight = Some(wx);
        self
    }
    pub fn restraint_weight(mut self, wc: f64) -> Self {
        self.restraint_weight = Some(wc);
        self
    }

    pub fn build(self) -> Result<AnnealingSchedule, ConfigError> {
        let defaults = AnnealingSchedule::default();
        let schedule = AnnealingSchedule {
            start_temperature: self.start_temperature.unwrap_or(defaults.start_temperature),
            final_temperature: self.final_temperature.unwrap_or(defaults.final_temperature),
            cool_rate: self.cool_rate.unwrap_or(defaults.cool_rate),
            number_of_steps: self.number_of_steps.unwrap_or(defaults.number_of_steps),
            update_grads_shift: self
                .update_grads_shift
                .unwrap_or(defaults.update_grads_shift),
            interleave_minimization: self
                .interleave_minimization
                .unwrap_or(defaults.interleave_minimization),
            time_step: self.time_step.unwrap_or(defaults.time_step),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            weights: FitWeights {
                map: self.map_weight.unwrap_or(defaults.weights.map),
                restraints: self.restraint_weight.unwrap_or(defaults.weights.restraints),
            },
        };
        schedule.validate()?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_protocol_is_valid() {
        let schedule = AnnealingSchedule::default();
        assert!(schedule.validate().is_ok());
        assert!(schedule.start_temperature > schedule.final_temperature);
        assert!(schedule.number_of_steps > 0);
        assert!(schedule.cool_rate > 0.0);
        assert_eq!(schedule.weights.map, 100.0);
        assert_eq!(schedule.weights.restraints, 1.0);
        assert!(!schedule.interleave_minimization);
    }

    #[test]
    fn builder_without_overrides_matches_defaults() {
        let built = AnnealingSchedule::builder().build().unwrap();
        assert_eq!(built, AnnealingSchedule::default());
    }

    #[test]
    fn default_ladder_runs_from_start_to_final_inclusive() {
        let ladder = AnnealingSchedule::default().temperatures();
        assert_eq!(ladder.len(), 21);
        assert_eq!(ladder[0], 2000.0);
        assert_eq!(ladder[1], 1900.0);
        assert_eq!(*ladder.last().unwrap(), 0.0);
    }

    #[test]
    fn ladder_stops_before_overshooting_final_temperature() {
        let schedule = AnnealingSchedule::builder()
            .start_temperature(300.0)
            .final_temperature(50.0)
            .cool_rate(100.0)
            .build()
            .unwrap();
        assert_eq!(schedule.temperatures(), vec![300.0, 200.0, 100.0]);
    }

    #[test]
    fn start_must_exceed_final() {
        let err = AnnealingSchedule::builder()
            .start_temperature(100.0)
            .final_temperature(100.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "start_temperature",
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_positive_rates_and_steps() {
        assert!(AnnealingSchedule::builder().cool_rate(0.0).build().is_err());
        assert!(AnnealingSchedule::builder().number_of_steps(0).build().is_err());
        assert!(AnnealingSchedule::builder().time_step(-1.0).build().is_err());
    }

    #[test]
    fn tiny_cool_rate_is_rejected_instead_of_building_a_huge_ladder() {
        let err = AnnealingSchedule::builder().cool_rate(1e-9).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "cool_rate",
                ..
            }
        ));

        let at_limit = AnnealingSchedule::builder()
            .start_temperature((MAX_TEMPERATURE_CYCLES - 1) as f64)
            .cool_rate(1.0)
            .build()
            .unwrap();
        assert_eq!(at_limit.temperatures().len(), MAX_TEMPERATURE_CYCLES);
    }

    #[test]
    fn rejects_negative_weights_but_accepts_zero() {
        assert!(AnnealingSchedule::builder().map_weight(-1.0).build().is_err());
        assert!(
            AnnealingSchedule::builder()
                .restraint_weight(-0.5)
                .build()
                .is_err()
        );
        assert!(AnnealingSchedule::builder().map_weight(0.0).build().is_ok());
    }

    #[test]
    fn ambiguous_parameter_message_lists_candidates() {
        let err = ConfigError::AmbiguousParameter {
            key: "file".to_string(),
            candidates: vec!["a.b".to_string(), "c.d".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous parameter 'file', could be any of: a.b, c.d"
        );
    }
}
