use crate::engine::config::AnnealingSchedule;

/// Default map resolution in Angstroms for synthesis and diagnostics.
pub const DEFAULT_RESOLUTION: f64 = 3.0;

/// Values used for every parameter the user leaves unset.
pub struct DefaultsConfig {
    pub resolution: f64,
    pub schedule: AnnealingSchedule,
    pub post_fit_cc: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            schedule: AnnealingSchedule::default(),
            post_fit_cc: true,
        }
    }
}
