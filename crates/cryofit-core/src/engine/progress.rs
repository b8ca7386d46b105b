/// Events emitted while a long-running stage advances.
#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// One annealing temperature finished.
    CycleFinished { temperature: f64, energy: f64 },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Brackets `body` with `PhaseStart`/`PhaseFinish`. The finish event is
    /// sent even when `body` fails.
    pub fn phase<T>(&self, name: &'static str, body: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { name });
        let out = body();
        self.report(Progress::PhaseFinish);
        out
    }
}
