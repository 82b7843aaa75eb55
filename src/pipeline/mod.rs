//! Ordered, fail-fast step execution.
//!
//! A [`Script`] is a named list of steps. Steps run one at a time in the
//! order they were added; the first failure stops the script and is returned
//! as a [`StepError`] carrying the step name and its [`FailureKind`].
//! Steps that never ran are dropped, which releases anything they own.
//!
//! ```rust,ignore
//! use coreos_customizer::pipeline::{FailureKind, Script};
//!
//! Script::new("BuildCustomImage")
//!     .step("Download", FailureKind::Transfer, || download(&dest, url))
//!     .step("UnpackInitram", FailureKind::Extraction, || unpack_initram(&dest, &dir))
//!     .run()?;
//! ```

pub mod config;
pub mod paths;

use std::fmt;
use std::time::Instant;
use tracing::{error, info};

/// Which class of operation a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Downloading an artifact.
    Transfer,
    /// Decompressing or unpacking an archive or image.
    Extraction,
    /// Assembling a filesystem image or archive.
    Assembly,
    /// Removing temporary state.
    Cleanup,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transfer => "transfer",
            FailureKind::Extraction => "extraction",
            FailureKind::Assembly => "assembly",
            FailureKind::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// A failed step.
#[derive(Debug, thiserror::Error)]
#[error("{script}: step {step} failed ({kind})")]
pub struct StepError {
    pub script: String,
    pub step: String,
    pub kind: FailureKind,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

type Action<'a> = Box<dyn FnOnce() -> anyhow::Result<()> + 'a>;

/// One named unit of work in a [`Script`].
struct Step<'a> {
    name: String,
    kind: FailureKind,
    action: Action<'a>,
}

impl<'a> Step<'a> {
    fn new(
        name: impl Into<String>,
        kind: FailureKind,
        action: impl FnOnce() -> anyhow::Result<()> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            action: Box::new(action),
        }
    }
}

impl fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A named, ordered list of steps.
#[derive(Debug)]
pub struct Script<'a> {
    name: String,
    steps: Vec<Step<'a>>,
}

impl<'a> Script<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(
        mut self,
        name: impl Into<String>,
        kind: FailureKind,
        action: impl FnOnce() -> anyhow::Result<()> + 'a,
    ) -> Self {
        self.steps.push(Step::new(name, kind, action));
        self
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(self) -> Result<(), StepError> {
        let total = self.steps.len();
        let started = Instant::now();
        let mut steps = self.steps.into_iter();

        let mut index = 0;
        while let Some(step) = steps.next() {
            index += 1;
            info!(script = %self.name, step = %step.name, "[{}/{}] {}", index, total, step.name);

            if let Err(err) = (step.action)() {
                error!(
                    script = %self.name,
                    step = %step.name,
                    kind = %step.kind,
                    skipped = steps.len(),
                    "step failed"
                );
                return Err(StepError {
                    script: self.name,
                    step: step.name,
                    kind: step.kind,
                    source: err.into(),
                });
            }
        }

        info!(
            script = %self.name,
            steps = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "script finished"
        );
        Ok(())
    }
}
