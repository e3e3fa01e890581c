//! Runs an install plan one blocking call at a time.
//!
//! The frame loop calls `status_line()`, draws it, and only then calls
//! `advance()`, so the console always shows what the app is blocked on.

use std::fmt;
use std::fs;
use std::io;

use crate::error::SetupError;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::profiles::{InstallPlan, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Download,
    Extract,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Download => write!(f, "downloading"),
            Action::Extract => write!(f, "extracting"),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Completed { steps: usize },
    Aborted {
        step: String,
        action: Action,
        error: SetupError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fetch(usize),
    Extract(usize),
    Cleanup,
    Finished,
}

pub struct InstallRun<F: Fetcher, E: Extractor> {
    plan: InstallPlan,
    fetcher: F,
    extractor: E,
    phase: Phase,
}

impl<F: Fetcher, E: Extractor> InstallRun<F, E> {
    pub fn new(plan: InstallPlan, fetcher: F, extractor: E) -> Self {
        tracing::info!("Starting profile '{}' ({} steps)", plan.profile, plan.steps.len());
        let phase = if plan.steps.is_empty() {
            Phase::Cleanup
        } else {
            Phase::Fetch(0)
        };
        InstallRun {
            plan,
            fetcher,
            extractor,
            phase,
        }
    }

    #[cfg(test)]
    pub fn plan(&self) -> &InstallPlan {
        &self.plan
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// What the next `advance()` is about to do.
    pub fn status_line(&self) -> Option<String> {
        match self.phase {
            Phase::Fetch(i) => Some(format!("Downloading {}...", self.plan.steps[i].name)),
            Phase::Extract(i) => Some(format!("Extracting {}...", self.plan.steps[i].name)),
            Phase::Cleanup => Some("Cleaning files...".to_string()),
            Phase::Finished => None,
        }
    }

    fn after_step(&self, index: usize) -> Phase {
        if index + 1 < self.plan.steps.len() {
            Phase::Fetch(index + 1)
        } else {
            Phase::Cleanup
        }
    }

    fn abort(&mut self, index: usize, action: Action, error: SetupError) -> Outcome {
        let step = self.plan.steps[index].name.clone();
        tracing::error!("Error while {} {}: {}", action, step, error);
        self.phase = Phase::Finished;
        Outcome::Aborted { step, action, error }
    }

    /// Performs one blocking call. Returns the outcome once the run ends.
    pub fn advance(&mut self) -> Option<Outcome> {
        match self.phase {
            Phase::Fetch(i) => {
                let step = &self.plan.steps[i];
                match self.fetcher.fetch(&step.url, &step.destination, &step.trust_anchor) {
                    Ok(_) => {
                        self.phase = match step.kind {
                            StepKind::Archive => Phase::Extract(i),
                            StepKind::File => self.after_step(i),
                        };
                        None
                    }
                    Err(e) => Some(self.abort(i, Action::Download, e)),
                }
            }
            Phase::Extract(i) => {
                let step = &self.plan.steps[i];
                match self.extractor.extract(&step.destination) {
                    Ok(_) => {
                        self.phase = self.after_step(i);
                        None
                    }
                    Err(e) => Some(self.abort(i, Action::Extract, e)),
                }
            }
            Phase::Cleanup => {
                self.remove_temp_archives();
                self.phase = Phase::Finished;
                tracing::info!("Profile '{}' installed", self.plan.profile);
                Some(Outcome::Completed {
                    steps: self.plan.steps.len(),
                })
            }
            Phase::Finished => None,
        }
    }

    /// Drives the run without a frame loop in between.
    #[cfg(test)]
    pub fn run_to_end(mut self) -> Outcome {
        loop {
            if let Some(outcome) = self.advance() {
                return outcome;
            }
        }
    }

    // Delete-if-exists; a leftover archive is not worth failing the run over.
    fn remove_temp_archives(&self) {
        for path in &self.plan.temp_archives {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}
