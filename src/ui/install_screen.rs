use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::installer::{InstallRun, Outcome};
use crate::ui::Console;

/// Spreads an install run over frames: one frame shows the status line,
/// the next one blocks on the call it announced.
pub struct InstallScreen<F: Fetcher, E: Extractor> {
    run: InstallRun<F, E>,
    announced: bool,
}

impl<F: Fetcher, E: Extractor> InstallScreen<F, E> {
    pub fn new(run: InstallRun<F, E>) -> Self {
        InstallScreen { run, announced: false }
    }

    #[cfg(test)]
    pub fn run(&self) -> &InstallRun<F, E> {
        &self.run
    }

    /// Returns true once the run has ended and its result is on the console.
    pub fn update(&mut self, console: &mut Console) -> bool {
        if self.run.is_finished() {
            return true;
        }

        if !self.announced {
            if let Some(line) = self.run.status_line() {
                console.log(line);
            }
            self.announced = true;
            return false;
        }

        self.announced = false;
        match self.run.advance() {
            None => false,
            Some(Outcome::Completed { steps }) => {
                tracing::debug!("All {} steps done", steps);
                true
            }
            Some(Outcome::Aborted { step, action, error }) => {
                console.print(format!("Error while {} {}", action, step));
                console.print(error.to_string());
                true
            }
        }
    }
}
