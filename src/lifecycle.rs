//! Foreground / background / exit tracking for the frame loop.
//!
//! The flag lives in an `Arc<AtomicU8>` so exit requests can arrive from
//! other threads (Ctrl-C handler) while the frame loop owns the `Lifecycle`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use macroquad::prelude::is_quit_requested;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleFlag {
    Running = 0,
    Background = 1,
    Returning = 2,
    Stopping = 3,
    Stopped = 4,
}

impl LifecycleFlag {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleFlag::Running,
            1 => LifecycleFlag::Background,
            2 => LifecycleFlag::Returning,
            3 => LifecycleFlag::Stopping,
            _ => LifecycleFlag::Stopped,
        }
    }
}

/// What the platform reported on one pump of its message queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcStatus {
    InForeground,
    InBackground,
    /// We are about to lose the foreground and must give up shared resources
    ReleaseForeground,
    /// Home button / window close
    ExitRequested,
    /// Teardown finished, the launcher has control
    Exiting,
}

pub trait Platform {
    fn process_messages(&mut self) -> ProcStatus;

    fn release_foreground(&mut self) {}

    /// Hand control back to the system launcher.
    fn launch_menu(&mut self);

    /// Called once per poll while backgrounded.
    fn idle(&mut self) {
        thread::sleep(Duration::from_millis(50));
    }
}

/// Cloneable handle that forces the gate into `Stopping`.
#[derive(Clone)]
pub struct ExitSignal {
    state: Arc<AtomicU8>,
}

impl ExitSignal {
    pub fn request_exit(&self) {
        let _ = self.state.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            match LifecycleFlag::from_u8(current) {
                LifecycleFlag::Stopping | LifecycleFlag::Stopped => None,
                _ => Some(LifecycleFlag::Stopping as u8),
            }
        });
    }
}

pub struct Lifecycle<P: Platform> {
    platform: P,
    state: Arc<AtomicU8>,
}

impl<P: Platform> Lifecycle<P> {
    pub fn new(platform: P) -> Self {
        Lifecycle {
            platform,
            state: Arc::new(AtomicU8::new(LifecycleFlag::Running as u8)),
        }
    }

    pub fn exit_signal(&self) -> ExitSignal {
        ExitSignal { state: Arc::clone(&self.state) }
    }

    pub fn flag(&self) -> LifecycleFlag {
        LifecycleFlag::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True once an exit was requested, whether or not teardown has finished.
    pub fn exit_requested(&self) -> bool {
        matches!(self.flag(), LifecycleFlag::Stopping | LifecycleFlag::Stopped)
    }

    // Stopped is terminal and Stopping only ever moves on to Stopped.
    fn transition(&self, next: impl Fn(LifecycleFlag) -> LifecycleFlag) {
        let _ = self.state.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
            let current = LifecycleFlag::from_u8(raw);
            let target = match current {
                LifecycleFlag::Stopped => return None,
                LifecycleFlag::Stopping => match next(current) {
                    LifecycleFlag::Stopped => LifecycleFlag::Stopped,
                    _ => return None,
                },
                _ => next(current),
            };
            Some(target as u8)
        });
    }

    /// Pumps one platform message. Returns false once the app is stopped.
    pub fn poll(&mut self) -> bool {
        if self.flag() == LifecycleFlag::Stopped {
            return false;
        }

        let status = self.platform.process_messages();
        match status {
            ProcStatus::Exiting => self.transition(|_| LifecycleFlag::Stopped),
            ProcStatus::ExitRequested => self.transition(|_| LifecycleFlag::Stopping),
            ProcStatus::ReleaseForeground => {
                self.platform.release_foreground();
                self.transition(|_| LifecycleFlag::Background);
            }
            ProcStatus::InBackground => self.transition(|_| LifecycleFlag::Background),
            ProcStatus::InForeground => self.transition(|current| match current {
                LifecycleFlag::Background => LifecycleFlag::Returning,
                _ => LifecycleFlag::Running,
            }),
        }

        match self.flag() {
            LifecycleFlag::Stopped => {
                tracing::debug!("Platform teardown complete");
                false
            }
            LifecycleFlag::Background => {
                self.platform.idle();
                true
            }
            _ => true,
        }
    }

    /// Returns control to the launcher and blocks until the platform is done.
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        self.exit_signal().request_exit();
        self.platform.launch_menu();
        while self.poll() {}
    }
}

/// The desktop window: closing it is the home button, and there is no
/// launcher to wait for.
#[derive(Default)]
pub struct WindowPlatform {
    launched: bool,
}

impl WindowPlatform {
    pub fn new() -> Self {
        WindowPlatform { launched: false }
    }
}

impl Platform for WindowPlatform {
    fn process_messages(&mut self) -> ProcStatus {
        if self.launched {
            ProcStatus::Exiting
        } else if is_quit_requested() {
            ProcStatus::ExitRequested
        } else {
            ProcStatus::InForeground
        }
    }

    fn launch_menu(&mut self) {
        self.launched = true;
    }
}
