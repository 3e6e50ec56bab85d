//! Fixed-period tick thread for hosts without a scheduler of their own.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error};

use super::Robot;

/// Advances the robot by one tick per period until dropped.
pub struct TickDriver {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub fn start(robot: &Robot, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let running = running.clone();
            let robot = robot.clone();
            thread::Builder::new()
                .name("robot-ticks".to_string())
                .spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        robot.advance(1);
                        thread::sleep(period);
                    }
                })
        };
        let worker = match worker {
            Ok(worker) => {
                debug!("ticking every {period:?}");
                Some(worker)
            }
            Err(err) => {
                error!("tick thread could not be started: {err}");
                None
            }
        };
        Self { running, worker }
    }

    /// Ticks with the configured simulation period.
    pub fn with_config_period(robot: &Robot) -> Self {
        Self::start(robot, robot.config().period())
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
