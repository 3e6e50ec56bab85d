//! Edge-triggered listener notification.
//!
//! Callbacks run on a single worker thread fed by a bounded queue, so the tick never waits for a
//! listener. Events are delivered in the order they were raised.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{self, Receiver, SyncSender, TrySendError},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{error, warn};

use super::SensorPort;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Below,
    Above,
}

impl Side {
    /// A value equal to the level counts as above.
    pub fn of(value: f64, level: f64) -> Self {
        if value >= level {
            Side::Above
        } else {
            Side::Below
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    level: f64,
    last: Option<Side>,
}

impl Trigger {
    /// Fires for whatever side the first evaluation yields.
    pub fn new(level: f64) -> Self {
        Self { level, last: None }
    }

    /// Fires only once the value leaves `side`.
    pub fn with_initial(level: f64, side: Side) -> Self {
        Self {
            level,
            last: Some(side),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn last(&self) -> Option<Side> {
        self.last
    }

    /// Returns the previous level. The last side is kept.
    pub fn set_level(&mut self, level: f64) -> f64 {
        std::mem::replace(&mut self.level, level)
    }

    /// Returns the new side if it differs from the last one.
    pub fn evaluate(&mut self, value: f64) -> Option<Side> {
        let side = self.crossing(value)?;
        self.commit(side);
        Some(side)
    }

    /// Like `evaluate` without remembering the side.
    pub fn crossing(&self, value: f64) -> Option<Side> {
        let side = Side::of(value, self.level);
        (self.last != Some(side)).then_some(side)
    }

    pub fn commit(&mut self, side: Side) {
        self.last = Some(side);
    }
}

pub trait LightListener: Send + Sync {
    fn bright(&self, _port: SensorPort, _value: i32) {}

    fn dark(&self, _port: SensorPort, _value: i32) {}
}

pub trait UltrasonicListener: Send + Sync {
    fn near(&self, _port: SensorPort, _distance: u32) {}

    fn far(&self, _port: SensorPort, _distance: u32) {}
}

pub trait InfraredListener: Send + Sync {
    fn activated(&self, _port: SensorPort) {}

    fn passivated(&self, _port: SensorPort) {}
}

pub trait CollisionListener: Send + Sync {
    fn collide(&self);
}

#[derive(Clone)]
pub enum Event {
    Light(Arc<dyn LightListener>, SensorPort, Side, i32),
    Ultrasonic(Arc<dyn UltrasonicListener>, SensorPort, Side, u32),
    Infrared(Arc<dyn InfraredListener>, SensorPort, Side),
    Collision(Arc<dyn CollisionListener>),
}

impl Event {
    fn deliver(self) {
        match self {
            Event::Light(listener, port, Side::Above, value) => listener.bright(port, value),
            Event::Light(listener, port, Side::Below, value) => listener.dark(port, value),
            Event::Ultrasonic(listener, port, Side::Above, distance) => {
                listener.far(port, distance)
            }
            Event::Ultrasonic(listener, port, Side::Below, distance) => {
                listener.near(port, distance)
            }
            Event::Infrared(listener, port, Side::Above) => listener.activated(port),
            Event::Infrared(listener, port, Side::Below) => listener.passivated(port),
            Event::Collision(listener) => listener.collide(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Event::Light(_, _, Side::Above, _) => "bright",
            Event::Light(_, _, Side::Below, _) => "dark",
            Event::Ultrasonic(_, _, Side::Above, _) => "far",
            Event::Ultrasonic(_, _, Side::Below, _) => "near",
            Event::Infrared(_, _, Side::Above) => "activated",
            Event::Infrared(_, _, Side::Below) => "passivated",
            Event::Collision(_) => "collide",
        }
    }
}

enum Job {
    Deliver(Event),
    Barrier(SyncSender<()>),
}

pub struct Dispatcher {
    sender: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        match thread::Builder::new()
            .name("robot-listeners".to_string())
            .spawn(move || Self::run(receiver))
        {
            Ok(worker) => Self {
                sender: Some(sender),
                worker: Some(worker),
            },
            Err(err) => {
                error!("listener worker could not be started: {err}");
                Self {
                    sender: None,
                    worker: None,
                }
            }
        }
    }

    fn run(receiver: Receiver<Job>) {
        for job in receiver {
            match job {
                Job::Deliver(event) => {
                    let name = event.name();
                    if panic::catch_unwind(AssertUnwindSafe(|| event.deliver())).is_err() {
                        error!("listener panicked while handling '{name}'");
                    }
                }
                Job::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    /// Queues the event without blocking. Returns false if it was dropped.
    pub fn dispatch(&self, event: Event) -> bool {
        let Some(sender) = &self.sender else {
            warn!("no listener worker, dropping '{}' event", event.name());
            return false;
        };
        match sender.try_send(Job::Deliver(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(Job::Deliver(event)))
            | Err(TrySendError::Disconnected(Job::Deliver(event))) => {
                warn!("listener queue unavailable, '{}' event not queued", event.name());
                false
            }
            Err(_) => false,
        }
    }

    /// Queues the event for a crossing of `trigger` and only then commits the new side, so a
    /// crossing refused by a full queue is raised again on the next evaluation. A crossing without
    /// an event is committed at once.
    pub fn raise(
        &self,
        trigger: &mut Trigger,
        value: f64,
        event: impl FnOnce(Side) -> Option<Event>,
    ) -> Option<Side> {
        let side = trigger.crossing(value)?;
        let queued = event(side).map_or(true, |event| self.dispatch(event));
        queued.then(|| {
            trigger.commit(side);
            side
        })
    }

    /// Blocks until all events queued so far have been delivered.
    ///
    /// Must not be called from within a listener.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done, wait) = mpsc::sync_channel(1);
        if sender.send(Job::Barrier(done)).is_ok() {
            let _ = wait.recv();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            // A listener may drop the last owner from the worker itself
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}
