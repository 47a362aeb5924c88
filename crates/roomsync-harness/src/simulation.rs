//! Runtime plus simulation driver, stepped until quiescent.
//!
//! A [`Simulation`] runs the production [`Runtime`] over a [`SimDriver`] and
//! checks the standard invariants after every processed event.

use std::time::Duration;

use roomsync_app::{App, AppEvent, Runtime, SyncConfig};
use roomsync_core::{Identity, RoomKey};

use crate::{
    Delivery, InvariantRegistry, Operation, SimDriver, SimDriverError, SystemSnapshot,
    operation::{ROOMS, other_user, sim_user},
};

/// Upper bound on events processed by one [`Simulation::settle`].
pub const MAX_STEPS: usize = 10_000;

/// Deterministic simulation of one client.
pub struct Simulation {
    runtime: Runtime<SimDriver>,
    quit: bool,
}

impl Simulation {
    /// Simulation for `identity` with invariant checking enabled.
    pub fn new(identity: Identity, config: SyncConfig, delivery: Delivery) -> Self {
        let user = identity.user_id.clone().unwrap_or_else(sim_user);
        let driver = SimDriver::new(user)
            .with_invariants(InvariantRegistry::standard())
            .with_delivery(delivery);
        Self { runtime: Runtime::new(driver, App::new(identity, config)), quit: false }
    }

    /// Simulation of the standard world: the authenticated simulation user,
    /// member of every clan in [`ROOMS`] marked as such, each room seeded with
    /// `seeded` messages.
    pub fn standard(delivery: Delivery, seeded: usize) -> Self {
        let identity = Identity::authenticated(sim_user(), "sim-token");
        let sim = Self::new(identity, SyncConfig::default(), delivery);
        sim.driver().server(|server| {
            for (key, member) in ROOMS {
                let Ok(room) = key.parse::<RoomKey>() else { continue };
                server.seed(&room, &other_user(), seeded);
                if member && room.kind.requires_membership_check() {
                    server.add_member(&room.id, &sim_user());
                }
            }
        });
        sim
    }

    /// The simulation driver.
    pub fn driver(&self) -> &SimDriver {
        self.runtime.driver()
    }

    /// The App under test.
    pub fn app(&self) -> &App<Duration> {
        self.runtime.app()
    }

    /// The App quit.
    pub fn has_quit(&self) -> bool {
        self.quit
    }

    /// Current observable state.
    pub fn snapshot(&self) -> SystemSnapshot {
        self.driver().snapshot(self.app())
    }

    /// Render the initial state and connect.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulation does not settle.
    pub async fn start(&mut self) -> Result<(), SimDriverError> {
        self.dispatch(AppEvent::Connect).await
    }

    /// Process `event` and everything it causes.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulation does not settle.
    pub async fn dispatch(&mut self, event: AppEvent<Duration>) -> Result<(), SimDriverError> {
        if self.quit {
            return Ok(());
        }
        self.quit = self.runtime.dispatch(event).await?;
        self.driver().check_invariants(self.app(), "after dispatch");
        self.settle().await.map(|_| ())
    }

    /// Process pending events until none are left. Returns the number of
    /// events processed.
    ///
    /// # Errors
    ///
    /// Returns an error if events keep coming after [`MAX_STEPS`].
    pub async fn settle(&mut self) -> Result<usize, SimDriverError> {
        for step in 0..MAX_STEPS {
            if self.quit || !self.driver().has_pending() {
                return Ok(step);
            }
            self.quit = !self.runtime.step().await?;
            self.driver().check_invariants(self.app(), &format!("after step {step}"));
        }
        tracing::warn!(max = MAX_STEPS, "simulation did not settle");
        Err(SimDriverError(format!("no quiescence after {MAX_STEPS} events")))
    }

    /// Apply one random operation and settle.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulation does not settle.
    pub async fn apply(&mut self, operation: &Operation) -> Result<(), SimDriverError> {
        tracing::debug!(?operation, "apply");
        match operation {
            Operation::OpenRoom(choice) => return self.dispatch(AppEvent::OpenRoom(choice.room())).await,
            Operation::CloseRoom => return self.dispatch(AppEvent::CloseRoom).await,
            Operation::Send(n) => {
                return self.dispatch(AppEvent::Send { content: Operation::content(*n) }).await;
            },
            Operation::RetryHistory => return self.dispatch(AppEvent::RetryHistory).await,
            Operation::Reconnect => return self.dispatch(AppEvent::Connect).await,
            Operation::Publish(choice) => {
                self.driver().publish(&choice.room(), &other_user(), "hi from elsewhere");
            },
            Operation::ScrollToTop => self.driver().scroll_user(0.0),
            Operation::ScrollToBottom => self.driver().scroll_user(f64::MAX),
            Operation::Release(seed) => self.driver().release_shuffled(*seed),
            Operation::DropChannel => self.driver().drop_channel("simulated drop"),
            Operation::Revoke(choice) => {
                let room = choice.room();
                self.driver().revoke(&room, Operation::revoke_code(&room));
            },
            Operation::Tick => self.driver().advance(Duration::from_secs(1)),
        }
        self.settle().await.map(|_| ())
    }
}
