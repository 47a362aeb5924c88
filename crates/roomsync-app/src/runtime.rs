//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: application state machine
//! - [`Driver`]: platform-specific I/O
//!
//! Actions are executed in the order the App produced them. Actions whose
//! execution yields an immediate result (channel open, failed send, render)
//! are fed back to the App before the next event is polled. Any number of
//! render requests in one batch results in a single render.

use std::collections::VecDeque;

use roomsync_client::ChannelCommand;

use crate::{App, AppAction, AppEvent, Driver};

/// Generic runtime that orchestrates App and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
pub struct Runtime<D>
where
    D: Driver,
{
    driver: D,
    app: App<D::Instant>,
}

impl<D> Runtime<D>
where
    D: Driver,
{
    /// Create a new runtime with the given driver and app.
    pub fn new(driver: D, app: App<D::Instant>) -> Self {
        Self { driver, app }
    }

    /// Run the main event loop.
    ///
    /// This is the core orchestration loop that:
    /// 1. Renders the initial state and connects
    /// 2. Polls for events from the driver
    /// 3. Feeds them to the App and executes the resulting actions
    ///
    /// Returns the final App state once the App quits or the driver's event
    /// source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters a fatal I/O error.
    pub async fn run(mut self) -> Result<App<D::Instant>, D::Error> {
        let mut actions = vec![AppAction::Render];
        actions.extend(self.app.connect());

        if !self.process_actions(actions).await? {
            while self.step().await? {}
        }

        self.driver.stop();
        Ok(self.app)
    }

    /// Poll and process one event.
    ///
    /// Returns `false` if the runtime should stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters a fatal I/O error.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        match self.driver.poll_event().await? {
            Some(event) => Ok(!self.dispatch(event).await?),
            None => Ok(false),
        }
    }

    /// Feed `event` to the App and execute the resulting actions.
    ///
    /// Returns `true` if the App quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters a fatal I/O error.
    pub async fn dispatch(&mut self, event: AppEvent<D::Instant>) -> Result<bool, D::Error> {
        let actions = self.app.handle(event);
        self.process_actions(actions).await
    }

    /// Execute actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions: VecDeque<AppAction> = initial_actions.into();
        let mut render = false;

        loop {
            while let Some(action) = pending_actions.pop_front() {
                let feedback = match action {
                    AppAction::Render => {
                        render = true;
                        None
                    },
                    AppAction::Quit => return Ok(true),
                    AppAction::OpenChannel { token } => match self.driver.open_channel(&token).await {
                        Ok(()) => Some(AppEvent::ChannelOpened),
                        Err(e) => {
                            let now = self.driver.now();
                            Some(AppEvent::ChannelClosed { reason: e.to_string(), now })
                        },
                    },
                    AppAction::CloseChannel => {
                        self.driver.close_channel();
                        None
                    },
                    AppAction::Channel(command) => self.emit(command).await,
                    AppAction::FetchPage(request) => {
                        self.driver.fetch_page(request);
                        None
                    },
                    AppAction::CheckMembership(check) => {
                        self.driver.check_membership(check);
                        None
                    },
                    AppAction::ScrollTo { top, behavior } => {
                        self.driver.scroll_to(top, behavior);
                        None
                    },
                    AppAction::Notify { message } => {
                        self.driver.notify(&message);
                        None
                    },
                };

                if let Some(event) = feedback {
                    pending_actions.extend(self.app.handle(event));
                }
            }

            if !render {
                return Ok(false);
            }
            render = false;
            if let Some(metrics) = self.driver.render(&self.app)? {
                pending_actions.extend(self.app.handle(AppEvent::Rendered(metrics)));
            }
        }
    }

    /// Emit a channel command. A failed send is reported back to the App;
    /// failed joins and leaves are only logged, the channel close that
    /// follows resets membership.
    async fn emit(&mut self, command: ChannelCommand) -> Option<AppEvent<D::Instant>> {
        let error = self.driver.send_command(&command).await.err()?;
        match command {
            ChannelCommand::Send { room, .. } => {
                Some(AppEvent::SendFailed { room, reason: error.to_string() })
            },
            ChannelCommand::Join(room) | ChannelCommand::Leave(room) => {
                tracing::warn!(%room, error = %error, "channel command failed");
                None
            },
        }
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App<D::Instant> {
        &self.app
    }

    /// Get a mutable reference to the App
    pub fn app_mut(&mut self) -> &mut App<D::Instant> {
        &mut self.app
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
