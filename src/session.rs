use tracing::{info, warn};

use crate::clock::{Clock, PollSchedule};
use crate::config::DeviceConfig;
use crate::dispatch::{CommandHandler, dispatch};
use crate::server::{ServerClient, ServerError};

/// The device's main loop: register once, then poll and dispatch forever.
pub struct Session<H, C> {
    server: ServerClient,
    handler: H,
    clock: C,
    schedule: PollSchedule,
}

impl<H: CommandHandler, C: Clock> Session<H, C> {
    pub fn new(server: ServerClient, handler: H, clock: C, schedule: PollSchedule) -> Self {
        Self {
            server,
            handler,
            clock,
            schedule,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Register with the server. Failures are logged; startup goes on.
    pub async fn start(&mut self, device: &DeviceConfig) {
        match self.server.register(device).await {
            Ok(reply) => info!("Register -> {} {}", reply.status, reply.body),
            Err(e) if e.is_timeout() => warn!("Register timed out, continuing: {}", e),
            Err(e) => warn!("Register failed, continuing: {}", e),
        }
    }

    /// Poll if the schedule says one is due. Returns whether a poll ran.
    pub async fn tick(&mut self) -> bool {
        let now = self.clock.now();
        if !self.schedule.is_due(now) {
            return false;
        }
        self.schedule.mark(now);
        self.poll_once().await;
        true
    }

    /// Run one poll cycle and dispatch whatever came back. Returns the
    /// number of commands dispatched.
    pub async fn poll_once(&mut self) -> usize {
        let commands = match self.server.poll().await {
            Ok(commands) => commands,
            Err(ServerError::Status(code)) => {
                warn!("Poll -> {}", code);
                return 0;
            }
            Err(ServerError::Decode(e)) => {
                warn!("Poll body discarded: {}", e);
                return 0;
            }
            Err(e) if e.is_unreachable() => {
                warn!("Server unreachable, reconnecting: {}", e);
                if let Err(e) = self.server.reconnect() {
                    warn!("Reconnect failed: {}", e);
                }
                return 0;
            }
            Err(e) => {
                warn!("Poll error: {}", e);
                return 0;
            }
        };

        if commands.is_empty() {
            return 0;
        }

        let count = commands.len();
        info!("Received {} new commands", count);
        for command in commands {
            dispatch(&mut self.handler, command).await;
        }
        count
    }

    /// Poll on schedule until the future is dropped.
    pub async fn run(&mut self) {
        info!(
            "Polling {} every {:?}",
            self.server.device_id(),
            self.schedule.interval()
        );
        loop {
            self.tick().await;
            let wait = self.schedule.until_due(self.clock.now());
            tokio::time::sleep(wait).await;
        }
    }
}
