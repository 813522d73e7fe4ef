//! Fire-and-forget command dispatch

use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use tvskip_api::{Command, DialChannel, LoungeChannel};
use tvskip_state::Device;

use crate::transport::Transport;

/// Anything that can deliver a [`Command`] to a device without blocking
pub trait CommandSink: Send + Sync {
    fn send(&self, command: Command, device: &Device);
}

/// Which route a command took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SessionBinding,
    LocalNetwork,
    /// No usable transport; logged only
    Simulated,
}

/// Sends commands over the session channel or the local DIAL endpoints
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    lounge: LoungeChannel,
    dial: DialChannel,
}

impl CommandDispatcher {
    pub fn new(lounge: LoungeChannel, dial: DialChannel) -> Self {
        Self { lounge, dial }
    }

    /// Deliver `command` and wait for the transport's answer
    pub async fn execute(&self, command: Command, device: &Device) -> tvskip_api::Result<Route> {
        match Transport::select(device) {
            Transport::SessionBinding(token) => {
                self.lounge.send_command(&token, command).await?;
                Ok(Route::SessionBinding)
            }
            Transport::LocalNetwork(addr) => {
                self.dial.send_command(addr, command).await?;
                Ok(Route::LocalNetwork)
            }
            Transport::Idle => {
                info!(device_id = %device.id, command = %command, "command executed (simulated)");
                Ok(Route::Simulated)
            }
        }
    }
}

impl CommandSink for CommandDispatcher {
    /// Spawns delivery on the current runtime; failures are logged and dropped
    fn send(&self, command: Command, device: &Device) {
        let Ok(handle) = Handle::try_current() else {
            warn!(device_id = %device.id, command = %command, "no runtime, command dropped");
            return;
        };

        let dispatcher = self.clone();
        let device = device.clone();
        handle.spawn(async move {
            match dispatcher.execute(command, &device).await {
                Ok(route) => debug!(device_id = %device.id, command = %command, ?route, "command delivered"),
                Err(e) => warn!(device_id = %device.id, command = %command, error = %e, "command dropped"),
            }
        });
    }
}
