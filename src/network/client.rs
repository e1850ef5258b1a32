use std::sync::Arc;

use tokio::sync::mpsc;

use super::api::ChatApi;
use super::channel::ChannelConnector;
use crate::common::{ClientCommand, ClientEvent};
use crate::engine::{EngineInput, SyncEngine, SyncSettings};
use crate::state::receipts::SharedVisibility;

/// The network task: owns the engine and feeds it UI commands and its own
/// asynchronous completions, one at a time.
pub struct SyncClient<A: ChatApi> {
    engine: SyncEngine<A>,
    visibility: SharedVisibility,
    command_receiver: mpsc::Receiver<ClientCommand>,
    input_receiver: mpsc::UnboundedReceiver<EngineInput>,
}

impl<A: ChatApi> SyncClient<A> {
    pub fn new(
        api: Arc<A>,
        connector: Arc<dyn ChannelConnector>,
        settings: SyncSettings,
        event_sender: mpsc::UnboundedSender<ClientEvent>,
        command_receiver: mpsc::Receiver<ClientCommand>,
    ) -> Self {
        let (input_sender, input_receiver) = mpsc::unbounded_channel();
        let visibility = SharedVisibility::new(true);
        let engine = SyncEngine::new(
            api,
            connector,
            Box::new(visibility.clone()),
            settings,
            input_sender,
            event_sender,
        );
        Self {
            engine,
            visibility,
            command_receiver,
            input_receiver,
        }
    }

    /// Runs until the command sender is dropped, then logs out.
    pub async fn run(mut self) {
        log::info!("Sync event loop started");
        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command);
                    } else {
                        break;
                    }
                }
                Some(input) = self.input_receiver.recv() => {
                    self.engine.handle(input);
                }
            }
        }
        self.engine.logout();
        log::info!("Sync event loop stopped");
    }

    fn handle_command(&mut self, command: ClientCommand) {
        log::debug!("Command: {command:?}");
        if let ClientCommand::SetVisible(visible) = command {
            self.visibility.set(visible);
        }
        self.engine.execute(command);
    }
}
