use anyhow::Result;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::engine::PlaybackEngine;
use crate::error::Error;
use crate::events::{ConsumerId, EngineCommand, EngineState, SourceEvent};
use crate::timer::wait_for;

const COMMAND_CAPACITY: usize = 32;

/// Drive `engine` until cancelled or every [`EngineHandle`] is dropped.
///
/// Commands, source events and the slide timer are handled one at a time,
/// so the engine never sees two inputs at once. After a `Stop` the loop keeps
/// draining inputs; the stopped engine drops them.
#[instrument(skip_all)]
pub async fn run(
    mut engine: PlaybackEngine,
    mut source_rx: mpsc::Receiver<SourceEvent>,
    mut commands: mpsc::Receiver<EngineCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    engine.start();
    loop {
        let deadline = engine.timer_deadline();
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; stopping engine");
                engine.stop();
                break;
            }

            maybe_cmd = commands.recv() => match maybe_cmd {
                Some(cmd) => {
                    debug!(?cmd, "command");
                    engine.on_command(cmd);
                }
                None => {
                    info!("all handles dropped; stopping engine");
                    engine.stop();
                    break;
                }
            },

            Some(event) = source_rx.recv() => {
                engine.on_source_event(event);
            }

            _ = wait_for(deadline), if deadline.is_some() => {
                engine.on_timer_fired();
            }
        }
    }
    Ok(())
}

/// Cloneable front end of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    state: watch::Receiver<EngineState>,
}

impl EngineHandle {
    pub async fn send(&self, command: EngineCommand) -> Result<(), Error> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::EngineClosed)
    }

    pub async fn play(&self) -> Result<(), Error> {
        self.send(EngineCommand::Play).await
    }

    pub async fn pause(&self) -> Result<(), Error> {
        self.send(EngineCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<(), Error> {
        self.send(EngineCommand::Stop).await
    }

    pub async fn next(&self, consumer: ConsumerId) -> Result<(), Error> {
        self.send(EngineCommand::Next(consumer)).await
    }

    pub async fn previous(&self, consumer: ConsumerId) -> Result<(), Error> {
        self.send(EngineCommand::Previous(consumer)).await
    }

    pub async fn video_ended(&self, consumer: ConsumerId) -> Result<(), Error> {
        self.send(EngineCommand::VideoEnded(consumer)).await
    }

    pub async fn slots_changed(&self, consumer: ConsumerId) -> Result<(), Error> {
        self.send(EngineCommand::SlotsChanged(consumer)).await
    }

    pub async fn adjust_duration(&self, delta_seconds: f64) -> Result<(), Error> {
        self.send(EngineCommand::AdjustDuration(delta_seconds)).await
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Wait until the engine publishes `want`.
    pub async fn wait_for_state(&mut self, want: EngineState) -> Result<(), Error> {
        self.state
            .wait_for(|state| *state == want)
            .await
            .map(|_| ())
            .map_err(|_| Error::EngineClosed)
    }
}

/// Spawn the engine loop on the current runtime.
pub fn spawn(
    engine: PlaybackEngine,
    source_rx: mpsc::Receiver<SourceEvent>,
    cancel: CancellationToken,
) -> (EngineHandle, JoinHandle<Result<()>>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let handle = EngineHandle {
        commands: commands_tx,
        state: engine.subscribe(),
    };
    let task = tokio::spawn(run(engine, source_rx, commands_rx, cancel));
    (handle, task)
}
