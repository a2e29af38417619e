//! Long-lived chart session.
//!
//! One task owns the block set, chart options and simulated time. Changes
//! arrive as commands; bursts are coalesced until no change has arrived for
//! the debounce window, then the charts are recomputed once and published as
//! an immutable snapshot. Readers never see a half-updated snapshot.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::charts::{ChartOptions, ChartSeries, build_series};
use crate::color::ColorSource;
use crate::config::SessionConfig;
use crate::model::{Block, ValidationError};
use crate::workarea::WorkAreaRegistry;

const COMMAND_BUFFER: usize = 64;

/// Published chart state. `revision` increases by one per recompute.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ChartSnapshot {
    pub revision: u64,
    pub now: NaiveDateTime,
    pub block_count: usize,
    pub options: ChartOptions,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("chart session has stopped")]
    Closed,
    #[error(transparent)]
    InvalidOptions(#[from] ValidationError),
}

enum SessionCommand {
    SetBlocks(Vec<Block>),
    SetOptions(ChartOptions),
    SetTime(NaiveDateTime),
    Refresh(oneshot::Sender<Arc<ChartSnapshot>>),
}

/// Cloneable front end of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Arc<ChartSnapshot>>,
}

impl SessionHandle {
    pub async fn set_blocks(&self, blocks: Vec<Block>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetBlocks(blocks)).await
    }

    /// Rejects invalid options before they reach the session.
    pub async fn set_options(&self, options: ChartOptions) -> Result<(), SessionError> {
        options.validate()?;
        self.send(SessionCommand::SetOptions(options)).await
    }

    pub async fn set_time(&self, now: NaiveDateTime) -> Result<(), SessionError> {
        self.send(SessionCommand::SetTime(now)).await
    }

    /// Recomputes immediately, including any pending changes.
    pub async fn refresh(&self) -> Result<Arc<ChartSnapshot>, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Refresh(reply)).await?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Latest published snapshot, possibly behind pending changes.
    pub fn latest(&self) -> Arc<ChartSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ChartSnapshot>> {
        self.snapshots.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

struct ChartSession {
    registry: Arc<WorkAreaRegistry>,
    colors: Arc<dyn ColorSource>,
    config: SessionConfig,
    blocks: Vec<Block>,
    options: ChartOptions,
    now: NaiveDateTime,
    revision: u64,
}

impl ChartSession {
    fn snapshot(&self) -> ChartSnapshot {
        ChartSnapshot {
            revision: self.revision,
            now: self.now,
            block_count: self.blocks.len(),
            options: self.options.clone(),
            series: build_series(
                &self.blocks,
                &self.registry,
                self.now,
                &self.options,
                self.colors.as_ref(),
            ),
        }
    }

    fn publish(&mut self, tx: &watch::Sender<Arc<ChartSnapshot>>) -> Arc<ChartSnapshot> {
        self.revision += 1;
        let snapshot = Arc::new(self.snapshot());
        debug!(
            revision = snapshot.revision,
            blocks = snapshot.block_count,
            "chart snapshot published"
        );
        tx.send_replace(snapshot.clone());
        snapshot
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        tx: watch::Sender<Arc<ChartSnapshot>>,
    ) {
        let mut dirty = false;
        loop {
            let next = if dirty {
                match tokio::time::timeout(self.config.debounce(), commands.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.publish(&tx);
                        dirty = false;
                        continue;
                    }
                }
            } else {
                commands.recv().await
            };

            let Some(command) = next else {
                break;
            };

            match command {
                SessionCommand::SetBlocks(blocks) => {
                    self.blocks = blocks;
                    dirty = true;
                }
                SessionCommand::SetOptions(options) => {
                    self.options = options;
                    dirty = true;
                }
                SessionCommand::SetTime(now) => {
                    self.now = now;
                    dirty = true;
                }
                SessionCommand::Refresh(reply) => {
                    let snapshot = self.publish(&tx);
                    dirty = false;
                    let _ = reply.send(snapshot);
                }
            }
        }
        info!(revision = self.revision, "chart session stopped");
    }
}

/// Starts a session task with an empty block set.
///
/// The initial snapshot (revision 0) is available immediately. The task ends
/// once every handle is dropped.
pub fn spawn_session(
    registry: Arc<WorkAreaRegistry>,
    colors: Arc<dyn ColorSource>,
    options: ChartOptions,
    now: NaiveDateTime,
    config: SessionConfig,
) -> (SessionHandle, JoinHandle<()>) {
    let session = ChartSession {
        registry,
        colors,
        config,
        blocks: Vec::new(),
        options,
        now,
        revision: 0,
    };
    let (tx, snapshots) = watch::channel(Arc::new(session.snapshot()));
    let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(session.run(rx, tx));
    (
        SessionHandle {
            commands,
            snapshots,
        },
        task,
    )
}
