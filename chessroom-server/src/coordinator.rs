//! Session coordinator task
//!
//! One task owns the session and the gateway and drains a single command
//! queue, so moves, joins and disconnects are applied strictly in arrival
//! order without any lock around the board.

use crate::gateway::Gateway;
use crate::session::{ConnectionId, Session, SessionStatus};
use chessroom_core::{ClientEvent, RulesEngine, ServerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Work items for the coordinator
#[derive(Debug)]
pub enum Command {
    Connect {
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    },
    Disconnect {
        id: ConnectionId,
    },
    Inbound {
        id: ConnectionId,
        event: ClientEvent,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// A registered connection and its ordered outbound event stream
pub struct Connection {
    pub id: ConnectionId,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Cheap clonable handle used by sockets to talk to the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl CoordinatorHandle {
    /// Spawn the coordinator task on the current tokio runtime
    pub fn spawn<E>(session: Session<E>) -> Self
    where
        E: RulesEngine + Send + 'static,
        E::Board: Send + 'static,
    {
        let (commands, queue) = mpsc::unbounded_channel();
        let tick = session.clock().map(|clock| clock.tick_interval());
        let coordinator = Coordinator {
            session,
            gateway: Gateway::new(),
            queue,
        };
        tokio::spawn(coordinator.run(tick));
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new connection; its seat or spectator role arrives first on `events`
    pub fn connect(&self) -> Connection {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, events) = mpsc::unbounded_channel();
        self.submit(Command::Connect { id, outbound });
        Connection { id, events }
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.submit(Command::Disconnect { id });
    }

    pub fn send(&self, id: ConnectionId, event: ClientEvent) {
        self.submit(Command::Inbound { id, event });
    }

    /// Session summary; also acts as a barrier behind earlier commands
    pub async fn status(&self) -> anyhow::Result<SessionStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .map_err(|_| anyhow::anyhow!("coordinator stopped"))?;
        Ok(response.await?)
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("coordinator stopped, command dropped");
        }
    }
}

struct Coordinator<E: RulesEngine> {
    session: Session<E>,
    gateway: Gateway,
    queue: mpsc::UnboundedReceiver<Command>,
}

impl<E: RulesEngine> Coordinator<E> {
    async fn run(mut self, tick: Option<Duration>) {
        let mut ticker = tick.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        tracing::info!(clock = ticker.is_some(), "coordinator started");

        loop {
            tokio::select! {
                command = self.queue.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    let deliveries = self.session.tick();
                    self.gateway.dispatch(deliveries);
                }
            }
        }

        tracing::info!("coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { id, outbound } => {
                self.gateway.register(id, outbound);
                let deliveries = self.session.join(id);
                self.gateway.dispatch(deliveries);
                tracing::debug!(connections = self.gateway.len(), "connection registered");
            }
            Command::Disconnect { id } => {
                self.gateway.unregister(id);
                self.session.leave(id);
            }
            Command::Inbound { id, event } => {
                let deliveries = match event {
                    ClientEvent::MoveIntent(payload) => self.session.submit(id, &payload),
                    ClientEvent::Resign => self.session.resign(id),
                };
                self.gateway.dispatch(deliveries);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.session.status());
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
