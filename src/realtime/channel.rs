use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use boardsync_common::{BoardContent, BoardId, RemoteMutation, UserId};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::presence::{CursorPosition, CursorThrottle, PresenceEntry, PresenceRoster};
use super::protocol::{ClientFrame, Inbound, ServerFrame};
use crate::config::RealtimeConfig;
use crate::errors::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CAPACITY: usize = 256;

/// How long a single dial (TCP + TLS + upgrade) may take.
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disconnect` waits for the leave frame to go out.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPhase {
    Disconnected,
    Connecting,
    Joined(BoardId),
}

/// What the channel reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A structural change pushed by a peer.
    Mutation(RemoteMutation),
    PresenceChanged,
    CursorMoved(UserId),
    /// The transport dropped and came back; anything sent meanwhile was missed.
    Reconnected,
    /// Reconnection gave up. The channel is disconnected for good.
    ConnectionLost,
}

/// Identity announced when joining a board room.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub user_name: Option<String>,
}

enum Outbound {
    Frame(ClientFrame),
    Close,
}

enum LoopExit {
    /// Closed locally.
    Closed,
    /// Transport failure or server close.
    Dropped,
}

struct Shared {
    config: RealtimeConfig,
    identity: Identity,
    phase: watch::Sender<ChannelPhase>,
    events: broadcast::Sender<ChannelEvent>,
    roster: Mutex<PresenceRoster>,
    throttle: Mutex<CursorThrottle>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

struct Connection {
    board_id: BoardId,
    task: JoinHandle<()>,
}

/// One long-lived connection per open board. Owned explicitly (no global
/// socket); clones share the same connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    shared: Arc<Shared>,
    connection: Arc<tokio::sync::Mutex<Option<Connection>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn encode(frame: &ClientFrame) -> Result<Message, ChannelError> {
    let json = serde_json::to_string(frame)?;
    Ok(Message::Text(json.into()))
}

/// Add up to half of `delay` again, at random.
fn with_jitter(delay: Duration) -> Duration {
    let spread = (delay.as_millis() / 2) as u64;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=spread))
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig, identity: Identity) -> Self {
        let (phase, _) = watch::channel(ChannelPhase::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let throttle = CursorThrottle::new(config.cursor_throttle());
        Self {
            shared: Arc::new(Shared {
                config,
                identity,
                phase,
                events,
                roster: Mutex::new(PresenceRoster::new()),
                throttle: Mutex::new(throttle),
                outbound: Mutex::new(None),
            }),
            connection: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        self.shared.phase.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<ChannelPhase> {
        self.shared.phase.subscribe()
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.phase(), ChannelPhase::Joined(_))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    pub fn presence(&self) -> Vec<PresenceEntry> {
        lock(&self.shared.roster).users()
    }

    pub fn cursor(&self, user_id: &UserId) -> Option<CursorPosition> {
        lock(&self.shared.roster).cursor(user_id)
    }

    /// Connect and join `board_id`'s room. Calling it again for the board that
    /// is already joined does nothing; calling it for another board leaves
    /// the old room first.
    pub async fn connect(&self, board_id: &BoardId) -> Result<(), ChannelError> {
        let mut slot = self.connection.lock().await;
        if let Some(current) = slot.as_ref() {
            if &current.board_id == board_id && !current.task.is_finished() {
                debug!(board_id = %board_id, "realtime already connected");
                return Ok(());
            }
        }
        if let Some(previous) = slot.take() {
            self.shared.shutdown(previous).await;
        }

        self.shared.set_phase(ChannelPhase::Connecting);
        let ws = match self.shared.dial(board_id).await {
            Ok(ws) => ws,
            Err(e) => {
                self.shared.set_phase(ChannelPhase::Disconnected);
                return Err(e);
            }
        };
        info!(board_id = %board_id, url = %self.shared.config.url, "joined board room");
        self.shared.set_phase(ChannelPhase::Joined(board_id.clone()));

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outbound) = Some(tx);
        let task = tokio::spawn(run_connection(self.shared.clone(), board_id.clone(), ws, rx));
        *slot = Some(Connection {
            board_id: board_id.clone(),
            task,
        });
        Ok(())
    }

    /// Leave the room and close the socket. A no-op when not connected.
    pub async fn disconnect(&self) {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.take() {
            self.shared.shutdown(connection).await;
        }
    }

    /// Broadcast a confirmed local mutation. Fire-and-forget: returns false
    /// when the channel is not joined and the update was dropped.
    pub fn publish(&self, content: BoardContent) -> bool {
        let ChannelPhase::Joined(board_id) = self.phase() else {
            debug!(kind = content.kind(), "not joined; update stays local");
            return false;
        };
        debug!(kind = content.kind(), board_id = %board_id, "publishing board update");
        self.shared.send(ClientFrame::BoardContentUpdate {
            board_id,
            content,
            last_modified: Utc::now(),
        })
    }

    /// Broadcast the local pointer position, at most once per throttle
    /// interval. Returns false when throttled or not joined.
    pub fn move_cursor(&self, x: f64, y: f64) -> bool {
        let ChannelPhase::Joined(board_id) = self.phase() else {
            return false;
        };
        if !lock(&self.shared.throttle).admit() {
            return false;
        }
        self.shared.send(ClientFrame::CursorMove { board_id, x, y })
    }
}

impl Shared {
    fn set_phase(&self, phase: ChannelPhase) {
        self.phase.send_replace(phase);
    }

    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }

    fn send(&self, frame: ClientFrame) -> bool {
        match lock(&self.outbound).as_ref() {
            Some(tx) => tx.send(Outbound::Frame(frame)).is_ok(),
            None => false,
        }
    }

    fn clear_presence(&self) {
        let mut roster = lock(&self.roster);
        if !roster.is_empty() {
            roster.clear();
            drop(roster);
            self.emit(ChannelEvent::PresenceChanged);
        }
    }

    fn join_frame(&self, board_id: &BoardId) -> ClientFrame {
        ClientFrame::JoinBoard {
            board_id: board_id.clone(),
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.user_name.clone(),
        }
    }

    /// Open a socket and send the join frame on it.
    async fn dial(&self, board_id: &BoardId) -> Result<WsStream, ChannelError> {
        let url = self.config.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChannelError::InvalidUrl(url.to_string()));
        }
        let connect_error = |source| ChannelError::Connect {
            url: url.to_string(),
            source,
        };

        let (mut ws, _) = match tokio::time::timeout(DIAL_TIMEOUT, connect_async(url)).await {
            Ok(result) => result.map_err(connect_error)?,
            Err(_) => {
                return Err(connect_error(tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "realtime connect timed out",
                ))));
            }
        };
        ws.send(encode(&self.join_frame(board_id))?)
            .await
            .map_err(connect_error)?;
        Ok(ws)
    }

    async fn shutdown(&self, connection: Connection) {
        let sender = lock(&self.outbound).take();
        if let Some(tx) = sender {
            let _ = tx.send(Outbound::Frame(ClientFrame::LeaveBoard {
                board_id: connection.board_id.clone(),
            }));
            let _ = tx.send(Outbound::Close);
        }
        let abort = connection.task.abort_handle();
        if tokio::time::timeout(CLOSE_GRACE, connection.task).await.is_err() {
            warn!(board_id = %connection.board_id, "realtime task did not stop in time; aborting");
            abort.abort();
        }
        self.set_phase(ChannelPhase::Disconnected);
        self.clear_presence();
        info!(board_id = %connection.board_id, "left board room");
    }

    fn handle_text(&self, board_id: &BoardId, text: &str) {
        let frame: ServerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "ignoring unparseable realtime frame");
                return;
            }
        };

        match frame.into_inbound() {
            Inbound::Arrived { user_id, user_name } => {
                if self.identity.user_id.as_ref() == Some(&user_id) {
                    return;
                }
                if lock(&self.roster).arrive(user_id, user_name, Utc::now()) {
                    self.emit(ChannelEvent::PresenceChanged);
                }
            }
            Inbound::Departed { user_id } => {
                if lock(&self.roster).depart(&user_id) {
                    self.emit(ChannelEvent::PresenceChanged);
                }
            }
            Inbound::Cursor { user_id, x, y } => {
                lock(&self.roster).move_cursor(user_id.clone(), x, y, Utc::now());
                self.emit(ChannelEvent::CursorMoved(user_id));
            }
            Inbound::Mutation {
                board_id: target,
                mutation,
            } => {
                if !target.is_empty() && &target != board_id {
                    debug!(target = %target, "update for another board ignored");
                    return;
                }
                debug!(kind = mutation.kind(), "remote board update");
                self.emit(ChannelEvent::Mutation(mutation));
            }
        }
    }

    /// Pump one socket until it closes.
    async fn drive(
        &self,
        board_id: &BoardId,
        ws: WsStream,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> LoopExit {
        let (mut sink, mut stream) = ws.split();
        let pong_timeout = self.config.pong_timeout();
        let mut ping_interval = tokio::time::interval(self.config.ping_interval());
        // The first tick completes immediately; consume it so the first real
        // ping fires one interval from now.
        ping_interval.tick().await;

        let mut last_pong = Instant::now();
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                // ── Keepalive ───────────────────────────────────────────
                _ = ping_interval.tick() => {
                    if awaiting_pong && last_pong.elapsed() > pong_timeout {
                        warn!(board_id = %board_id, "no pong from realtime server");
                        return LoopExit::Dropped;
                    }
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        return LoopExit::Dropped;
                    }
                    awaiting_pong = true;
                }

                // ── Local frames ────────────────────────────────────────
                frame = outbound.recv() => {
                    match frame {
                        Some(Outbound::Frame(frame)) => {
                            let message = match encode(&frame) {
                                Ok(message) => message,
                                Err(e) => {
                                    warn!(error = %e, "dropping unencodable frame");
                                    continue;
                                }
                            };
                            if let Err(e) = sink.send(message).await {
                                warn!(error = %e, "realtime send failed");
                                return LoopExit::Dropped;
                            }
                        }
                        Some(Outbound::Close) | None => {
                            // Best-effort close frame
                            let _ = sink.send(Message::Close(None)).await;
                            return LoopExit::Closed;
                        }
                    }
                }

                // ── Server frames ───────────────────────────────────────
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(board_id, text.as_str()),
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                            awaiting_pong = false;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            warn!(board_id = %board_id, "realtime server closed the connection");
                            return LoopExit::Dropped;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(board_id = %board_id, error = %e, "realtime transport error");
                            return LoopExit::Dropped;
                        }
                    }
                }
            }
        }
    }

    /// Bounded exponential backoff with jitter. `None` when the attempts are
    /// exhausted or the owner closed the channel meanwhile.
    async fn reconnect(
        &self,
        board_id: &BoardId,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> Option<WsStream> {
        let policy = &self.config.reconnect;
        for attempt in 0..policy.max_attempts {
            let delay = with_jitter(policy.delay_for(attempt));
            self.set_phase(ChannelPhase::Connecting);
            info!(
                board_id = %board_id,
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_close(outbound) => return None,
            }

            match self.dial(board_id).await {
                Ok(ws) => {
                    self.set_phase(ChannelPhase::Joined(board_id.clone()));
                    info!(board_id = %board_id, "rejoined board room");
                    return Some(ws);
                }
                Err(e) => warn!(board_id = %board_id, error = %e, "reconnect attempt failed"),
            }
        }
        warn!(board_id = %board_id, "giving up on realtime; continuing local-only");
        None
    }
}

/// Drain outbound frames (there is no socket to put them on) until the owner
/// asks to close.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    loop {
        match outbound.recv().await {
            Some(Outbound::Frame(_)) => debug!("dropping frame while disconnected"),
            Some(Outbound::Close) | None => return,
        }
    }
}

async fn run_connection(
    shared: Arc<Shared>,
    board_id: BoardId,
    mut ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    loop {
        match shared.drive(&board_id, ws, &mut outbound).await {
            LoopExit::Closed => break,
            LoopExit::Dropped => {
                shared.clear_presence();
                match shared.reconnect(&board_id, &mut outbound).await {
                    Some(fresh) => {
                        ws = fresh;
                        shared.emit(ChannelEvent::Reconnected);
                    }
                    None => {
                        shared.set_phase(ChannelPhase::Disconnected);
                        shared.emit(ChannelEvent::ConnectionLost);
                        return;
                    }
                }
            }
        }
    }
    shared.set_phase(ChannelPhase::Disconnected);
}
