//! Board Session: the wiring for one open board view.
//!
//! Confirmed local mutations go out on the realtime channel; peer mutations
//! come back into the store. A realtime failure never blocks editing: the
//! session just runs local-only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use boardsync_common::BoardId;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::realtime::{ChannelEvent, RealtimeChannel};
use crate::store::{BoardStore, StoreNotice};

pub struct BoardSession {
    board_id: BoardId,
    store: BoardStore,
    channel: Option<RealtimeChannel>,
    synced: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BoardSession {
    /// Load the board, then try to join its realtime room. Only the load can
    /// fail the open; pass `None` for `channel` to run local-only.
    pub async fn open(
        store: BoardStore,
        channel: Option<RealtimeChannel>,
        board_id: &BoardId,
    ) -> Result<Self, SyncError> {
        store.load_board(board_id).await?;

        let synced = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::new();
        if let Some(channel) = &channel {
            // Subscribe before connecting so nothing slips past.
            let notices = store.subscribe();
            let events = channel.subscribe();
            match channel.connect(board_id).await {
                Ok(()) => synced.store(true, Ordering::SeqCst),
                Err(e) => warn!(board_id = %board_id, error = %e, "realtime unavailable; working local-only"),
            }
            tasks.push(tokio::spawn(forward_confirmed(notices, channel.clone())));
            tasks.push(tokio::spawn(apply_inbound(store.clone(), events, synced.clone())));
        }
        info!(board_id = %board_id, synced = synced.load(Ordering::SeqCst), "board session open");

        Ok(Self {
            board_id: board_id.clone(),
            store,
            channel,
            synced,
            tasks,
        })
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    pub fn channel(&self) -> Option<&RealtimeChannel> {
        self.channel.as_ref()
    }

    /// False while running local-only.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Leave the room and stop relaying.
    pub async fn close(mut self) {
        if let Some(channel) = &self.channel {
            channel.disconnect().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.synced.store(false, Ordering::SeqCst);
        info!(board_id = %self.board_id, "board session closed");
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn forward_confirmed(mut notices: broadcast::Receiver<StoreNotice>, channel: RealtimeChannel) {
    loop {
        match notices.recv().await {
            Ok(StoreNotice::Confirmed(content)) => {
                channel.publish(content);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "store notices lagged; some updates were not broadcast");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn apply_inbound(
    store: BoardStore,
    mut events: broadcast::Receiver<ChannelEvent>,
    synced: Arc<AtomicBool>,
) {
    loop {
        match events.recv().await {
            Ok(ChannelEvent::Mutation(mutation)) => {
                store.apply_remote_mutation(&mutation);
            }
            Ok(ChannelEvent::Reconnected) => {
                synced.store(true, Ordering::SeqCst);
                debug!("realtime reconnected; reloading to catch up");
                store.request_reload();
            }
            Ok(ChannelEvent::ConnectionLost) => synced.store(false, Ordering::SeqCst),
            Ok(ChannelEvent::PresenceChanged | ChannelEvent::CursorMoved(_)) => {}
            Err(RecvError::Lagged(missed)) => {
                // Dropped peer events cannot be replayed; re-fetch instead.
                warn!(missed, "realtime events lagged; reloading");
                store.request_reload();
            }
            Err(RecvError::Closed) => break,
        }
    }
}
