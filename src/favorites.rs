//! Single-writer front for the favorites store.
//!
//! One task owns the [`ProfileStore`]; handlers talk to it through a cloneable
//! [`FavoritesHandle`]. Requests are applied one at a time in arrival order, so
//! concurrent read-modify-write cycles on the profile file cannot interleave.
//! File I/O runs on the blocking pool so it never stalls a runtime worker.

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::store::ProfileStore;
use crate::types::{ItemRef, UserProfile};

/// Maximum queued requests before senders wait.
const QUEUE_SIZE: usize = 256;

enum Command {
    GetOrCreate {
        user_id: String,
        reply: oneshot::Sender<Result<UserProfile>>,
    },
    Add {
        user_id: String,
        item: ItemRef,
        reply: oneshot::Sender<Result<bool>>,
    },
    Remove {
        user_id: String,
        item_id: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    List {
        user_id: String,
        reply: oneshot::Sender<Result<Vec<ItemRef>>>,
    },
    IsFavorite {
        user_id: String,
        item_id: String,
        reply: oneshot::Sender<Result<bool>>,
    },
}

pub struct FavoritesService;

impl FavoritesService {
    /// Spawn the owning task. It exits once every handle has been dropped.
    pub fn spawn(store: ProfileStore) -> FavoritesHandle {
        let (tx, mut rx) = mpsc::channel::<Command>(QUEUE_SIZE);
        info!("Favorites service started ({})", store.path().display());

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                let store = store.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || apply(&store, cmd)).await {
                    warn!("Favorites request aborted: {e}");
                }
            }
            debug!("Favorites service stopped");
        });

        FavoritesHandle { tx }
    }
}

fn apply(store: &ProfileStore, cmd: Command) {
    // A dropped receiver means the caller gave up; nothing to report.
    match cmd {
        Command::GetOrCreate { user_id, reply } => {
            let _ = reply.send(store.get_or_create_profile(&user_id));
        }
        Command::Add {
            user_id,
            item,
            reply,
        } => {
            let _ = reply.send(store.add_favorite(&user_id, item));
        }
        Command::Remove {
            user_id,
            item_id,
            reply,
        } => {
            let _ = reply.send(store.remove_favorite(&user_id, &item_id));
        }
        Command::List { user_id, reply } => {
            let _ = reply.send(store.list_favorites(&user_id));
        }
        Command::IsFavorite {
            user_id,
            item_id,
            reply,
        } => {
            let _ = reply.send(store.is_favorite(&user_id, &item_id));
        }
    }
}

/// Cloneable client of the favorites service.
#[derive(Clone)]
pub struct FavoritesHandle {
    tx: mpsc::Sender<Command>,
}

impl FavoritesHandle {
    pub async fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.call(|reply| Command::GetOrCreate {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn add_favorite(&self, user_id: &str, item: ItemRef) -> Result<bool> {
        self.call(|reply| Command::Add {
            user_id: user_id.to_string(),
            item,
            reply,
        })
        .await
    }

    pub async fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<bool> {
        self.call(|reply| Command::Remove {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn list_favorites(&self, user_id: &str) -> Result<Vec<ItemRef>> {
        self.call(|reply| Command::List {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn is_favorite(&self, user_id: &str, item_id: &str) -> Result<bool> {
        self.call(|reply| Command::IsFavorite {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            reply,
        })
        .await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| anyhow!("favorites service is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("favorites service dropped the request"))?
    }
}
