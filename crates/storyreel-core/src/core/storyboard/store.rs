//! Storyboard Store
//!
//! Copy-on-write holder for the [`Storyboard`] state container. Writers clone
//! the current value, mutate the clone and swap it in as a whole; readers get
//! consistent `Arc` snapshots that never observe a half-applied update.
//!
//! When a [`KeyValueStore`] is attached every committed update is persisted
//! under [`STORYBOARD_KEY`]. A failed save is logged and the store keeps
//! working in memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::{Actor, GeneratedImage, SceneAnchor, Shot, Storyboard};
use crate::core::storage::KeyValueStore;
use crate::core::versions::{self, Scene};
use crate::core::{CoreError, CoreResult};

/// Key the storyboard is persisted under
pub const STORYBOARD_KEY: &str = "storyboard";

pub struct StoryboardStore {
    state: RwLock<Arc<Storyboard>>,
    persistence: Option<Arc<dyn KeyValueStore>>,
    memory_only: AtomicBool,
}

impl std::fmt::Debug for StoryboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryboardStore")
            .field("persistent", &self.persistence.is_some())
            .field("memory_only", &self.is_memory_only())
            .finish_non_exhaustive()
    }
}

impl Default for StoryboardStore {
    fn default() -> Self {
        Self::new(Storyboard::default())
    }
}

impl StoryboardStore {
    /// In-memory store seeded with a storyboard
    pub fn new(storyboard: Storyboard) -> Self {
        Self {
            state: RwLock::new(Arc::new(storyboard)),
            persistence: None,
            memory_only: AtomicBool::new(false),
        }
    }

    /// Loads the persisted storyboard, starting empty if there is none or it
    /// cannot be read
    pub async fn open(persistence: Arc<dyn KeyValueStore>) -> Self {
        let storyboard = match persistence.load(STORYBOARD_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Storyboard>(&json) {
                Ok(storyboard) => {
                    info!(
                        "Loaded storyboard: {} shots, {} scenes",
                        storyboard.shots.len(),
                        storyboard.scenes.len()
                    );
                    storyboard
                }
                Err(e) => {
                    warn!("Stored storyboard is corrupt, starting empty: {}", e);
                    Storyboard::default()
                }
            },
            Ok(None) => Storyboard::default(),
            Err(e) => {
                warn!("Failed to load storyboard, starting empty: {}", e);
                Storyboard::default()
            }
        };

        Self {
            state: RwLock::new(Arc::new(storyboard)),
            persistence: Some(persistence),
            memory_only: AtomicBool::new(false),
        }
    }

    /// Consistent read-only view of the current state
    pub async fn snapshot(&self) -> Arc<Storyboard> {
        self.state.read().await.clone()
    }

    /// True after a persistence failure; updates still apply in memory
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::Relaxed)
    }

    /// Applies `f` to a copy of the state and commits it only on success.
    ///
    /// An `Err` from `f` leaves the stored state untouched.
    pub async fn update<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Storyboard) -> CoreResult<T>,
    {
        let mut guard = self.state.write().await;
        let mut next = Storyboard::clone(&guard);
        let output = f(&mut next)?;
        let committed = Arc::new(next);
        *guard = committed.clone();

        // Persist under the write lock so saves land in commit order
        self.persist(&committed).await;
        drop(guard);
        Ok(output)
    }

    async fn persist(&self, storyboard: &Storyboard) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        let json = match serde_json::to_string(storyboard) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize storyboard: {}", e);
                return;
            }
        };

        match persistence.save(STORYBOARD_KEY, &json).await {
            Ok(()) => {
                debug!("Storyboard persisted ({} bytes)", json.len());
                if self.memory_only.swap(false, Ordering::Relaxed) {
                    info!("Storyboard persistence recovered");
                }
            }
            Err(e) => {
                if !self.memory_only.swap(true, Ordering::Relaxed) {
                    warn!("Failed to persist storyboard, continuing in memory: {}", e);
                }
            }
        }
    }

    // =========================================================================
    // Whole-value updates
    // =========================================================================

    /// Inserts or replaces a shot by id and recompiles the scenes using it
    pub async fn upsert_shot(&self, shot: Shot) -> CoreResult<()> {
        self.update(|board| {
            let changed = [shot.id.clone()];
            board.upsert_shot(shot);
            versions::refresh_scenes(board, &changed)?;
            Ok(())
        })
        .await
    }

    /// Appends to a shot's generated-image history
    pub async fn append_shot_image(&self, shot_id: &str, image: GeneratedImage) -> CoreResult<()> {
        self.update(|board| {
            let shot = board
                .shot_mut(shot_id)
                .ok_or_else(|| CoreError::ShotNotFound(shot_id.to_string()))?;
            shot.generated_images.push(image);
            Ok(())
        })
        .await
    }

    /// Inserts or replaces an actor by id
    pub async fn upsert_actor(&self, actor: Actor) -> CoreResult<()> {
        self.update(|board| {
            board.actors.upsert(actor);
            Ok(())
        })
        .await
    }

    pub async fn set_anchor(&self, anchor: Option<SceneAnchor>) -> CoreResult<()> {
        self.update(|board| {
            board.anchor = anchor;
            Ok(())
        })
        .await
    }

    /// Replaces an existing scene with a new value
    pub async fn replace_scene(&self, scene: Scene) -> CoreResult<()> {
        self.update(|board| {
            let slot = board
                .scene_mut(&scene.id)
                .ok_or_else(|| CoreError::SceneNotFound(scene.id.clone()))?;
            *slot = scene;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_failed_update_leaves_state_untouched() {
        let store = StoryboardStore::new(Storyboard::default());
        store.upsert_shot(Shot::new("a").with_id("s1")).await.unwrap();
        let before = store.snapshot().await;

        let result: CoreResult<()> = store
            .update(|board| {
                board.shots.clear();
                Err(CoreError::PolicyViolation("nope".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(*store.snapshot().await, *before);
    }

    #[tokio::test]
    async fn test_snapshots_are_isolated() {
        let store = StoryboardStore::default();
        let empty = store.snapshot().await;
        store.upsert_shot(Shot::new("a")).await.unwrap();
        assert!(empty.shots.is_empty());
        assert_eq!(store.snapshot().await.shots.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_shot_recompiles_scene() {
        let store = StoryboardStore::default();
        store.upsert_shot(Shot::new("Dawn").with_id("s1")).await.unwrap();
        let scene_id = store
            .update(|board| versions::create_scene(board, versions::NewScene::new("Day", vec!["s1".to_string()])))
            .await
            .unwrap();

        store
            .upsert_shot(Shot::new("Dusk").with_id("s1").with_duration("7s"))
            .await
            .unwrap();
        let board = store.snapshot().await;
        let draft = &board.scene(&scene_id).unwrap().draft_prompt;
        assert!(draft.contains("[0s-7s] Dusk"));
        assert!(draft.contains("--duration 10s"));
    }

    #[tokio::test]
    async fn test_append_image_unknown_shot() {
        let store = StoryboardStore::default();
        let err = store
            .append_shot_image("missing", GeneratedImage::new("https://x", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ShotNotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_all_entries() {
        let store = Arc::new(StoryboardStore::default());
        store.upsert_shot(Shot::new("a").with_id("s1")).await.unwrap();
        store.upsert_shot(Shot::new("b").with_id("s2")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let shot_id = if i % 2 == 0 { "s1" } else { "s2" };
            handles.push(tokio::spawn(async move {
                store
                    .append_shot_image(shot_id, GeneratedImage::new(format!("https://x/{}", i), "p"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let board = store.snapshot().await;
        assert_eq!(board.shot("s1").unwrap().generated_images.len(), 5);
        assert_eq!(board.shot("s2").unwrap().generated_images.len(), 5);
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let store = StoryboardStore::open(kv.clone()).await;
        store.upsert_actor(Actor::new("a1", "Mara")).await.unwrap();

        let reopened = StoryboardStore::open(kv).await;
        assert_eq!(reopened.snapshot().await.actors.get("a1").unwrap().name, "Mara");
    }

    #[tokio::test]
    async fn test_quota_failure_falls_back_to_memory() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::with_quota(8));
        let store = StoryboardStore::open(kv).await;
        store
            .upsert_shot(Shot::new("a long description that will not fit"))
            .await
            .unwrap();
        assert!(store.is_memory_only());
        assert_eq!(store.snapshot().await.shots.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_persisted_state_starts_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.save(STORYBOARD_KEY, "{broken").await.unwrap();
        let store = StoryboardStore::open(kv).await;
        assert!(store.snapshot().await.shots.is_empty());
    }
}
