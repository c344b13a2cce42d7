// src/commands/api.rs
//! The application context: one explicit handle over config, both stores,
//! the generation client, and the session image memo.
//!
//! Constructed once at application start and passed to whatever drives the
//! UI — there is no process-global storage state. Opening the same root
//! twice yields handles over the same on-disk data.

use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

use crate::config::CoreConfig;
use crate::entities::{ImageRef, InterviewSession, PromptCard, Senior, Story, StoryFormat};
use crate::errors::StoreError;
use crate::services::generation::{GenerationClient, HttpApi, ImageOutcome, RemoteApi};
use crate::services::{BlobCache, ImageResolver, RecordStore};
use crate::utils::logbook;

pub struct Context {
    pub config: CoreConfig,
    pub records: RecordStore,
    pub images: BlobCache,
    pub generation: GenerationClient,
    pub resolver: ImageResolver,
    logbook: PathBuf,
}

impl Context {
    /// Open (creating on first use) everything under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let config = CoreConfig::load(&root)?;
        let api = Box::new(HttpApi::new(config.generation.clone()));
        Self::build(config, api)
    }

    /// Like [`Context::open`], with the remote transport substituted.
    pub fn with_api(root: impl Into<PathBuf>, api: Box<dyn RemoteApi>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let config = CoreConfig::load(&root)?;
        Self::build(config, api)
    }

    fn build(config: CoreConfig, api: Box<dyn RemoteApi>) -> Result<Self> {
        let records = RecordStore::open(&config.storage.record_db, config.storage.quota_bytes)?;
        let images = BlobCache::open(&config.storage.image_cache)?;
        let generation = GenerationClient::new(api, images.clone());
        let logbook = config.storage.logbook.clone();
        tracing::info!(name = %config.system.name, "context opened");
        Ok(Self {
            config,
            records,
            images,
            generation,
            resolver: ImageResolver::new(),
            logbook,
        })
    }

    // ---- seniors ----------------------------------------------------------

    pub fn add_senior(&self, senior: Senior) -> Result<Senior, StoreError> {
        let senior = self.records.create(senior)?;
        self.log_event("senior_added", json!({ "id": senior.id, "name": senior.name }));
        Ok(senior)
    }

    pub fn seniors(&self) -> Result<Vec<Senior>, StoreError> {
        self.records.list(None, None)
    }

    pub fn update_senior(&self, id: &str, patch: Value) -> Result<Option<Senior>, StoreError> {
        self.records.update(id, patch)
    }

    /// Display name for a senior id. Stories may reference seniors that no
    /// longer resolve; those read as "Unknown".
    pub fn senior_name(&self, id: &str) -> Result<String, StoreError> {
        let matches: Vec<Senior> = self.records.filter(&[("id", json!(id))])?;
        Ok(matches
            .into_iter()
            .next()
            .map(|s| s.name)
            .unwrap_or_else(|| "Unknown".to_string()))
    }

    // ---- stories ----------------------------------------------------------

    pub fn save_story(&self, story: Story) -> Result<Story, StoreError> {
        let story = self.records.create(story)?;
        self.log_event(
            "story_saved",
            json!({ "id": story.id, "senior_id": story.senior_id, "title": story.title }),
        );
        Ok(story)
    }

    /// Newest first.
    pub fn stories(&self, limit: Option<usize>) -> Result<Vec<Story>, StoreError> {
        self.records.list(Some("-created_date"), limit)
    }

    pub fn story(&self, id: &str) -> Result<Option<Story>, StoreError> {
        let matches: Vec<Story> = self.records.filter(&[("id", json!(id))])?;
        Ok(matches.into_iter().next())
    }

    pub fn stories_for(&self, senior_id: &str) -> Result<Vec<Story>, StoreError> {
        self.records.filter(&[("senior_id", json!(senior_id))])
    }

    /// Append a generated presentation format to a story.
    pub fn attach_format(
        &self,
        story_id: &str,
        format: StoryFormat,
    ) -> Result<Option<Story>, StoreError> {
        let Some(story) = self.story(story_id)? else {
            return Ok(None);
        };
        let mut formats = story.story_formats;
        formats.push(format);
        let updated = self
            .records
            .update::<Story>(story_id, json!({ "story_formats": formats }))?;
        if let Some(story) = &updated {
            self.log_event(
                "format_attached",
                json!({ "id": story.id, "formats": story.story_formats.len() }),
            );
        }
        Ok(updated)
    }

    // ---- sessions ---------------------------------------------------------

    pub fn log_session(&self, session: InterviewSession) -> Result<InterviewSession, StoreError> {
        let session = self.records.create(session)?;
        self.log_event(
            "session_logged",
            json!({ "id": session.id, "senior_id": session.senior_id }),
        );
        Ok(session)
    }

    pub fn sessions_for(&self, senior_id: &str) -> Result<Vec<InterviewSession>, StoreError> {
        self.records.filter(&[("senior_id", json!(senior_id))])
    }

    // ---- prompt cards -----------------------------------------------------

    /// List the prompt deck, seeding the defaults the first time the
    /// collection is read empty.
    pub fn prompt_cards(&self) -> Result<Vec<PromptCard>, StoreError> {
        let cards: Vec<PromptCard> = self.records.list(None, None)?;
        if !cards.is_empty() {
            return Ok(cards);
        }
        let seeded = self.records.bulk_create(PromptCard::defaults())?;
        self.log_event("prompts_seeded", json!({ "count": seeded.len() }));
        Ok(seeded)
    }

    pub fn add_prompt_card(&self, card: PromptCard) -> Result<PromptCard, StoreError> {
        self.records.create(card)
    }

    // ---- images -----------------------------------------------------------

    /// Resolve an image reference for display (cache, session memo, or
    /// generation — placeholder in the worst case).
    pub fn resolve_image(&self, image: &ImageRef) -> ImageOutcome {
        self.resolver.resolve(&self.generation, image)
    }

    fn log_event(&self, event: &str, data: Value) {
        if let Err(err) = logbook::emit_event(&self.logbook, event, data) {
            tracing::warn!(event, %err, "failed to append logbook event");
        }
    }
}
