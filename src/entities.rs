//! Record shapes persisted by the record store.
//!
//! Collections were designed for a browser key-value store, so the wire
//! layout is JSON with the original field names (`mimeType`, `senior_id`,
//! ...). Every optional field is modeled as `Option` and skipped when
//! absent, which keeps stored records small and makes the size-reduction
//! laws checkable on the serialized form.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::services::reducer;

/// Where a freshly created record lands in its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrder {
    /// Newest first (stories).
    Prepend,
    /// Insertion order (everything else).
    Append,
}

/// Retention window for history-capped collections.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    /// Entries kept under normal conditions.
    pub cap: usize,
    /// Entries kept after a quota-exceeded shrink.
    pub floor: usize,
}

/// A record kind the store knows how to persist.
///
/// `sanitize` runs on every create/update/bulk-create before the first
/// persist attempt; stories use it to strip inline image payloads.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: &'static str;
    const INSERT: InsertOrder;
    const RETENTION: Option<Retention> = None;

    fn id(&self) -> &str;
    fn assign_identity(&mut self, id: String, created_date: String);

    fn sanitize(self) -> Self {
        self
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A reference to a generated image.
///
/// In memory this may carry a full `url` (a data URI or remote address); at
/// rest inside a story it must not — the reducer projects it down to id plus
/// small metadata, and the payload lives in the blob cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<bool>,
}

// ---------------------------------------------------------------------------
// Seniors
// ---------------------------------------------------------------------------

/// An interview subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Senior {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    /// Free-text appearance description, used to condition image prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub favorite_topics: Vec<String>,
}

impl Record for Senior {
    const COLLECTION: &'static str = "seniors";
    const INSERT: InsertOrder = InsertOrder::Append;

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_identity(&mut self, id: String, created_date: String) {
        self.id = id;
        self.created_date = Some(created_date);
    }
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

/// One narrative record distilled from an interview session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default)]
    pub senior_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_approximate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people_mentioned: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub story_formats: Vec<StoryFormat>,
}

impl Record for Story {
    const COLLECTION: &'static str = "stories";
    const INSERT: InsertOrder = InsertOrder::Prepend;
    const RETENTION: Option<Retention> = Some(Retention { cap: 50, floor: 20 });

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_identity(&mut self, id: String, created_date: String) {
        self.id = id;
        self.created_date = Some(created_date);
    }

    fn sanitize(self) -> Self {
        reducer::reduce_story(&self)
    }
}

/// One generated presentation of a story (storybook, comic, slideshow, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryFormat {
    #[serde(default)]
    pub format_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slides: Vec<Slide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// One interview sitting. Append-only; there is no update path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default)]
    pub senior_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_topics: Vec<String>,
    #[serde(default)]
    pub breaks_taken: u32,
    /// Ids of the stories produced during this sitting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stories_created: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Record for InterviewSession {
    const COLLECTION: &'static str = "sessions";
    const INSERT: InsertOrder = InsertOrder::Append;

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_identity(&mut self, id: String, created_date: String) {
        self.id = id;
        self.created_date = Some(created_date);
    }
}

// ---------------------------------------------------------------------------
// Prompt cards
// ---------------------------------------------------------------------------

/// A conversation starter for interviewers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptCard {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips_for_interviewer: Option<String>,
    #[serde(default)]
    pub dementia_friendly: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensory_triggers: Vec<String>,
}

impl Record for PromptCard {
    const COLLECTION: &'static str = "prompts";
    const INSERT: InsertOrder = InsertOrder::Append;

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_identity(&mut self, id: String, created_date: String) {
        self.id = id;
        self.created_date = Some(created_date);
    }
}

impl PromptCard {
    /// Starter deck written into the `prompts` collection the first time it
    /// is read empty.
    pub fn defaults() -> Vec<PromptCard> {
        vec![
            PromptCard {
                category: "childhood".into(),
                prompt_text: "What games did you play as a child?".into(),
                follow_up_prompts: vec![
                    "Who did you play with?".into(),
                    "Where was your favorite place to play?".into(),
                ],
                tips_for_interviewer: Some(
                    "If they mention toys, ask them to describe what they looked like".into(),
                ),
                dementia_friendly: true,
                sensory_triggers: vec![
                    "Old photos of toys".into(),
                    "Children's songs from their era".into(),
                ],
                ..Default::default()
            },
            PromptCard {
                category: "family".into(),
                prompt_text: "What did a typical Sunday look like in your family?".into(),
                follow_up_prompts: vec![
                    "Who prepared the meals?".into(),
                    "Did you have family traditions?".into(),
                ],
                tips_for_interviewer: Some(
                    "Family gatherings often bring back strong memories".into(),
                ),
                dementia_friendly: true,
                sensory_triggers: vec!["Sunday dinner smells".into(), "Church bells".into()],
                ..Default::default()
            },
        ]
    }
}
