// src/services/reducer.rs
//! Size reduction for stories before they hit the record store.
//!
//! The record shelves live inside a few-MB quota, and a single generated
//! image arrives as a multi-hundred-KB data URI. Persisting one inline is
//! the exact bug class this transform exists to prevent: every image
//! reference reachable in a story is projected down to its cache id plus
//! small metadata, and the payload stays in the blob cache.
//!
//! The transform is pure: it never mutates its input, and applying it twice
//! gives the same value as applying it once.

use crate::entities::{ImageRef, Story, StoryFormat};

/// Formats kept per story; older ones are dropped first.
pub const MAX_FORMATS: usize = 10;

/// Project an image reference down to `{id, prompt, mimeType, scene_number,
/// generated}` — no payload, no temporary URL.
pub fn strip_image(image: &ImageRef) -> ImageRef {
    ImageRef {
        id: image.id.clone(),
        url: None,
        prompt: image.prompt.clone(),
        mime_type: image.mime_type.clone(),
        scene_number: image.scene_number,
        generated: image.generated,
    }
}

/// Return a copy of `story` that is safe to persist in the quota-limited
/// record store.
pub fn reduce_story(story: &Story) -> Story {
    let mut out = story.clone();

    out.cover_image = out.cover_image.as_ref().map(strip_image);
    out.generated_images = out.generated_images.iter().map(strip_image).collect();
    out.story_formats = out.story_formats.iter().map(reduce_format).collect();

    // Formats are appended over time; keep the most recent.
    if out.story_formats.len() > MAX_FORMATS {
        let drop = out.story_formats.len() - MAX_FORMATS;
        tracing::warn!(
            story_id = %out.id,
            dropped = drop,
            "story exceeds format cap; keeping the {MAX_FORMATS} most recent"
        );
        out.story_formats.drain(..drop);
    }

    out
}

fn reduce_format(format: &StoryFormat) -> StoryFormat {
    let mut out = format.clone();
    out.images = out.images.iter().map(strip_image).collect();
    for scene in &mut out.scenes {
        scene.image = scene.image.as_ref().map(strip_image);
    }
    for slide in &mut out.slides {
        slide.image = slide.image.as_ref().map(strip_image);
    }
    out
}
