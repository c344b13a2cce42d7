// src/services/resolver.rs
//! Display-time image resolution with two memo tiers.
//!
//! Some image references carry a stable id (storybook scenes written
//! through the cache); others only ever carry a prompt (ad hoc
//! illustrations). The id tier is the permanent blob cache. The prompt tier
//! is a session-scoped memo keyed by a hash of the prompt: it stops a
//! prompt-only image from regenerating every time it is rendered, while
//! accepting that it may come out different after a restart.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::entities::ImageRef;
use crate::services::generation::{placeholder_outcome, GenerationClient, ImageOutcome};

#[derive(Default)]
pub struct ImageResolver {
    memo: Mutex<HashMap<String, ImageOutcome>>,
}

impl ImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference to something displayable. Never fails: the worst
    /// case is a placeholder descriptor.
    pub fn resolve(&self, client: &GenerationClient, image: &ImageRef) -> ImageOutcome {
        // An inline URL (not yet persisted) displays as-is.
        if let Some(url) = &image.url {
            return ImageOutcome {
                id: image.id.clone().unwrap_or_default(),
                url: url.clone(),
                prompt: image.prompt.clone().unwrap_or_default(),
                mime_type: image.mime_type.clone(),
                generated: image.generated.unwrap_or(false),
                from_cache: false,
                is_fallback: false,
            };
        }

        if let Some(id) = &image.id {
            if let Some(hit) = client.load_image(id) {
                return hit;
            }
            tracing::debug!(id, "image not in cache; serving placeholder");
            return placeholder_outcome(
                image.prompt.as_deref().unwrap_or("Image unavailable"),
                Some(id),
            );
        }

        if let Some(prompt) = &image.prompt {
            let key = blake3::hash(prompt.as_bytes()).to_hex().to_string();
            {
                let memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(hit) = memo.get(&key) {
                    return hit.clone();
                }
            }
            let outcome = client.generate_image(prompt, None);
            self.memo
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, outcome.clone());
            return outcome;
        }

        placeholder_outcome("Image unavailable", None)
    }
}
