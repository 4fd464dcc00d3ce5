//! Where an incoming media URL lands.
//!
//! An [`ActiveEditTarget`] names a block (or the post thumbnail) plus an
//! optional sub-field and option id. [`resolve`] turns it into a
//! [`WritePath`] for a concrete block, and [`WritePath::apply`] produces
//! the updated block without touching the original.

use serde::{Deserialize, Serialize};

use crate::blocks::{BeforeAfterData, Block, BlockContent, FlipCardData};

/// Sub-field that addresses poll/versus options
pub const OPTIONS_FIELD: &str = "options";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum TargetId {
    Thumbnail,
    Block(String),
}

/// Session pointer for the next media commit; consumed once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEditTarget {
    pub target: TargetId,
    pub sub_field: Option<String>,
    pub option_id: Option<String>,
}

impl ActiveEditTarget {
    pub fn thumbnail() -> Self {
        Self {
            target: TargetId::Thumbnail,
            sub_field: None,
            option_id: None,
        }
    }

    pub fn block(id: impl Into<String>) -> Self {
        Self {
            target: TargetId::Block(id.into()),
            sub_field: None,
            option_id: None,
        }
    }

    pub fn with_sub_field(mut self, sub_field: impl Into<String>) -> Self {
        self.sub_field = Some(sub_field.into());
        self
    }

    pub fn with_option(mut self, option_id: impl Into<String>) -> Self {
        self.sub_field = Some(OPTIONS_FIELD.to_string());
        self.option_id = Some(option_id.into());
        self
    }

    pub fn block_id(&self) -> Option<&str> {
        match &self.target {
            TargetId::Block(id) => Some(id),
            TargetId::Thumbnail => None,
        }
    }
}

/// Resolved write location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePath {
    /// Post-level thumbnail, not a block field
    Thumbnail,
    /// Push onto a gallery's `mediaUrls`
    SliderAppend,
    /// Named slot of a flip-card or before/after record
    ImageSlot(String),
    /// `image` of the poll/versus option with this id
    OptionImage(String),
    MediaUrl,
    /// Nothing in this block can take the URL
    Unresolved,
}

/// Decide where a URL for `target` goes inside `block`
pub fn resolve(block: &Block, target: &ActiveEditTarget) -> WritePath {
    if target.target == TargetId::Thumbnail {
        return WritePath::Thumbnail;
    }

    let sub_field = target.sub_field.as_deref();

    match &block.content {
        BlockContent::Slider(_) => WritePath::SliderAppend,
        BlockContent::Flipcard(_) => {
            image_slot(sub_field, &FlipCardData::IMAGE_SLOTS)
        }
        BlockContent::Beforeafter(_) => {
            image_slot(sub_field, &BeforeAfterData::IMAGE_SLOTS)
        }
        BlockContent::Poll(poll) | BlockContent::Vs(poll) => {
            match (sub_field, target.option_id.as_deref()) {
                (Some(OPTIONS_FIELD), Some(option_id)) => {
                    if poll.options.iter().any(|o| o.id == option_id) {
                        WritePath::OptionImage(option_id.to_string())
                    } else {
                        WritePath::Unresolved
                    }
                }
                _ => WritePath::MediaUrl,
            }
        }
        BlockContent::Image(_)
        | BlockContent::Video(_)
        | BlockContent::Audio(_)
        | BlockContent::File(_)
        | BlockContent::Social(_) => WritePath::MediaUrl,
        BlockContent::Text {}
        | BlockContent::Review(_)
        | BlockContent::Quote(_)
        | BlockContent::Iframe(_)
        | BlockContent::Quiz(_)
        | BlockContent::Faq(_) => WritePath::Unresolved,
    }
}

fn image_slot(sub_field: Option<&str>, slots: &[&str; 2]) -> WritePath {
    match sub_field {
        None => WritePath::ImageSlot(slots[0].to_string()),
        Some(name) if slots.contains(&name) => WritePath::ImageSlot(name.to_string()),
        Some(_) => WritePath::Unresolved,
    }
}

impl WritePath {
    /// New block with exactly this path set to `url`.
    ///
    /// `None` for paths that do not live on the block (thumbnail) or that
    /// the block cannot take.
    pub fn apply(&self, block: &Block, url: &str) -> Option<Block> {
        let mut updated = block.clone();

        let written = match (self, &mut updated.content) {
            (WritePath::SliderAppend, BlockContent::Slider(slider)) => {
                slider.media_urls.push(url.to_string());
                true
            }
            (WritePath::ImageSlot(slot), BlockContent::Flipcard(card)) => card.set_image(slot, url),
            (WritePath::ImageSlot(slot), BlockContent::Beforeafter(pair)) => {
                pair.set_image(slot, url)
            }
            (WritePath::OptionImage(option_id), BlockContent::Poll(poll))
            | (WritePath::OptionImage(option_id), BlockContent::Vs(poll)) => {
                match poll.options.iter_mut().find(|o| &o.id == option_id) {
                    Some(option) => {
                        option.image = url.to_string();
                        true
                    }
                    None => false,
                }
            }
            (WritePath::MediaUrl, BlockContent::Poll(poll))
            | (WritePath::MediaUrl, BlockContent::Vs(poll)) => {
                poll.media_url = url.to_string();
                true
            }
            (WritePath::MediaUrl, BlockContent::Image(media))
            | (WritePath::MediaUrl, BlockContent::Video(media))
            | (WritePath::MediaUrl, BlockContent::Audio(media))
            | (WritePath::MediaUrl, BlockContent::File(media))
            | (WritePath::MediaUrl, BlockContent::Social(media)) => {
                media.media_url = url.to_string();
                true
            }
            _ => false,
        };

        written.then_some(updated)
    }
}

/// Resolve and apply in one step
pub fn apply_to_block(block: &Block, target: &ActiveEditTarget, url: &str) -> Option<Block> {
    resolve(block, target).apply(block, url)
}
