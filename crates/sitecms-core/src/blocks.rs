//! Ordered, typed content blocks for the page editor.
//!
//! Each block carries a stable identifier so callers can address blocks by
//! id rather than by array position when replacing content.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::CmsError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub Ulid);

impl BlockId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-specific payload of a content block.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockBody {
    Text {
        html: String,
    },
    Heading {
        text: String,
        /// 1..=6, mirrored into the rendered `<hN>` tag.
        level: u8,
    },
    Image {
        src: String,
        #[serde(default)]
        alt: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        src: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Code {
        code: String,
        #[serde(default)]
        language: Option<String>,
    },
    Quote {
        text: String,
        #[serde(default)]
        author: Option<String>,
    },
}

impl BlockBody {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Heading { .. } => "heading",
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
            Self::Code { .. } => "code",
            Self::Quote { .. } => "quote",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Block {
    pub block_id: BlockId,
    #[serde(flatten)]
    pub body: BlockBody,
}

impl Block {
    #[must_use]
    pub fn new(body: BlockBody) -> Self {
        Self { block_id: BlockId::new(), body }
    }

    /// # Errors
    /// Returns [`CmsError::Validation`] on an out-of-range heading level or a
    /// sourceless image/video.
    pub fn validate(&self) -> Result<(), CmsError> {
        match &self.body {
            BlockBody::Heading { level, .. } if !(1..=6).contains(level) => {
                Err(CmsError::Validation(format!(
                    "heading level MUST be in 1..=6, got {level}"
                )))
            }
            BlockBody::Image { src, .. } | BlockBody::Video { src, .. }
                if src.trim().is_empty() =>
            {
                Err(CmsError::Validation(format!(
                    "{} block MUST carry a non-empty src",
                    self.body.kind()
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Insert `block` at `index`, clamping to the end when `index` is past it.
pub fn insert_block(blocks: &mut Vec<Block>, index: usize, block: Block) {
    let index = index.min(blocks.len());
    blocks.insert(index, block);
}

/// Remove and return the block at `index`, or `None` when out of range.
pub fn remove_block(blocks: &mut Vec<Block>, index: usize) -> Option<Block> {
    if index < blocks.len() {
        Some(blocks.remove(index))
    } else {
        None
    }
}

/// Swap the block at `index` with its neighbor in `direction`.
///
/// Moving the first block up or the last block down is a no-op. Returns
/// whether a swap happened.
pub fn move_block(blocks: &mut [Block], index: usize, direction: MoveDirection) -> bool {
    match direction {
        MoveDirection::Up => {
            if index == 0 || index >= blocks.len() {
                return false;
            }
            blocks.swap(index - 1, index);
            true
        }
        MoveDirection::Down => {
            if blocks.len() < 2 || index >= blocks.len() - 1 {
                return false;
            }
            blocks.swap(index, index + 1);
            true
        }
    }
}

/// Index of the block carrying `block_id`, if present.
#[must_use]
pub fn find_block(blocks: &[Block], block_id: BlockId) -> Option<usize> {
    blocks.iter().position(|block| block.block_id == block_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mk_blocks(count: usize) -> Vec<Block> {
        (0..count)
            .map(|i| Block::new(BlockBody::Text { html: format!("<p>block {i}</p>") }))
            .collect()
    }

    #[test]
    fn move_up_at_first_index_is_noop() {
        let mut blocks = mk_blocks(3);
        let before = blocks.clone();
        assert!(!move_block(&mut blocks, 0, MoveDirection::Up));
        assert_eq!(blocks, before);
    }

    #[test]
    fn move_down_at_last_index_is_noop() {
        let mut blocks = mk_blocks(3);
        let before = blocks.clone();
        assert!(!move_block(&mut blocks, 2, MoveDirection::Down));
        assert_eq!(blocks, before);
    }

    #[test]
    fn move_swaps_exactly_two_adjacent_blocks() {
        let mut blocks = mk_blocks(4);
        let before = blocks.clone();
        assert!(move_block(&mut blocks, 1, MoveDirection::Down));
        assert_eq!(blocks.len(), before.len());
        assert_eq!(blocks[1], before[2]);
        assert_eq!(blocks[2], before[1]);
        assert_eq!(blocks[0], before[0]);
        assert_eq!(blocks[3], before[3]);
    }

    #[test]
    fn insert_past_end_appends() {
        let mut blocks = mk_blocks(2);
        let tail = Block::new(BlockBody::Heading { text: "Team".to_string(), level: 2 });
        let tail_id = tail.block_id;
        insert_block(&mut blocks, 99, tail);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].block_id, tail_id);
    }

    #[test]
    fn remove_out_of_range_returns_none() {
        let mut blocks = mk_blocks(2);
        assert!(remove_block(&mut blocks, 5).is_none());
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn heading_level_out_of_range_is_rejected() {
        let block = Block::new(BlockBody::Heading { text: "Hours".to_string(), level: 7 });
        match block.validate() {
            Ok(()) => panic!("expected heading level rejection"),
            Err(err) => assert!(err.to_string().contains("heading level MUST be in 1..=6")),
        }
    }

    #[test]
    fn block_list_round_trips_through_json() {
        let blocks = vec![
            Block::new(BlockBody::Heading { text: "Our services".to_string(), level: 2 }),
            Block::new(BlockBody::Text { html: "<p>Walk-ins welcome.</p>".to_string() }),
            Block::new(BlockBody::Code {
                code: "SELECT 1;".to_string(),
                language: Some("sql".to_string()),
            }),
            Block::new(BlockBody::Quote {
                text: "Best clinic in town".to_string(),
                author: Some("A patient".to_string()),
            }),
        ];
        let json = match serde_json::to_string(&blocks) {
            Ok(json) => json,
            Err(err) => panic!("blocks should serialize: {err}"),
        };
        let restored: Vec<Block> = match serde_json::from_str(&json) {
            Ok(blocks) => blocks,
            Err(err) => panic!("blocks should deserialize: {err}"),
        };
        assert_eq!(restored, blocks);
    }

    proptest! {
        #[test]
        fn move_preserves_length_and_multiset(len in 0usize..8, index in 0usize..8, down in any::<bool>()) {
            let mut blocks = mk_blocks(len);
            let before = blocks.clone();
            let direction = if down { MoveDirection::Down } else { MoveDirection::Up };
            move_block(&mut blocks, index, direction);
            prop_assert_eq!(blocks.len(), before.len());
            let mut sorted_after: Vec<_> = blocks.iter().map(|b| b.block_id).collect();
            let mut sorted_before: Vec<_> = before.iter().map(|b| b.block_id).collect();
            sorted_after.sort();
            sorted_before.sort();
            prop_assert_eq!(sorted_after, sorted_before);
        }

        #[test]
        fn move_up_then_down_restores_order(len in 2usize..8, index in 1usize..8) {
            prop_assume!(index < len);
            let mut blocks = mk_blocks(len);
            let before = blocks.clone();
            prop_assert!(move_block(&mut blocks, index, MoveDirection::Up));
            prop_assert!(move_block(&mut blocks, index - 1, MoveDirection::Down));
            prop_assert_eq!(blocks, before);
        }
    }
}
