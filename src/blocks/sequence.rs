use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::blocks::types::Block;

/// How order numbers are kept in step with array order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SequencingMode {
    Asc,
    Desc,
    /// Numbered ascending, but badges are not shown
    #[serde(rename = "none")]
    Plain,
}

impl SequencingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequencingMode::Asc => "asc",
            SequencingMode::Desc => "desc",
            SequencingMode::Plain => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SequencingMode::Asc),
            "desc" => Some(SequencingMode::Desc),
            "none" => Some(SequencingMode::Plain),
            _ => None,
        }
    }

    /// Order number for `position` in a sequence of `len` blocks
    pub fn number_for(&self, position: usize, len: usize) -> u32 {
        match self {
            SequencingMode::Asc | SequencingMode::Plain => (position + 1) as u32,
            SequencingMode::Desc => (len - position) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Ordered block list with order-number bookkeeping.
///
/// Serializes as the plain block array; the sequencing mode is session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Block>", from = "Vec<Block>")]
pub struct BlockSequence {
    blocks: Vec<Block>,
    mode: Option<SequencingMode>,
}

impl BlockSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt loaded blocks in stored array order, fixing ids and missing numbers
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut sequence = BlockSequence { blocks, mode: None };
        sequence.repair();
        sequence
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn mode(&self) -> Option<SequencingMode> {
        self.mode
    }

    pub fn order_badges_visible(&self) -> bool {
        self.mode != Some(SequencingMode::Plain)
    }

    pub fn find(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Append at the end.
    ///
    /// With an active mode the whole sequence is renumbered; otherwise only
    /// the new block is numbered `max + 1`, leaving user-chosen gaps alone.
    pub fn append(&mut self, mut block: Block) {
        match self.mode {
            Some(mode) => {
                self.blocks.push(block);
                self.renumber(mode);
            }
            None => {
                block.order_number = self.next_free_number();
                self.blocks.push(block);
            }
        }
        tracing::debug!(len = self.blocks.len(), "appended block");
    }

    /// Insert at `index` (clamped to the end)
    pub fn insert_at(&mut self, index: usize, mut block: Block) {
        let index = index.min(self.blocks.len());
        if self.mode.is_none() {
            block.order_number = self.next_free_number();
        }
        self.blocks.insert(index, block);
        if let Some(mode) = self.mode {
            self.renumber(mode);
        }
    }

    /// Remove the block with `id`.
    ///
    /// When `mandatory` is set the sequence never drops to zero blocks; the
    /// refused removal is a silent no-op. Returns whether a block was removed.
    pub fn remove(&mut self, id: &str, mandatory: bool) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };

        if mandatory && self.blocks.len() <= 1 {
            tracing::debug!(id, "refusing to remove the last mandatory block");
            return false;
        }

        self.blocks.remove(index);
        if let Some(mode) = self.mode {
            self.renumber(mode);
        }
        true
    }

    /// Swap the block at `index` with its neighbour; no-op at the edges
    pub fn move_block(&mut self, index: usize, direction: Direction) -> bool {
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.blocks.len() => index + 1,
            _ => return false,
        };
        if index >= self.blocks.len() {
            return false;
        }

        self.blocks.swap(index, target);
        if let Some(mode) = self.mode {
            self.renumber(mode);
        }
        true
    }

    /// Drag-and-drop reorder: take the block at `from` and drop it at `to`
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        if from >= self.blocks.len() || from == to {
            return false;
        }
        let to = to.min(self.blocks.len() - 1);
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        if let Some(mode) = self.mode {
            self.renumber(mode);
        }
        true
    }

    /// Activate `mode` and renumber immediately
    pub fn set_mode(&mut self, mode: SequencingMode) {
        self.mode = Some(mode);
        self.renumber(mode);
        tracing::debug!(mode = mode.as_str(), "sequencing mode set");
    }

    /// Apply `f` to the block with `id`; false when no block matches
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Block),
    {
        match self.blocks.iter_mut().find(|b| b.id == id) {
            Some(block) => {
                let order_number = block.order_number;
                let block_id = block.id.clone();
                f(block);
                // Identity and position are owned by the sequence
                block.id = block_id;
                block.order_number = order_number;
                true
            }
            None => false,
        }
    }

    /// Swap in a new value for the block with the same id
    pub fn replace(&mut self, block: Block) -> bool {
        match self.blocks.iter_mut().find(|b| b.id == block.id) {
            Some(slot) => {
                let order_number = slot.order_number;
                *slot = block;
                slot.order_number = order_number;
                true
            }
            None => false,
        }
    }

    /// Restore the invariants of a loaded sequence.
    ///
    /// Array order is document order and is never changed here.
    pub fn repair(&mut self) {
        let mut seen = HashSet::new();
        for block in &mut self.blocks {
            if block.id.is_empty() || !seen.insert(block.id.clone()) {
                let fresh = uuid::Uuid::new_v4().to_string();
                tracing::warn!(old = %block.id, new = %fresh, "regenerated duplicate block id");
                block.id = fresh.clone();
                seen.insert(fresh);
            }
        }

        match self.mode {
            Some(mode) => self.renumber(mode),
            None => {
                // Zero means "never numbered"
                let mut next = self.blocks.iter().map(|b| b.order_number).max().unwrap_or(0);
                for block in &mut self.blocks {
                    if block.order_number == 0 {
                        next += 1;
                        block.order_number = next;
                    }
                }
            }
        }
    }

    fn renumber(&mut self, mode: SequencingMode) {
        let len = self.blocks.len();
        for (position, block) in self.blocks.iter_mut().enumerate() {
            block.order_number = mode.number_for(position, len);
        }
    }

    fn next_free_number(&self) -> u32 {
        self.blocks.iter().map(|b| b.order_number).max().unwrap_or(0) + 1
    }
}

impl From<Vec<Block>> for BlockSequence {
    fn from(blocks: Vec<Block>) -> Self {
        BlockSequence::from_blocks(blocks)
    }
}

impl From<BlockSequence> for Vec<Block> {
    fn from(sequence: BlockSequence) -> Self {
        sequence.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::types::BlockKind;

    fn block(id: &str, kind: BlockKind) -> Block {
        let mut b = Block::new(kind);
        b.id = id.to_string();
        b
    }

    fn ids(seq: &BlockSequence) -> Vec<&str> {
        seq.blocks().iter().map(|b| b.id.as_str()).collect()
    }

    fn numbers(seq: &BlockSequence) -> Vec<u32> {
        seq.blocks().iter().map(|b| b.order_number).collect()
    }

    #[test]
    fn test_append_without_mode_uses_max_plus_one() {
        let mut seq = BlockSequence::new();
        seq.append(block("a", BlockKind::Text));
        seq.update("a", |b| b.order_number = 7);
        // update keeps numbering owned by the sequence
        assert_eq!(numbers(&seq), vec![1]);

        let mut loaded = block("x", BlockKind::Text);
        loaded.order_number = 7;
        let mut seq = BlockSequence::from_blocks(vec![loaded]);
        seq.append(block("y", BlockKind::Image));
        assert_eq!(numbers(&seq), vec![7, 8]);
    }

    #[test]
    fn test_append_with_mode_renumbers_everything() {
        let mut seq = BlockSequence::new();
        seq.set_mode(SequencingMode::Desc);
        seq.append(block("a", BlockKind::Text));
        seq.append(block("b", BlockKind::Text));
        seq.append(block("c", BlockKind::Text));
        assert_eq!(numbers(&seq), vec![3, 2, 1]);
    }

    #[test]
    fn test_move_up_under_asc() {
        let mut seq = BlockSequence::new();
        seq.set_mode(SequencingMode::Asc);
        seq.append(block("A", BlockKind::Text));
        seq.append(block("B", BlockKind::Image));
        seq.append(block("C", BlockKind::Video));

        assert!(seq.move_block(1, Direction::Up));
        assert_eq!(ids(&seq), vec!["B", "A", "C"]);
        assert_eq!(numbers(&seq), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_at_boundaries_is_noop() {
        let mut seq = BlockSequence::new();
        seq.append(block("A", BlockKind::Text));
        seq.append(block("B", BlockKind::Text));
        let before = seq.clone();

        assert!(!seq.move_block(0, Direction::Up));
        assert!(!seq.move_block(1, Direction::Down));
        assert!(!seq.move_block(5, Direction::Up));
        assert_eq!(seq, before);
    }

    #[test]
    fn test_remove_last_mandatory_block_is_refused() {
        let mut seq = BlockSequence::new();
        seq.append(block("only", BlockKind::Text));
        let before = seq.clone();

        assert!(!seq.remove("only", true));
        assert_eq!(seq, before);

        assert!(seq.remove("only", false));
        assert!(seq.is_empty());
    }

    #[test]
    fn test_remove_renumbers_remainder() {
        let mut seq = BlockSequence::new();
        seq.set_mode(SequencingMode::Asc);
        for id in ["a", "b", "c"] {
            seq.append(block(id, BlockKind::Text));
        }
        assert!(seq.remove("a", true));
        assert_eq!(numbers(&seq), vec![1, 2]);
        assert!(!seq.remove("missing", false));
    }

    #[test]
    fn test_desc_numbers_hold_after_every_operation() {
        let mut seq = BlockSequence::new();
        seq.set_mode(SequencingMode::Desc);
        for id in ["a", "b", "c", "d"] {
            seq.append(block(id, BlockKind::Text));
        }
        seq.move_block(0, Direction::Down);
        seq.remove("c", false);
        seq.insert_at(1, block("e", BlockKind::Quote));
        seq.move_to(0, 3);

        let len = seq.len();
        for (position, b) in seq.blocks().iter().enumerate() {
            assert_eq!(b.order_number as usize, len - position);
        }
    }

    #[test]
    fn test_plain_mode_hides_badges() {
        let mut seq = BlockSequence::new();
        assert!(seq.order_badges_visible());
        seq.append(block("a", BlockKind::Text));
        seq.append(block("b", BlockKind::Text));
        seq.set_mode(SequencingMode::Plain);
        assert!(!seq.order_badges_visible());
        assert_eq!(numbers(&seq), vec![1, 2]);
    }

    #[test]
    fn test_repair_keeps_order_and_fixes_duplicate_ids() {
        let mut first = block("dup", BlockKind::Text);
        first.order_number = 5;
        let mut second = block("dup", BlockKind::Image);
        second.order_number = 2;
        let unnumbered = block("z", BlockKind::Quote);

        let seq = BlockSequence::from_blocks(vec![first, second, unnumbered]);
        assert_eq!(seq.blocks()[0].id, "dup");
        assert_eq!(seq.blocks()[0].kind(), BlockKind::Text);
        assert_ne!(seq.blocks()[1].id, "dup");
        assert!(!seq.blocks()[1].id.is_empty());
        assert_eq!(seq.blocks()[1].kind(), BlockKind::Image);
        assert_eq!(seq.blocks()[2].id, "z");
        assert_eq!(numbers(&seq), vec![5, 2, 6]);
    }
}
