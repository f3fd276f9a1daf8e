//! In-memory chunk list with per-chunk selection and status.

use chronicle_core::{Chunk, ChunkOutcome, ChunkStatus};
use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};

/// The chunk list of the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewState {
    chunks: Vec<Chunk>,
}

impl ReviewState {
    /// Wrap a freshly chunked list.
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// All chunks, in index order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk at `index`.
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Flip the selection of one chunk, returning the new value.
    pub fn toggle_selection(&mut self, index: usize) -> ChronicleResult<bool> {
        let len = self.chunks.len();
        let chunk = self.chunks.get_mut(index).ok_or_else(|| {
            ArchiveError::new(ArchiveErrorKind::IndexOutOfRange { index, len })
        })?;
        chunk.selected = !chunk.selected;
        Ok(chunk.selected)
    }

    /// Select or deselect every chunk.
    pub fn set_all_selection(&mut self, selected: bool) {
        for chunk in &mut self.chunks {
            chunk.selected = selected;
        }
    }

    /// Number of selected chunks.
    pub fn selected_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.selected).count()
    }

    /// Selected chunks before `index`, i.e. those a run has already handled.
    pub fn selected_before(&self, index: usize) -> usize {
        self.chunks
            .iter()
            .take(index)
            .filter(|c| c.selected)
            .count()
    }

    pub(crate) fn set_status(&mut self, index: usize, status: ChunkStatus) {
        if let Some(chunk) = self.chunks.get_mut(index) {
            chunk.status = status;
        }
    }

    /// Chunk whose display id is `display_id`.
    pub fn find_display_id(&self, display_id: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.display_id == display_id)
    }

    /// Status of the chunk with `display_id`, if it is in the list.
    pub fn status_of(&self, display_id: u32) -> Option<ChunkStatus> {
        self.find_display_id(display_id).map(|c| c.status)
    }

    /// Persistable selection and status of every chunk.
    pub fn outcomes(&self) -> Vec<ChunkOutcome> {
        self.chunks
            .iter()
            .map(|c| ChunkOutcome {
                display_id: c.display_id,
                selected: c.selected,
                status: c.status,
            })
            .collect()
    }

    /// Restore selection and status saved by [`outcomes`](Self::outcomes).
    ///
    /// Outcomes are matched by display id. A chunk that was mid-call when the
    /// record was written goes back to pending.
    pub fn apply_outcomes(&mut self, outcomes: &[ChunkOutcome]) {
        for outcome in outcomes {
            if let Some(chunk) = self
                .chunks
                .iter_mut()
                .find(|c| c.display_id == outcome.display_id)
            {
                chunk.selected = outcome.selected;
                chunk.status = match outcome.status {
                    ChunkStatus::Processing => ChunkStatus::Pending,
                    status => status,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: u32) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                index: i as usize,
                display_id: i + 1,
                messages: Vec::new(),
                preview_text: String::new(),
                selected: true,
                status: ChunkStatus::Pending,
            })
            .collect()
    }

    #[test]
    fn test_toggle_keeps_display_ids() {
        let mut review = ReviewState::new(chunks(5));
        assert!(!review.toggle_selection(1).unwrap());

        assert_eq!(review.selected_count(), 4);
        assert_eq!(
            review.chunks().iter().map(|c| c.display_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(review.selected_before(3), 2);
    }

    #[test]
    fn test_toggle_out_of_range() {
        let mut review = ReviewState::new(chunks(2));
        let err = review.toggle_selection(2).unwrap_err();
        assert_eq!(
            err.archive_kind(),
            Some(&ArchiveErrorKind::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_set_all_selection() {
        let mut review = ReviewState::new(chunks(3));
        review.set_all_selection(false);
        assert_eq!(review.selected_count(), 0);
        review.set_all_selection(true);
        assert_eq!(review.selected_count(), 3);
    }

    #[test]
    fn test_outcomes_restore() {
        let mut review = ReviewState::new(chunks(3));
        review.toggle_selection(2).unwrap();
        review.set_status(0, ChunkStatus::Success);
        review.set_status(1, ChunkStatus::Processing);
        let outcomes = review.outcomes();

        let mut restored = ReviewState::new(chunks(3));
        restored.apply_outcomes(&outcomes);
        assert_eq!(restored.status_of(1), Some(ChunkStatus::Success));
        assert_eq!(restored.status_of(2), Some(ChunkStatus::Pending));
        assert!(!restored.get(2).unwrap().selected);
    }
}
