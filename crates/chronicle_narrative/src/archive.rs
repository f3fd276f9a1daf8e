//! The user-editable chapter list.

use chronicle_core::{Chapter, ChapterEdit, Direction};
use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};

/// Ordered chapters of one session.
///
/// Pure in-memory list; the owning session persists it after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    chapters: Vec<Chapter>,
}

impl Archive {
    /// Wrap an existing chapter list.
    pub fn new(chapters: Vec<Chapter>) -> Self {
        Self { chapters }
    }

    /// Chapters in display order.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Number of chapters.
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// Whether the archive is empty.
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Position of the chapter numbered `chapter_number`.
    pub fn position(&self, chapter_number: u32) -> Option<usize> {
        self.chapters
            .iter()
            .position(|c| c.chapter_number == chapter_number)
    }

    /// Chapter numbered `chapter_number`.
    pub fn get(&self, chapter_number: u32) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.chapter_number == chapter_number)
    }

    /// Position of the generated chapter numbered `chapter_number`.
    ///
    /// Manual chapters never match, even when they share the number.
    pub fn position_generated(&self, chapter_number: u32) -> Option<usize> {
        self.chapters
            .iter()
            .position(|c| !c.manual && c.chapter_number == chapter_number)
    }

    /// Generated chapter numbered `chapter_number`.
    pub fn get_generated(&self, chapter_number: u32) -> Option<&Chapter> {
        self.position_generated(chapter_number)
            .map(|index| &self.chapters[index])
    }

    /// Chapter at `index`.
    pub fn at(&self, index: usize) -> ChronicleResult<&Chapter> {
        self.chapters
            .get(index)
            .ok_or_else(|| self.out_of_range(index).into())
    }

    /// Highest chapter number in use, 0 when empty.
    pub fn last_chapter_number(&self) -> u32 {
        self.chapters
            .iter()
            .map(|c| c.chapter_number)
            .max()
            .unwrap_or(0)
    }

    /// Number of placeholder chapters.
    pub fn error_count(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_error).count()
    }

    /// Add a chapter at the end.
    pub fn append(&mut self, chapter: Chapter) {
        self.chapters.push(chapter);
    }

    /// Replace the generated chapter with the same number in place, or append it.
    ///
    /// Returns the replaced chapter. Manual chapters are left alone.
    pub fn upsert(&mut self, chapter: Chapter) -> Option<Chapter> {
        match self.position_generated(chapter.chapter_number) {
            Some(index) => Some(std::mem::replace(&mut self.chapters[index], chapter)),
            None => {
                self.chapters.push(chapter);
                None
            }
        }
    }

    /// Replace the chapter numbered `chapter_number`, keeping its position.
    pub fn replace(&mut self, chapter_number: u32, chapter: Chapter) -> ChronicleResult<Chapter> {
        let index = self
            .position(chapter_number)
            .ok_or_else(|| ArchiveError::new(ArchiveErrorKind::ChapterNotFound(chapter_number)))?;
        Ok(std::mem::replace(&mut self.chapters[index], chapter))
    }

    /// Replace the generated chapter numbered `chapter_number`, keeping its position.
    pub fn replace_generated(
        &mut self,
        chapter_number: u32,
        chapter: Chapter,
    ) -> ChronicleResult<Chapter> {
        let index = self
            .position_generated(chapter_number)
            .ok_or_else(|| ArchiveError::new(ArchiveErrorKind::ChapterNotFound(chapter_number)))?;
        Ok(std::mem::replace(&mut self.chapters[index], chapter))
    }

    /// Remove the chapter at `index`.
    pub fn delete(&mut self, index: usize) -> ChronicleResult<Chapter> {
        if index >= self.chapters.len() {
            return Err(self.out_of_range(index).into());
        }
        Ok(self.chapters.remove(index))
    }

    /// Apply `edit` to the chapter at `index`.
    pub fn edit(&mut self, index: usize, edit: &ChapterEdit) -> ChronicleResult<&Chapter> {
        let len = self.chapters.len();
        let chapter = self.chapters.get_mut(index).ok_or_else(|| {
            ArchiveError::new(ArchiveErrorKind::IndexOutOfRange { index, len })
        })?;
        edit.apply(chapter);
        Ok(chapter)
    }

    /// Swap the chapter at `index` with its neighbour.
    ///
    /// Returns `false` when the chapter is already at that end of the list.
    pub fn move_chapter(&mut self, index: usize, direction: Direction) -> ChronicleResult<bool> {
        if index >= self.chapters.len() {
            return Err(self.out_of_range(index).into());
        }
        let target = match direction {
            Direction::Up if index == 0 => return Ok(false),
            Direction::Up => index - 1,
            Direction::Down if index + 1 == self.chapters.len() => return Ok(false),
            Direction::Down => index + 1,
        };
        self.chapters.swap(index, target);
        Ok(true)
    }

    /// Add a user-written chapter at the end.
    ///
    /// Numbered `len + 1` unless `chapter_number` is given.
    pub fn insert_manual(&mut self, mut chapter: Chapter, chapter_number: Option<u32>) -> &Chapter {
        chapter.chapter_number = chapter_number.unwrap_or(self.chapters.len() as u32 + 1);
        chapter.manual = true;
        chapter.is_error = false;
        self.chapters.push(chapter);
        &self.chapters[self.chapters.len() - 1]
    }

    fn out_of_range(&self, index: usize) -> ArchiveError {
        ArchiveError::new(ArchiveErrorKind::IndexOutOfRange {
            index,
            len: self.chapters.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::{ChapterBuilder, ChapterEditBuilder};

    fn chapter(n: u32) -> Chapter {
        ChapterBuilder::default()
            .chapter_number(n)
            .title(format!("Chapter {}", n))
            .narrative(format!("Body {}", n))
            .build()
            .unwrap()
    }

    fn numbers(archive: &Archive) -> Vec<u32> {
        archive.chapters().iter().map(|c| c.chapter_number).collect()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut archive = Archive::new(vec![chapter(1), chapter(3), chapter(4)]);
        let mut updated = chapter(3);
        updated.narrative = "New".to_string();

        let previous = archive.upsert(updated).unwrap();
        assert_eq!(previous.narrative, "Body 3");
        assert_eq!(numbers(&archive), vec![1, 3, 4]);
        assert_eq!(archive.chapters()[1].narrative, "New");

        assert!(archive.upsert(chapter(5)).is_none());
        assert_eq!(numbers(&archive), vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_upsert_skips_manual_chapters() {
        let mut archive = Archive::new(vec![chapter(1)]);
        archive.insert_manual(chapter(0), None);

        assert!(archive.get_generated(2).is_none());
        assert!(archive.upsert(chapter(2)).is_none());
        assert_eq!(numbers(&archive), vec![1, 2, 2]);
        assert!(archive.chapters()[1].manual);
        assert_eq!(archive.position_generated(2), Some(2));

        let mut regenerated = chapter(2);
        regenerated.narrative = "Again".to_string();
        archive.replace_generated(2, regenerated).unwrap();
        assert_eq!(archive.chapters()[1].narrative, "Body 0");
        assert_eq!(archive.chapters()[2].narrative, "Again");
    }

    #[test]
    fn test_move_at_edges_is_noop() {
        let mut archive = Archive::new(vec![chapter(1), chapter(2), chapter(3)]);
        assert!(!archive.move_chapter(0, Direction::Up).unwrap());
        assert!(!archive.move_chapter(2, Direction::Down).unwrap());
        assert!(archive.move_chapter(0, Direction::Down).unwrap());
        assert_eq!(numbers(&archive), vec![2, 1, 3]);
        assert!(archive.move_chapter(3, Direction::Up).is_err());
    }

    #[test]
    fn test_insert_manual_numbering() {
        let mut archive = Archive::new(vec![chapter(1), chapter(2)]);
        let inserted = archive.insert_manual(chapter(0), None);
        assert_eq!(inserted.chapter_number, 3);
        assert!(inserted.manual);

        let chosen = archive.insert_manual(chapter(0), Some(42));
        assert_eq!(chosen.chapter_number, 42);
        assert_eq!(archive.last_chapter_number(), 42);
    }

    #[test]
    fn test_edit_delete_replace() {
        let mut archive = Archive::new(vec![chapter(1), chapter(2)]);
        let edit = ChapterEditBuilder::default().title("Renamed").build().unwrap();
        assert_eq!(archive.edit(1, &edit).unwrap().title, "Renamed");

        let removed = archive.delete(0).unwrap();
        assert_eq!(removed.chapter_number, 1);
        assert!(archive.delete(5).is_err());

        let err = archive.replace(9, chapter(9)).unwrap_err();
        assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::ChapterNotFound(9)));
    }
}
