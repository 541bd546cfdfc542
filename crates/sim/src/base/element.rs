use serde::{Deserialize, Serialize};

use super::Position;
use crate::errors::{GeneticsError, Result};

/// A genomic element: a closed range `[start, end]` of positions carrying a
/// genomic element type.
///
/// Elements on a chromosome are kept sorted by `start` and never overlap.
/// Mutations are only ever placed inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicElement {
    /// Identifier of the genomic element type
    pub element_type: u32,
    pub start: Position,
    pub end: Position,
}

impl GenomicElement {
    pub fn new(element_type: u32, start: Position, end: Position) -> Self {
        Self {
            element_type,
            start,
            end,
        }
    }

    /// Number of positions covered (both ends inclusive).
    #[inline]
    pub fn len(&self) -> Position {
        self.end - self.start + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

/// Sort `elements` by start position and check that they are well-formed
/// and non-overlapping.
pub fn sort_and_check_elements(elements: &mut [GenomicElement]) -> Result<()> {
    elements.sort_by_key(|e| e.start);

    for e in elements.iter() {
        if e.start < 0 || e.is_empty() {
            return Err(GeneticsError::config(format!(
                "genomic element [{}, {}] is not a valid range",
                e.start, e.end
            )));
        }
        if e.end > super::MAX_BASE_POSITION {
            return Err(GeneticsError::config(format!(
                "genomic element end {} exceeds the maximum base position {}",
                e.end,
                super::MAX_BASE_POSITION
            )));
        }
    }

    for pair in elements.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(GeneticsError::config(format!(
                "genomic elements [{}, {}] and [{}, {}] overlap",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_len() {
        let e = GenomicElement::new(1, 10, 19);
        assert_eq!(e.len(), 10);
        assert!(e.contains(10));
        assert!(e.contains(19));
        assert!(!e.contains(20));
    }

    #[test]
    fn test_sorting_and_overlap() {
        let mut elements = vec![GenomicElement::new(1, 50, 99), GenomicElement::new(1, 0, 49)];
        sort_and_check_elements(&mut elements).unwrap();
        assert_eq!(elements[0].start, 0);

        let mut overlapping = vec![GenomicElement::new(1, 0, 50), GenomicElement::new(2, 50, 99)];
        assert!(sort_and_check_elements(&mut overlapping).is_err());

        let mut inverted = vec![GenomicElement::new(1, 10, 5)];
        assert!(sort_and_check_elements(&mut inverted).is_err());
    }
}
