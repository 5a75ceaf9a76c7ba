//! In-memory store of the batches received during the current period.

use crate::extract::SubmissionBatch;

#[derive(Debug, Default)]
pub struct Accumulator {
    batches: Vec<SubmissionBatch>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, batch: SubmissionBatch) {
        self.batches.push(batch);
    }

    pub fn batches(&self) -> &[SubmissionBatch] {
        &self.batches
    }

    /// Takes every batch, leaving the accumulator empty.
    pub fn drain_all(&mut self) -> Vec<SubmissionBatch> {
        std::mem::take(&mut self.batches)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Total number of rows across all batches.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.rows.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SubmissionRow;
    use crate::summary::{NO_SUBMISSIONS, summarize};

    fn batch(name: &str, n: usize) -> SubmissionBatch {
        SubmissionBatch::from_rows(
            name,
            (0..n)
                .map(|i| SubmissionRow::new("P", format!("R{i}"), 0.5))
                .collect(),
        )
    }

    #[test]
    fn test_append_preserves_order() {
        let mut acc = Accumulator::new();
        acc.append(batch("a", 1));
        acc.append(batch("b", 2));

        assert_eq!(acc.len(), 2);
        assert_eq!(acc.row_count(), 3);
        let names: Vec<_> = acc.batches().iter().map(|b| b.source.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_drain_all_empties() {
        let mut acc = Accumulator::new();
        acc.append(batch("a", 1));

        let drained = acc.drain_all();
        assert_eq!(drained.len(), 1);
        assert!(acc.is_empty());
        assert!(acc.drain_all().is_empty());
    }

    #[test]
    fn test_clear_then_summarize_reports_nothing() {
        let mut acc = Accumulator::new();
        acc.append(batch("a", 3));
        acc.clear();

        assert_eq!(summarize(&acc.drain_all()), NO_SUBMISSIONS);
    }
}
