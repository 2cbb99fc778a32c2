// THEORY:
// A single micrograph easily yields thousands of lines, so the raw table is
// rarely what ends up in a paper. The `LengthHistogram` condenses a report into
// a size distribution over roughly logarithmic buckets, the same bucket edges
// that are used for pore-size distributions, so line and pore statistics of a
// sample can be plotted side by side.
//
// Histograms over the same edges can be merged, which is how a whole folder of
// micrographs of one sample is summarised: counts and summed lengths add up,
// and the length shares are recomputed over the combined total.
//
// Buckets are labelled by their upper edge. Bucket 0 holds everything up to the
// first edge, bucket i holds (edges[i-1], edges[i]], and the last bucket also
// takes every length beyond the last edge.

use crate::core_modules::line_report::{DetectedLine, LineReport};
use crate::error::MeasureError;
use serde::Serialize;

/// Bucket edges in physical units.
pub const DEFAULT_BUCKET_EDGES: [f64; 20] = [
    0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 31.5, 63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0,
    16000.0, 31500.0, 63000.0, 125000.0, 250000.0,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub upper_edge: f64,
    pub count: usize,
    pub length_sum: f64,
    /// Share of the total measured length, in percent.
    pub length_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthHistogram {
    pub buckets: Vec<Bucket>,
}

impl LengthHistogram {
    /// `edges` must be ascending. An empty edge list yields an empty histogram.
    pub fn from_lines(edges: &[f64], lines: &[DetectedLine]) -> Self {
        let mut buckets: Vec<Bucket> = edges
            .iter()
            .map(|&upper_edge| Bucket {
                upper_edge,
                count: 0,
                length_sum: 0.0,
                length_percent: 0.0,
            })
            .collect();
        if buckets.is_empty() {
            return Self { buckets };
        }

        let last = buckets.len() - 1;
        for line in lines {
            let slot = edges.partition_point(|&edge| edge < line.length).min(last);
            buckets[slot].count += 1;
            buckets[slot].length_sum += line.length;
        }

        let mut histogram = Self { buckets };
        histogram.update_percentages();
        histogram
    }

    pub fn with_default_edges(lines: &[DetectedLine]) -> Self {
        Self::from_lines(&DEFAULT_BUCKET_EDGES, lines)
    }

    /// One histogram over the lines of every report.
    pub fn from_reports<'a>(edges: &[f64], reports: impl IntoIterator<Item = &'a LineReport>) -> Self {
        let mut combined = Self::from_lines(edges, &[]);
        for report in reports {
            let histogram = Self::from_lines(edges, &report.lines);
            combined.absorb(&histogram);
        }
        combined.update_percentages();
        combined
    }

    /// Adds the counts and lengths of `other`. Both must use the same edges.
    pub fn merge(&mut self, other: &LengthHistogram) -> Result<(), MeasureError> {
        let same_edges = self.buckets.len() == other.buckets.len()
            && self
                .buckets
                .iter()
                .zip(&other.buckets)
                .all(|(ours, theirs)| ours.upper_edge == theirs.upper_edge);
        if !same_edges {
            return Err(MeasureError::BucketMismatch);
        }
        self.absorb(other);
        self.update_percentages();
        Ok(())
    }

    // Callers guarantee matching edges.
    fn absorb(&mut self, other: &LengthHistogram) {
        for (ours, theirs) in self.buckets.iter_mut().zip(&other.buckets) {
            ours.count += theirs.count;
            ours.length_sum += theirs.length_sum;
        }
    }

    fn update_percentages(&mut self) {
        let total: f64 = self.buckets.iter().map(|bucket| bucket.length_sum).sum();
        for bucket in &mut self.buckets {
            bucket.length_percent = if total > 0.0 {
                bucket.length_sum / total * 100.0
            } else {
                0.0
            };
        }
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.count).sum()
    }

    /// Tab-separated `upper edge / count / summed length / length-%` rows.
    pub fn table(&self, unit: &str) -> String {
        let mut rows = vec![format!("bucket [{unit}]\tcount\tsum [{unit}]\tlength-%")];
        rows.extend(self.buckets.iter().map(|bucket| {
            format!(
                "{}\t{}\t{:.2}\t{:.2}",
                bucket.upper_edge, bucket.count, bucket.length_sum, bucket.length_percent
            )
        }));
        rows.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::line_scanner::ScanAxis;

    fn line(length: f64) -> DetectedLine {
        DetectedLine {
            index: 1,
            axis: ScanAxis::Horizontal,
            outer: 0,
            end: 0,
            pixel_length: length as usize,
            length,
        }
    }

    #[test]
    fn edges_are_inclusive_at_the_top() {
        let lines = [line(4.0), line(4.5), line(8.0), line(1.0)];
        let histogram = LengthHistogram::with_default_edges(&lines);

        let count_at = |edge: f64| {
            histogram
                .buckets
                .iter()
                .find(|bucket| bucket.upper_edge == edge)
                .map(|bucket| bucket.count)
        };
        assert_eq!(count_at(1.0), Some(1));
        assert_eq!(count_at(4.0), Some(1));
        assert_eq!(count_at(8.0), Some(2));
        assert_eq!(histogram.total_count(), 4);
    }

    #[test]
    fn oversized_lengths_land_in_the_last_bucket() {
        let histogram = LengthHistogram::from_lines(&[1.0, 10.0], &[line(50.0), line(10.0)]);
        assert_eq!(histogram.buckets[1].count, 2);
        assert_eq!(histogram.buckets[1].length_sum, 60.0);
        assert_eq!(histogram.buckets[1].length_percent, 100.0);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let lines = [line(3.0), line(5.0), line(12.0)];
        let histogram = LengthHistogram::with_default_edges(&lines);
        let total: f64 = histogram.buckets.iter().map(|b| b.length_percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs() {
        assert!(LengthHistogram::from_lines(&[], &[line(3.0)]).buckets.is_empty());
        let histogram = LengthHistogram::with_default_edges(&[]);
        assert_eq!(histogram.total_count(), 0);
        assert!(histogram.buckets.iter().all(|b| b.length_percent == 0.0));
    }

    fn report(lengths: &[f64]) -> LineReport {
        LineReport::new("nm", lengths.iter().map(|&length| line(length)).collect())
    }

    #[test]
    fn merged_reports_match_one_histogram_over_all_lines() {
        let first = report(&[3.0, 5.0, 12.5]);
        let second = report(&[0.5, 5.0, 300.0, 64.0]);
        let all_lines: Vec<DetectedLine> = first.lines.iter().chain(&second.lines).cloned().collect();
        let expected = LengthHistogram::with_default_edges(&all_lines);

        let mut merged = LengthHistogram::with_default_edges(&first.lines);
        merged
            .merge(&LengthHistogram::with_default_edges(&second.lines))
            .expect("same edges");
        assert_eq!(merged, expected);

        let combined = LengthHistogram::from_reports(&DEFAULT_BUCKET_EDGES, &[first, second]);
        assert_eq!(combined, expected);
        assert_eq!(combined.total_count(), 7);
    }

    #[test]
    fn merging_different_edges_fails() {
        let mut histogram = LengthHistogram::from_lines(&[1.0, 2.0], &[line(1.5)]);
        let other = LengthHistogram::from_lines(&[1.0, 3.0], &[line(1.5)]);
        assert!(matches!(histogram.merge(&other), Err(MeasureError::BucketMismatch)));
        assert_eq!(histogram.total_count(), 1);
    }

    #[test]
    fn table_has_header_and_one_row_per_bucket() {
        let histogram = LengthHistogram::from_lines(&[2.0, 4.0], &[line(3.0)]);
        assert_eq!(
            histogram.table("nm"),
            "bucket [nm]\tcount\tsum [nm]\tlength-%\n2\t0\t0.00\t0.00\n4\t1\t3.00\t100.00"
        );
    }
}
