/// Snapshot of the receive counters.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Frames that passed header, length and checksum checks.
    pub good_reads: u64,
    /// Every frame whose full length was available for a checksum check.
    pub total_reads: u64,
    pub good_read_percentage: f64,
}

impl Statistics {
    pub fn new(good_reads: u64, total_reads: u64) -> Statistics {
        let good_read_percentage = if total_reads > 0 {
            good_reads as f64 / total_reads as f64 * 100.0
        } else {
            0.0
        };
        Statistics {
            good_reads,
            total_reads,
            good_read_percentage,
        }
    }

    pub fn errors(&self) -> u64 {
        self.total_reads.saturating_sub(self.good_reads)
    }

    pub fn error_percentage(&self) -> f64 {
        if self.total_reads > 0 {
            100.0 - self.good_read_percentage
        } else {
            0.0
        }
    }
}
