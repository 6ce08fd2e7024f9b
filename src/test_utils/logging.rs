use std::time::Instant;

use crate::search::Candidate;

/// Verbose step logger for long integration scenarios.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        let separator = "=".repeat(60);
        println!("\n{}", separator);
        println!("[TEST START] {}", test_name);
        println!("{}", separator);
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn log_input<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[INPUT] {}: {:?}", name, value);
    }

    pub fn log_expected<T: std::fmt::Debug>(&self, value: &T) {
        println!("[EXPECTED] {:?}", value);
    }

    /// One line per candidate: id, match type, score, explanation.
    pub fn log_candidates(&self, candidates: &[Candidate]) {
        println!("[ACTUAL] {} candidate(s)", candidates.len());
        for (rank, candidate) in candidates.iter().enumerate() {
            println!(
                "  {}. {} [{} / {}] {:.3} - {}",
                rank + 1,
                candidate.section_id,
                candidate.match_type,
                candidate.confidence,
                candidate.fused_score,
                candidate.explanation
            );
        }
    }

    pub fn pass(&self) {
        let elapsed = self.start_time.elapsed();
        println!("[RESULT] {} PASSED in {:?}", self.test_name, elapsed);
        println!("{}\n", "=".repeat(60));
    }
}
