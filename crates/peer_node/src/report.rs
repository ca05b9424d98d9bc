//! Final report of a node run

use std::fmt;

use contracts::{AlignmentResult, Role};
use observability::MetricsSummary;

/// Returned by [`crate::NodeHandle::shutdown`]
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub role: Role,
    /// Committed clock offset (client only)
    pub clock_offset: Option<f64>,
    /// Converged alignments, oldest first
    pub results: Vec<AlignmentResult>,
    pub summary: MetricsSummary,
}

impl NodeReport {
    pub fn last_result(&self) -> Option<&AlignmentResult> {
        self.results.last()
    }
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Role: {}", self.role)?;
        for (i, result) in self.results.iter().enumerate() {
            writeln!(
                f,
                "Alignment #{}: theta={:.3} deg translation=({:.4}, {:.4}, {:.4})",
                i + 1,
                result.theta_degrees,
                result.translation.x,
                result.translation.y,
                result.translation.z
            )?;
        }
        write!(f, "{}", self.summary)
    }
}
