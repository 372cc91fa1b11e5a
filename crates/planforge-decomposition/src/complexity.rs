//! Intrinsic complexity scoring for decomposition units

use planforge_domain::RiskLevel;

/// A unit of work as seen by the decomposer: either a whole requirement or
/// a phase produced by a previous split.
#[derive(Debug, Clone)]
pub struct SplitUnit {
    /// Stable unit id; requirement id at the root, dotted split path below
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Effort in working hours, always resolved (never missing)
    pub effort_hours: f64,
    /// Confidence in the effort figure (0.0-1.0)
    pub confidence: f64,
    /// Delivery risk inherited from the requirement
    pub risk: RiskLevel,
    /// Number of other units this one depends on
    pub fan_in: usize,
}

/// Scores the intrinsic complexity of a unit on a bounded 0-10 scale.
///
/// The score combines four factors:
/// - size: effort hours, saturating at [`ComplexityAnalyzer::SATURATION_HOURS`]
/// - ambiguity: the inverse of estimate confidence
/// - coupling: dependency fan-in, saturating at five edges
/// - risk: the unit's delivery risk level
///
/// Weights: size 45%, ambiguity 25%, coupling 10%, risk 20%. The function is
/// pure; identical units always score identically.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    /// Effort at which the size factor saturates
    pub const SATURATION_HOURS: f64 = 40.0;

    /// Creates a new analyzer
    pub fn new() -> Self {
        Self
    }

    /// Scores a unit; the result is always within 0.0-10.0
    pub fn score(&self, unit: &SplitUnit) -> f64 {
        let size = (unit.effort_hours / Self::SATURATION_HOURS).clamp(0.0, 1.0) * 10.0;
        let ambiguity = (1.0 - unit.confidence.clamp(0.0, 1.0)) * 10.0;
        let coupling = (unit.fan_in.min(5) as f64 / 5.0) * 10.0;
        let risk = unit.risk.score();

        let score = size * 0.45 + ambiguity * 0.25 + coupling * 0.10 + risk * 0.20;
        score.clamp(0.0, 10.0)
    }
}
