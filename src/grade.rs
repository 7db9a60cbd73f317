use std::fmt;

pub const PASS_PERCENTAGE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GradeBand {
    APlus,
    A,
    BPlus,
    B,
    C,
    D,
    F,
}

impl GradeBand {
    /// Best band first.
    pub const LABELS: [&'static str; 7] = ["A+", "A", "B+", "B", "C", "D", "F"];

    pub fn from_percentage(percentage: f64) -> GradeBand {
        match percentage {
            p if p >= 90.0 => GradeBand::APlus,
            p if p >= 80.0 => GradeBand::A,
            p if p >= 70.0 => GradeBand::BPlus,
            p if p >= 60.0 => GradeBand::B,
            p if p >= 50.0 => GradeBand::C,
            p if p >= 40.0 => GradeBand::D,
            _ => GradeBand::F,
        }
    }

    pub fn from_score(score: f64, max_score: f64) -> GradeBand {
        GradeBand::from_percentage(score_percentage(score, max_score))
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeBand::APlus => "A+",
            GradeBand::A => "A",
            GradeBand::BPlus => "B+",
            GradeBand::B => "B",
            GradeBand::C => "C",
            GradeBand::D => "D",
            GradeBand::F => "F",
        }
    }
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score as a percentage of the maximum, unrounded.
/// A non-positive maximum or non-finite input counts as 0%.
pub fn score_percentage(score: f64, max_score: f64) -> f64 {
    if !score.is_finite() || !max_score.is_finite() || max_score <= 0.0 {
        return 0.0;
    }
    score * 100.0 / max_score
}
