use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Report cards print the four-band grade; guardian notifications use the
/// six-band one. Both read the same 0-100 total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingScheme {
    FourBand,
    SixBand,
}

impl GradingScheme {
    pub fn classify(self, total_score: f64) -> Grade {
        match self {
            GradingScheme::FourBand => match total_score {
                s if s >= 80.0 => Grade::A,
                s if s >= 70.0 => Grade::B,
                s if s >= 60.0 => Grade::C,
                _ => Grade::D,
            },
            GradingScheme::SixBand => match total_score {
                s if s >= 90.0 => Grade::APlus,
                s if s >= 80.0 => Grade::A,
                s if s >= 70.0 => Grade::BPlus,
                s if s >= 60.0 => Grade::B,
                s if s >= 50.0 => Grade::C,
                _ => Grade::F,
            },
        }
    }
}

/// Narrative bucket for an overall average, independent of either grade scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Excellent,
    VeryGood,
    Good,
    Fair,
    NeedsImprovement,
    UrgentAttention,
}

impl PerformanceBand {
    pub fn for_average(average: u32) -> Self {
        match average {
            a if a >= 90 => PerformanceBand::Excellent,
            a if a >= 80 => PerformanceBand::VeryGood,
            a if a >= 70 => PerformanceBand::Good,
            a if a >= 60 => PerformanceBand::Fair,
            a if a >= 50 => PerformanceBand::NeedsImprovement,
            _ => PerformanceBand::UrgentAttention,
        }
    }

    pub fn narrative(self) -> &'static str {
        match self {
            PerformanceBand::Excellent => {
                "Excellent performance! Keep up the outstanding work."
            }
            PerformanceBand::VeryGood => {
                "Very good performance. Consistent effort is paying off."
            }
            PerformanceBand::Good => "Good performance with room to reach the top bands.",
            PerformanceBand::Fair => "Fair performance. More focus on weaker subjects will help.",
            PerformanceBand::NeedsImprovement => {
                "Performance needs improvement. Extra study time is recommended."
            }
            PerformanceBand::UrgentAttention => {
                "Performance needs urgent attention. Please contact the class teacher."
            }
        }
    }
}

pub const NO_SCORES_NARRATIVE: &str = "No scores have been recorded for this term yet.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_band_thresholds() {
        let four = GradingScheme::FourBand;
        assert_eq!(four.classify(100.0), Grade::A);
        assert_eq!(four.classify(80.0), Grade::A);
        assert_eq!(four.classify(79.0), Grade::B);
        assert_eq!(four.classify(70.0), Grade::B);
        assert_eq!(four.classify(69.0), Grade::C);
        assert_eq!(four.classify(60.0), Grade::C);
        assert_eq!(four.classify(59.0), Grade::D);
        assert_eq!(four.classify(0.0), Grade::D);
    }

    #[test]
    fn six_band_thresholds() {
        let six = GradingScheme::SixBand;
        assert_eq!(six.classify(95.0), Grade::APlus);
        assert_eq!(six.classify(85.0), Grade::A);
        assert_eq!(six.classify(75.0), Grade::BPlus);
        assert_eq!(six.classify(65.0), Grade::B);
        assert_eq!(six.classify(55.0), Grade::C);
        assert_eq!(six.classify(10.0), Grade::F);
        assert_eq!(six.classify(49.5), Grade::F);
    }

    #[test]
    fn four_band_is_monotonic() {
        let rank = |grade: Grade| match grade {
            Grade::D => 0,
            Grade::C => 1,
            Grade::B => 2,
            Grade::A => 3,
            other => panic!("four-band scheme produced {other}"),
        };
        let mut previous = 0;
        for score in 0..=100u32 {
            let current = rank(GradingScheme::FourBand.classify(f64::from(score)));
            assert!(current >= previous, "grade dropped at {score}");
            previous = current;
        }
    }

    #[test]
    fn grade_labels_serialize_with_plus() {
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
        assert_eq!(Grade::BPlus.to_string(), "B+");
    }

    #[test]
    fn performance_bands_follow_thresholds() {
        assert_eq!(PerformanceBand::for_average(95), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::for_average(90), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::for_average(89), PerformanceBand::VeryGood);
        assert_eq!(PerformanceBand::for_average(70), PerformanceBand::Good);
        assert_eq!(PerformanceBand::for_average(60), PerformanceBand::Fair);
        assert_eq!(PerformanceBand::for_average(50), PerformanceBand::NeedsImprovement);
        assert_eq!(PerformanceBand::for_average(49), PerformanceBand::UrgentAttention);
    }
}
