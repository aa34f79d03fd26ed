const MIN_RATING: f64 = 1.0;
const MAX_RATING: f64 = 10.0;

/// Maps a raw 0-100 primary score onto the 1-10 rating shown to parents.
///
/// Missing or non-finite input yields `None`, never zero.
pub fn normalize_score(raw: Option<f64>) -> Option<u8> {
    let raw = raw.filter(|value| value.is_finite())?;
    let scaled = (raw.clamp(0.0, 100.0) / 10.0).round();
    Some(scaled.clamp(MIN_RATING, MAX_RATING) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitabilityLabel {
    HighlySuitable,
    ModeratelySuitable,
    NotRecommended,
    AnalysisPending,
}

impl SuitabilityLabel {
    pub fn from_normalized(normalized: Option<u8>) -> Self {
        match normalized {
            Some(score) if score >= 8 => SuitabilityLabel::HighlySuitable,
            Some(score) if score >= 5 => SuitabilityLabel::ModeratelySuitable,
            Some(_) => SuitabilityLabel::NotRecommended,
            None => SuitabilityLabel::AnalysisPending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuitabilityLabel::HighlySuitable => "Highly suitable",
            SuitabilityLabel::ModeratelySuitable => "Moderately suitable",
            SuitabilityLabel::NotRecommended => "Not recommended",
            SuitabilityLabel::AnalysisPending => "Analysis pending",
        }
    }

    fn canned_reasons(&self) -> &'static [&'static str] {
        match self {
            SuitabilityLabel::HighlySuitable => &[
                "Pacing suits the selected age",
                "Language and themes are age-appropriate",
                "Little overstimulating content detected",
            ],
            SuitabilityLabel::ModeratelySuitable => &[
                "Some segments are fast-paced for the selected age",
                "Generally appropriate, best watched with supervision",
            ],
            SuitabilityLabel::NotRecommended => &[
                "Pacing and stimulation exceed what suits the selected age",
                "Content shows multiple developmental concerns",
            ],
            SuitabilityLabel::AnalysisPending => &[
                "The video is still being analysed",
                "Scores appear here once the evaluation finishes",
            ],
        }
    }

    pub fn reasons(&self) -> Vec<String> {
        self.canned_reasons()
            .iter()
            .map(|reason| reason.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_boundaries() {
        assert_eq!(normalize_score(Some(0.0)), Some(1));
        assert_eq!(normalize_score(Some(100.0)), Some(10));
        assert_eq!(normalize_score(Some(45.0)), Some(5));
        assert_eq!(normalize_score(Some(44.9)), Some(4));
        assert_eq!(normalize_score(Some(68.4)), Some(7));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(normalize_score(Some(-30.0)), Some(1));
        assert_eq!(normalize_score(Some(250.0)), Some(10));
    }

    #[test]
    fn missing_or_non_numeric_scores_stay_absent() {
        assert_eq!(normalize_score(None), None);
        assert_eq!(normalize_score(Some(f64::NAN)), None);
        assert_eq!(normalize_score(Some(f64::INFINITY)), None);
    }

    #[test]
    fn labels_follow_rating_bands() {
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(10)),
            SuitabilityLabel::HighlySuitable
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(8)),
            SuitabilityLabel::HighlySuitable
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(7)),
            SuitabilityLabel::ModeratelySuitable
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(5)),
            SuitabilityLabel::ModeratelySuitable
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(4)),
            SuitabilityLabel::NotRecommended
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(Some(1)),
            SuitabilityLabel::NotRecommended
        );
        assert_eq!(
            SuitabilityLabel::from_normalized(None).as_str(),
            "Analysis pending"
        );
    }

    #[test]
    fn every_label_has_reasons() {
        for label in [
            SuitabilityLabel::HighlySuitable,
            SuitabilityLabel::ModeratelySuitable,
            SuitabilityLabel::NotRecommended,
            SuitabilityLabel::AnalysisPending,
        ] {
            assert!(!label.reasons().is_empty(), "{label:?} has no reasons");
        }
    }
}
