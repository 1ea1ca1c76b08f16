//! Vertical metrics normalization.
//!
//! See <https://github.com/googlefonts/gf-docs/blob/main/VerticalMetrics/README.md>
//! and <https://glyphsapp.com/learn/vertical-metrics> for background on the
//! strategies.

use std::{fmt, str::FromStr};

use fontedit::{EditableFont, MetricDeltas, VerticalMetrics};
use log::debug;

use crate::error::Error;

/// How to reconcile the Windows, typographic and hhea metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricsStrategy {
    /// hhea from the Windows metrics, typo line gap makes up the difference
    #[default]
    Microsoft,
    /// hhea and typo both from the Windows metrics, no line gaps
    Google,
    /// hhea from the typo metrics, typo line gap makes up the difference
    Adobe,
    /// hhea and typo split the em in the proportion of the Windows metrics
    Webfont,
}

impl FromStr for MetricsStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "microsoft" => Ok(MetricsStrategy::Microsoft),
            "google" => Ok(MetricsStrategy::Google),
            "adobe" => Ok(MetricsStrategy::Adobe),
            "webfont" => Ok(MetricsStrategy::Webfont),
            _ => Err(Error::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for MetricsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricsStrategy::Microsoft => "microsoft",
            MetricsStrategy::Google => "google",
            MetricsStrategy::Adobe => "adobe",
            MetricsStrategy::Webfont => "webfont",
        };
        f.write_str(name)
    }
}

pub struct MetricsNormalizer;

impl MetricsNormalizer {
    /// Add each pending delta to its own field.
    pub fn fold_deltas(metrics: &VerticalMetrics, deltas: &MetricDeltas) -> VerticalMetrics {
        VerticalMetrics {
            win_ascent: metrics.win_ascent + deltas.win_ascent,
            win_descent: metrics.win_descent + deltas.win_descent,
            typo_ascent: metrics.typo_ascent + deltas.typo_ascent,
            typo_descent: metrics.typo_descent + deltas.typo_descent,
            hhea_ascent: metrics.hhea_ascent + deltas.hhea_ascent,
            hhea_descent: metrics.hhea_descent + deltas.hhea_descent,
            ..*metrics
        }
    }

    /// The metrics `strategy` derives from `metrics`.
    pub fn apply(
        strategy: MetricsStrategy,
        metrics: &VerticalMetrics,
    ) -> Result<VerticalMetrics, Error> {
        let m = *metrics;
        let win_total = m.win_ascent + m.win_descent;
        let result = match strategy {
            MetricsStrategy::Microsoft => VerticalMetrics {
                hhea_ascent: m.win_ascent,
                hhea_descent: -m.win_descent,
                hhea_line_gap: 0,
                typo_line_gap: win_total - m.em,
                ..m
            },
            MetricsStrategy::Google => VerticalMetrics {
                hhea_ascent: m.win_ascent,
                hhea_descent: -m.win_descent,
                hhea_line_gap: 0,
                typo_ascent: m.win_ascent,
                typo_descent: -m.win_descent,
                typo_line_gap: 0,
                ..m
            },
            MetricsStrategy::Adobe => {
                let typo_line_gap = win_total - m.em;
                VerticalMetrics {
                    typo_line_gap,
                    hhea_ascent: m.typo_ascent,
                    hhea_descent: m.typo_descent,
                    hhea_line_gap: typo_line_gap,
                    ..m
                }
            }
            MetricsStrategy::Webfont => {
                if win_total == 0 {
                    return Err(Error::DegenerateMetrics);
                }
                let ascent =
                    (m.em as f64 * m.win_ascent as f64 / win_total as f64).round_ties_even() as i32;
                let descent = ascent - m.em;
                let line_gap = win_total - m.em;
                VerticalMetrics {
                    hhea_ascent: ascent,
                    hhea_descent: descent,
                    hhea_line_gap: line_gap,
                    typo_ascent: ascent,
                    typo_descent: descent,
                    typo_line_gap: line_gap,
                    ..m
                }
            }
        };
        Ok(result)
    }

    /// Fold and clear the font's pending deltas, then apply `strategy`.
    pub fn normalize(
        font: &mut EditableFont,
        strategy: MetricsStrategy,
    ) -> Result<VerticalMetrics, Error> {
        let current = font.vertical_metrics()?;
        let folded = Self::fold_deltas(&current, &font.pending_deltas());
        let normalized = Self::apply(strategy, &folded)?;
        font.set_vertical_metrics(&normalized)?;
        font.set_pending_deltas(MetricDeltas::default());
        debug!("Applied {strategy} metrics: {normalized:?}");
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn font() -> EditableFont {
        EditableFont::from_bytes(test_fonts::basic()).unwrap()
    }

    fn metrics() -> VerticalMetrics {
        VerticalMetrics {
            em: 1000,
            win_ascent: 950,
            win_descent: 250,
            typo_ascent: 800,
            typo_descent: -200,
            typo_line_gap: 200,
            hhea_ascent: 900,
            hhea_descent: -250,
            hhea_line_gap: 0,
        }
    }

    #[rstest]
    #[case::microsoft(MetricsStrategy::Microsoft, [950, -250, 0], [800, -200, 200])]
    #[case::google(MetricsStrategy::Google, [950, -250, 0], [950, -250, 0])]
    #[case::adobe(MetricsStrategy::Adobe, [800, -200, 200], [800, -200, 200])]
    #[case::webfont(MetricsStrategy::Webfont, [792, -208, 200], [792, -208, 200])]
    fn strategies(
        #[case] strategy: MetricsStrategy,
        #[case] hhea: [i32; 3],
        #[case] typo: [i32; 3],
    ) {
        let result = MetricsNormalizer::apply(strategy, &metrics()).unwrap();
        assert_eq!(
            hhea,
            [result.hhea_ascent, result.hhea_descent, result.hhea_line_gap]
        );
        assert_eq!(
            typo,
            [result.typo_ascent, result.typo_descent, result.typo_line_gap]
        );
        assert_eq!((950, 250), (result.win_ascent, result.win_descent));
    }

    #[rstest]
    fn normalizing_twice_changes_nothing(
        #[values(
            MetricsStrategy::Microsoft,
            MetricsStrategy::Google,
            MetricsStrategy::Adobe,
            MetricsStrategy::Webfont
        )]
        strategy: MetricsStrategy,
    ) {
        let mut font = font();
        font.set_pending_deltas(MetricDeltas {
            win_ascent: 20,
            hhea_descent: -10,
            ..Default::default()
        });
        let first = MetricsNormalizer::normalize(&mut font, strategy).unwrap();
        let second = MetricsNormalizer::normalize(&mut font, strategy).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, font.vertical_metrics().unwrap());
    }

    #[test]
    fn every_delta_lands_in_its_own_field() {
        let deltas = MetricDeltas {
            win_ascent: 10,
            win_descent: 5,
            typo_ascent: 3,
            typo_descent: -2,
            hhea_ascent: 1,
            hhea_descent: -1,
        };
        assert_eq!(
            VerticalMetrics {
                win_ascent: 960,
                win_descent: 255,
                typo_ascent: 803,
                typo_descent: -202,
                hhea_ascent: 901,
                hhea_descent: -251,
                ..metrics()
            },
            MetricsNormalizer::fold_deltas(&metrics(), &deltas)
        );
    }

    #[test]
    fn deltas_are_consumed() {
        let mut font = font();
        font.set_pending_deltas(MetricDeltas {
            win_ascent: 10,
            win_descent: 5,
            ..Default::default()
        });
        let result = MetricsNormalizer::normalize(&mut font, MetricsStrategy::Google).unwrap();
        assert_eq!((960, 255), (result.win_ascent, result.win_descent));
        assert_eq!((960, -255), (result.typo_ascent, result.typo_descent));
        assert!(font.pending_deltas().is_zero());
    }

    #[test]
    fn webfont_needs_windows_metrics() {
        let zeroed = VerticalMetrics {
            win_ascent: 0,
            win_descent: 0,
            ..metrics()
        };
        let err = MetricsNormalizer::apply(MetricsStrategy::Webfont, &zeroed).unwrap_err();
        assert!(matches!(err, Error::DegenerateMetrics));
        assert_eq!(400, err.code());
    }

    #[test]
    fn unknown_strategy() {
        let err = "apple".parse::<MetricsStrategy>().unwrap_err();
        assert!(matches!(&err, Error::UnknownStrategy(s) if s == "apple"));
        assert_eq!(400, err.code());
    }

    #[test]
    fn fonts_without_os2_fail() {
        let mut font = EditableFont::from_bytes(test_fonts::without_os2()).unwrap();
        assert!(matches!(
            MetricsNormalizer::normalize(&mut font, MetricsStrategy::Microsoft),
            Err(Error::Engine(fontedit::Error::MissingTable(_)))
        ));
    }
}
