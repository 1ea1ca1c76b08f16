//! Vertical metrics held in [OS/2](https://learn.microsoft.com/en-us/typography/opentype/spec/os2)
//! and [hhea](https://learn.microsoft.com/en-us/typography/opentype/spec/hhea).

use write_fonts::{
    read::TopLevelTable,
    tables::{hhea::Hhea, os2::Os2},
    types::FWord,
};

use crate::{error::Error, font::EditableFont};

/// The ascent/descent/line gap triples of the Windows, typographic and
/// horizontal header systems, in font units.
///
/// Descents follow the sign convention of their table: `win_descent` is
/// positive below the baseline, `typo_descent` and `hhea_descent` are negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerticalMetrics {
    pub em: i32,
    pub win_ascent: i32,
    pub win_descent: i32,
    pub typo_ascent: i32,
    pub typo_descent: i32,
    pub typo_line_gap: i32,
    pub hhea_ascent: i32,
    pub hhea_descent: i32,
    pub hhea_line_gap: i32,
}

/// Pending incremental adjustments to the ascent and descent fields.
///
/// These are session state of an open font; they start at zero when a font
/// is loaded and are never written to the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricDeltas {
    pub win_ascent: i32,
    pub win_descent: i32,
    pub typo_ascent: i32,
    pub typo_descent: i32,
    pub hhea_ascent: i32,
    pub hhea_descent: i32,
}

impl MetricDeltas {
    pub fn is_zero(&self) -> bool {
        *self == MetricDeltas::default()
    }
}

fn clamp_u16(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

impl EditableFont {
    fn metric_tables(&self) -> Result<(&Os2, &Hhea), Error> {
        let os2 = self.os2.as_ref().ok_or(Error::MissingTable(Os2::TAG))?;
        let hhea = self.hhea.as_ref().ok_or(Error::MissingTable(Hhea::TAG))?;
        Ok((os2, hhea))
    }

    pub fn vertical_metrics(&self) -> Result<VerticalMetrics, Error> {
        let (os2, hhea) = self.metric_tables()?;
        Ok(VerticalMetrics {
            em: self.units_per_em() as i32,
            win_ascent: os2.us_win_ascent as i32,
            win_descent: os2.us_win_descent as i32,
            typo_ascent: os2.s_typo_ascender as i32,
            typo_descent: os2.s_typo_descender as i32,
            typo_line_gap: os2.s_typo_line_gap as i32,
            hhea_ascent: hhea.ascender.to_i16() as i32,
            hhea_descent: hhea.descender.to_i16() as i32,
            hhea_line_gap: hhea.line_gap.to_i16() as i32,
        })
    }

    /// Write every field except `em`, clamping into each field's binary range.
    pub fn set_vertical_metrics(&mut self, metrics: &VerticalMetrics) -> Result<(), Error> {
        self.metric_tables()?;
        if let Some(os2) = self.os2.as_mut() {
            os2.us_win_ascent = clamp_u16(metrics.win_ascent);
            os2.us_win_descent = clamp_u16(metrics.win_descent);
            os2.s_typo_ascender = clamp_i16(metrics.typo_ascent);
            os2.s_typo_descender = clamp_i16(metrics.typo_descent);
            os2.s_typo_line_gap = clamp_i16(metrics.typo_line_gap);
        }
        if let Some(hhea) = self.hhea.as_mut() {
            hhea.ascender = FWord::new(clamp_i16(metrics.hhea_ascent));
            hhea.descender = FWord::new(clamp_i16(metrics.hhea_descent));
            hhea.line_gap = FWord::new(clamp_i16(metrics.hhea_line_gap));
        }
        self.touch(Os2::TAG);
        self.touch(Hhea::TAG);
        Ok(())
    }

    pub fn pending_deltas(&self) -> MetricDeltas {
        self.deltas
    }

    pub fn set_pending_deltas(&mut self, deltas: MetricDeltas) {
        self.deltas = deltas;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn reads_metrics() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        assert_eq!(
            VerticalMetrics {
                em: 1000,
                win_ascent: test_fonts::WIN_ASCENT as i32,
                win_descent: test_fonts::WIN_DESCENT as i32,
                typo_ascent: test_fonts::TYPO_ASCENT as i32,
                typo_descent: test_fonts::TYPO_DESCENT as i32,
                typo_line_gap: test_fonts::TYPO_LINE_GAP as i32,
                hhea_ascent: test_fonts::HHEA_ASCENT as i32,
                hhea_descent: test_fonts::HHEA_DESCENT as i32,
                hhea_line_gap: test_fonts::HHEA_LINE_GAP as i32,
            },
            font.vertical_metrics().unwrap()
        );
    }

    #[test]
    fn deltas_start_at_zero() {
        let font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        assert!(font.pending_deltas().is_zero());
    }

    #[test]
    fn written_metrics_survive_a_save() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let mut metrics = font.vertical_metrics().unwrap();
        metrics.hhea_ascent = 1100;
        metrics.hhea_descent = -300;
        metrics.typo_line_gap = 0;
        font.set_vertical_metrics(&metrics).unwrap();

        let reloaded = EditableFont::from_bytes(font.to_bytes().unwrap()).unwrap();
        assert_eq!(metrics, reloaded.vertical_metrics().unwrap());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        let mut metrics = font.vertical_metrics().unwrap();
        metrics.win_descent = -20;
        metrics.hhea_ascent = 40_000;
        font.set_vertical_metrics(&metrics).unwrap();

        let actual = font.vertical_metrics().unwrap();
        assert_eq!(0, actual.win_descent);
        assert_eq!(i16::MAX as i32, actual.hhea_ascent);
    }

    #[test]
    fn missing_os2_is_an_error() {
        let font = EditableFont::from_bytes(test_fonts::without_os2()).unwrap();
        assert!(matches!(
            font.vertical_metrics(),
            Err(Error::MissingTable(tag)) if tag == Os2::TAG
        ));
    }
}
