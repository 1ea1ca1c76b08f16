//! Removing a glyph's substitution and positioning rules.
//!
//! Only the lookup types whose rules are keyed directly by glyph are pruned:
//! GSUB single, multiple, alternate and ligature, and GPOS single and pair
//! adjustment, including when they are wrapped in extension lookups. Other
//! lookups are left as they are; once a glyph is unmapped and its rules are
//! gone they can no longer match it.

use log::trace;
use write_fonts::{
    from_obj::ToOwnedTable,
    read::{TableProvider, TopLevelTable},
    tables::{
        gpos::{self, Gpos, PairPos, PositionLookup, SinglePos},
        gsub::{
            self, AlternateSubstFormat1, Gsub, LigatureSubstFormat1, MultipleSubstFormat1,
            SingleSubst, SubstitutionLookup,
        },
        layout::{CoverageTable, Lookup},
    },
    types::GlyphId16,
    OffsetMarker,
};

use crate::{
    error::Error,
    font::{EditableFont, Layout},
};

/// Call `prune` on every subtable, true if any of them changed.
fn prune_subtables<T>(lookup: &mut Lookup<T>, mut prune: impl FnMut(&mut T) -> bool) -> bool {
    let mut changed = false;
    for subtable in lookup.subtables.iter_mut() {
        changed |= prune(subtable);
    }
    changed
}

/// Keep the covered glyphs accepted by `keep`.
fn retain_coverage(
    coverage: &mut OffsetMarker<CoverageTable>,
    keep: impl Fn(GlyphId16) -> bool,
) -> bool {
    let before = coverage.len();
    let glyphs = coverage.iter().filter(|gid| keep(*gid)).collect::<Vec<_>>();
    if glyphs.len() == before {
        return false;
    }
    *coverage = glyphs.into_iter().collect::<CoverageTable>().into();
    true
}

/// Keep the covered glyphs, and the records parallel to them, accepted by `keep`.
///
/// `keep` may also edit the record it is given; it sets the flag it is
/// handed when it does.
fn retain_covered<T>(
    coverage: &mut OffsetMarker<CoverageTable>,
    records: &mut Vec<T>,
    mut keep: impl FnMut(GlyphId16, &mut T, &mut bool) -> bool,
) -> bool {
    let glyphs = coverage.iter().collect::<Vec<_>>();
    let before = glyphs.len();
    let mut edited = false;
    let mut kept_glyphs = Vec::with_capacity(before);
    let mut kept_records = Vec::with_capacity(before);
    for (gid, mut record) in glyphs.into_iter().zip(std::mem::take(records)) {
        if keep(gid, &mut record, &mut edited) {
            kept_glyphs.push(gid);
            kept_records.push(record);
        }
    }
    *records = kept_records;
    if kept_glyphs.len() != before {
        *coverage = kept_glyphs.into_iter().collect::<CoverageTable>().into();
        return true;
    }
    edited
}

fn apply_delta(gid: GlyphId16, delta: i16) -> GlyphId16 {
    GlyphId16::new((gid.to_u16() as i32 + delta as i32).rem_euclid(0x10000) as u16)
}

fn prune_single_subst(subtable: &mut SingleSubst, removed: GlyphId16) -> bool {
    match subtable {
        SingleSubst::Format1(table) => {
            let delta = table.delta_glyph_id;
            retain_coverage(&mut table.coverage, |gid| {
                gid != removed && apply_delta(gid, delta) != removed
            })
        }
        SingleSubst::Format2(table) => retain_covered(
            &mut table.coverage,
            &mut table.substitute_glyph_ids,
            |gid, substitute, _| gid != removed && *substitute != removed,
        ),
    }
}

fn prune_multiple_subst(subtable: &mut MultipleSubstFormat1, removed: GlyphId16) -> bool {
    retain_covered(
        &mut subtable.coverage,
        &mut subtable.sequences,
        |gid, sequence, _| gid != removed && !sequence.substitute_glyph_ids.contains(&removed),
    )
}

fn prune_alternate_subst(subtable: &mut AlternateSubstFormat1, removed: GlyphId16) -> bool {
    retain_covered(
        &mut subtable.coverage,
        &mut subtable.alternate_sets,
        |gid, set, edited| {
            if gid == removed {
                return false;
            }
            let before = set.alternate_glyph_ids.len();
            set.alternate_glyph_ids.retain(|alt| *alt != removed);
            *edited |= set.alternate_glyph_ids.len() != before;
            !set.alternate_glyph_ids.is_empty()
        },
    )
}

fn prune_ligature_subst(subtable: &mut LigatureSubstFormat1, removed: GlyphId16) -> bool {
    retain_covered(
        &mut subtable.coverage,
        &mut subtable.ligature_sets,
        |gid, set, edited| {
            if gid == removed {
                return false;
            }
            let before = set.ligatures.len();
            set.ligatures.retain(|lig| {
                lig.ligature_glyph != removed && !lig.component_glyph_ids.contains(&removed)
            });
            *edited |= set.ligatures.len() != before;
            !set.ligatures.is_empty()
        },
    )
}

fn prune_single_pos(subtable: &mut SinglePos, removed: GlyphId16) -> bool {
    match subtable {
        SinglePos::Format1(table) => retain_coverage(&mut table.coverage, |gid| gid != removed),
        SinglePos::Format2(table) => retain_covered(
            &mut table.coverage,
            &mut table.value_records,
            |gid, _, _| gid != removed,
        ),
    }
}

fn prune_pair_pos(subtable: &mut PairPos, removed: GlyphId16) -> bool {
    match subtable {
        PairPos::Format1(table) => {
            retain_covered(&mut table.coverage, &mut table.pair_sets, |gid, set, edited| {
                if gid == removed {
                    return false;
                }
                let before = set.pair_value_records.len();
                set.pair_value_records
                    .retain(|pair| pair.second_glyph != removed);
                *edited |= set.pair_value_records.len() != before;
                !set.pair_value_records.is_empty()
            })
        }
        // class based kerning keys off the first glyph's coverage
        PairPos::Format2(table) => retain_coverage(&mut table.coverage, |gid| gid != removed),
    }
}

/// Remove every GSUB rule mentioning `removed`, true if anything changed.
pub(crate) fn prune_gsub(table: &mut Gsub, removed: GlyphId16) -> bool {
    let mut changed = false;
    for lookup in table.lookup_list.lookups.iter_mut() {
        changed |= match &mut **lookup {
            SubstitutionLookup::Single(lookup) => {
                prune_subtables(lookup, |st| prune_single_subst(st, removed))
            }
            SubstitutionLookup::Multiple(lookup) => {
                prune_subtables(lookup, |st| prune_multiple_subst(st, removed))
            }
            SubstitutionLookup::Alternate(lookup) => {
                prune_subtables(lookup, |st| prune_alternate_subst(st, removed))
            }
            SubstitutionLookup::Ligature(lookup) => {
                prune_subtables(lookup, |st| prune_ligature_subst(st, removed))
            }
            SubstitutionLookup::Extension(lookup) => {
                prune_subtables(lookup, |ext| match ext {
                    gsub::ExtensionSubtable::Single(ext) => {
                        prune_single_subst(&mut ext.extension, removed)
                    }
                    gsub::ExtensionSubtable::Multiple(ext) => {
                        prune_multiple_subst(&mut ext.extension, removed)
                    }
                    gsub::ExtensionSubtable::Alternate(ext) => {
                        prune_alternate_subst(&mut ext.extension, removed)
                    }
                    gsub::ExtensionSubtable::Ligature(ext) => {
                        prune_ligature_subst(&mut ext.extension, removed)
                    }
                    _ => false,
                })
            }
            _ => false,
        };
    }
    changed
}

/// Remove every GPOS rule mentioning `removed`, true if anything changed.
pub(crate) fn prune_gpos(table: &mut Gpos, removed: GlyphId16) -> bool {
    let mut changed = false;
    for lookup in table.lookup_list.lookups.iter_mut() {
        changed |= match &mut **lookup {
            PositionLookup::Single(lookup) => {
                prune_subtables(lookup, |st| prune_single_pos(st, removed))
            }
            PositionLookup::Pair(lookup) => {
                prune_subtables(lookup, |st| prune_pair_pos(st, removed))
            }
            PositionLookup::Extension(lookup) => prune_subtables(lookup, |ext| match ext {
                gpos::ExtensionSubtable::Single(ext) => {
                    prune_single_pos(&mut ext.extension, removed)
                }
                gpos::ExtensionSubtable::Pair(ext) => prune_pair_pos(&mut ext.extension, removed),
                _ => false,
            }),
            _ => false,
        };
    }
    changed
}

impl EditableFont {
    fn layout_mut(&mut self) -> Result<&mut Layout, Error> {
        if self.layout.is_none() {
            let layout = {
                let font = self.source()?;
                Layout {
                    gsub: font.gsub().ok().map(|t| t.to_owned_table()),
                    gpos: font.gpos().ok().map(|t| t.to_owned_table()),
                }
            };
            self.layout = Some(layout);
        }
        Ok(self.layout.get_or_insert_with(Layout::default))
    }

    /// Strip every substitution and positioning rule that consumes or
    /// produces `gid`.
    pub fn remove_pos_sub(&mut self, gid: GlyphId16) -> Result<(), Error> {
        let layout = self.layout_mut()?;
        let gsub_changed = layout
            .gsub
            .as_mut()
            .map(|gsub| prune_gsub(gsub, gid))
            .unwrap_or_default();
        let gpos_changed = layout
            .gpos
            .as_mut()
            .map(|gpos| prune_gpos(gpos, gid))
            .unwrap_or_default();
        trace!("Pruned rules for glyph {gid}: gsub {gsub_changed}, gpos {gpos_changed}");
        if gsub_changed {
            self.touch(Gsub::TAG);
        }
        if gpos_changed {
            self.touch(Gpos::TAG);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use write_fonts::{
        read::{FontRef, TableProvider},
        tables::{
            gpos::{PairPosFormat1, PairSet, PairValueRecord, ValueRecord},
            gsub::{ExtensionSubstFormat1, Ligature, LigatureSet, SingleSubstFormat2},
            layout::{FeatureList, LookupFlag, ScriptList},
        },
    };

    use super::*;

    fn gid(id: u16) -> GlyphId16 {
        GlyphId16::new(id)
    }

    fn coverage(ids: &[u16]) -> CoverageTable {
        ids.iter().map(|id| gid(*id)).collect()
    }

    fn single_subst(pairs: &[(u16, u16)]) -> SingleSubst {
        SingleSubst::Format2(SingleSubstFormat2::new(
            pairs.iter().map(|(a, _)| gid(*a)).collect(),
            pairs.iter().map(|(_, b)| gid(*b)).collect(),
        ))
    }

    fn covered(coverage: &CoverageTable) -> Vec<u16> {
        coverage.iter().map(|g| g.to_u16()).collect()
    }

    #[test]
    fn single_subst_drops_input_and_output() {
        let mut subtable = single_subst(&[(1, 5), (2, 3), (4, 6)]);
        assert!(prune_single_subst(&mut subtable, gid(3)));
        assert!(prune_single_subst(&mut subtable, gid(4)));
        let SingleSubst::Format2(table) = subtable else {
            panic!("format changed");
        };
        assert_eq!(vec![1], covered(&table.coverage));
        assert_eq!(vec![gid(5)], table.substitute_glyph_ids);
    }

    #[test]
    fn single_subst_delta_accounts_for_output() {
        let mut subtable = SingleSubst::Format1(gsub::SingleSubstFormat1::new(
            coverage(&[1, 2]),
            10,
        ));
        assert!(prune_single_subst(&mut subtable, gid(12)));
        let SingleSubst::Format1(table) = subtable else {
            panic!("format changed");
        };
        assert_eq!(vec![1], covered(&table.coverage));
    }

    #[test]
    fn unrelated_glyph_changes_nothing() {
        let mut subtable = single_subst(&[(1, 5)]);
        assert!(!prune_single_subst(&mut subtable, gid(9)));
    }

    #[test]
    fn ligatures_with_removed_components_go() {
        let mut subtable = LigatureSubstFormat1::new(
            coverage(&[1, 2]),
            vec![
                LigatureSet::new(vec![
                    Ligature::new(gid(10), vec![gid(2)]),
                    Ligature::new(gid(11), vec![gid(3)]),
                ]),
                LigatureSet::new(vec![Ligature::new(gid(12), vec![gid(3)])]),
            ],
        );
        assert!(prune_ligature_subst(&mut subtable, gid(3)));
        assert_eq!(vec![1], covered(&subtable.coverage));
        assert_eq!(1, subtable.ligature_sets.len());
        assert_eq!(gid(10), subtable.ligature_sets[0].ligatures[0].ligature_glyph);
    }

    #[test]
    fn extension_lookups_are_pruned() {
        let mut table = Gsub::new(
            ScriptList::default(),
            FeatureList::default(),
            gsub::SubstitutionLookupList::new(vec![SubstitutionLookup::Extension(Lookup::new(
                LookupFlag::empty(),
                vec![gsub::ExtensionSubtable::Single(ExtensionSubstFormat1::new(
                    1,
                    single_subst(&[(1, 2), (3, 4)]),
                ))],
            ))]),
        );
        assert!(prune_gsub(&mut table, gid(2)));
        let SubstitutionLookup::Extension(lookup) = &*table.lookup_list.lookups[0] else {
            panic!("lookup type changed");
        };
        let gsub::ExtensionSubtable::Single(ext) = &*lookup.subtables[0] else {
            panic!("extension type changed");
        };
        let SingleSubst::Format2(subst) = &*ext.extension else {
            panic!("format changed");
        };
        assert_eq!(vec![3], covered(&subst.coverage));
    }

    #[test]
    fn pair_pos_drops_first_and_second_glyphs() {
        let record = |second| {
            PairValueRecord::new(gid(second), ValueRecord::default(), ValueRecord::default())
        };
        let mut subtable = PairPos::Format1(PairPosFormat1::new(
            coverage(&[1, 2]),
            vec![
                PairSet::new(vec![record(2), record(3)]),
                PairSet::new(vec![record(1)]),
            ],
        ));
        assert!(prune_pair_pos(&mut subtable, gid(2)));
        let PairPos::Format1(table) = subtable else {
            panic!("format changed");
        };
        assert_eq!(vec![1], covered(&table.coverage));
        assert_eq!(
            vec![gid(3)],
            table.pair_sets[0]
                .pair_value_records
                .iter()
                .map(|r| r.second_glyph)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn remove_pos_sub_rewrites_tables() {
        let original = test_fonts::basic();
        let source = FontRef::new(&original).unwrap();
        let mut gsub: Gsub = source.gsub().unwrap().to_owned_table();
        let mut gpos: Gpos = source.gpos().unwrap().to_owned_table();
        assert!(prune_gsub(&mut gsub, test_fonts::GID_B));
        assert!(prune_gpos(&mut gpos, test_fonts::GID_B));

        let mut font = EditableFont::from_bytes(original.clone()).unwrap();
        font.remove_pos_sub(test_fonts::GID_B).unwrap();
        assert!(font.is_edited());
        let bytes = font.to_bytes().unwrap();
        let saved = FontRef::new(&bytes).unwrap();
        let mut gsub: Gsub = saved.gsub().unwrap().to_owned_table();
        let mut gpos: Gpos = saved.gpos().unwrap().to_owned_table();
        assert!(!prune_gsub(&mut gsub, test_fonts::GID_B));
        assert!(!prune_gpos(&mut gpos, test_fonts::GID_B));
    }

    #[test]
    fn fonts_without_layout_are_fine() {
        let mut font = EditableFont::from_bytes(test_fonts::without_os2()).unwrap();
        font.remove_pos_sub(test_fonts::GID_B).unwrap();
        assert!(!font.is_edited());
    }
}
