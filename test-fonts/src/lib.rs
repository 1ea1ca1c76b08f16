//! Tiny TrueType fonts built in memory for tests.
//!
//! Every font shares one glyph set:
//!
//! | gid | glyph | codepoint |
//! |---|---|---|
//! | 0 | .notdef | |
//! | 1 | space | U+0020 |
//! | 2 | A | U+0041 |
//! | 3 | B | U+0042 |
//! | 4 | o | U+006F |
//! | 5 | acute | U+00B4 |
//! | 6 | Aacute, a composite of A and acute | U+00C1 |
//! | 7 | fi | U+FB01 |
//!
//! [basic] also carries a GSUB with a ligature (A acute → Aacute), a single
//! substitution (B → A) and an extension wrapped single substitution
//! (o → B), and a GPOS with pair kerning for A B and B o.

use write_fonts::{
    read::tables::glyf::{Anchor, CurvePoint, Transform},
    tables::{
        cmap::Cmap,
        glyf::{Bbox, Component, ComponentFlags, CompositeGlyph, GlyfLocaBuilder, Glyph, SimpleGlyph},
        gpos::{self, Gpos, PairPos, PairPosFormat1, PairSet, PairValueRecord, PositionLookup, ValueRecord},
        gsub::{
            self, ExtensionSubstFormat1, Gsub, Ligature, LigatureSet, LigatureSubstFormat1, SingleSubst,
            SingleSubstFormat2, SubstitutionLookup,
        },
        head::Head,
        hhea::Hhea,
        hmtx::{Hmtx, LongMetric},
        layout::{FeatureList, Lookup, LookupFlag, ScriptList},
        loca::LocaFormat,
        maxp::Maxp,
        name::{Name, NameRecord},
        os2::Os2,
        post::Post,
    },
    types::{FWord, GlyphId, GlyphId16, NameId, UfWord},
    FontBuilder,
};

pub const UNITS_PER_EM: u16 = 1000;
pub const NUM_GLYPHS: u16 = 8;

pub const GID_NOTDEF: GlyphId16 = GlyphId16::new(0);
pub const GID_SPACE: GlyphId16 = GlyphId16::new(1);
pub const GID_A: GlyphId16 = GlyphId16::new(2);
pub const GID_B: GlyphId16 = GlyphId16::new(3);
pub const GID_O: GlyphId16 = GlyphId16::new(4);
pub const GID_ACUTE: GlyphId16 = GlyphId16::new(5);
pub const GID_AACUTE: GlyphId16 = GlyphId16::new(6);
pub const GID_FI: GlyphId16 = GlyphId16::new(7);

pub const WIN_ASCENT: u16 = 950;
pub const WIN_DESCENT: u16 = 250;
pub const TYPO_ASCENT: i16 = 800;
pub const TYPO_DESCENT: i16 = -200;
pub const TYPO_LINE_GAP: i16 = 200;
pub const HHEA_ASCENT: i16 = 900;
pub const HHEA_DESCENT: i16 = -250;
pub const HHEA_LINE_GAP: i16 = 0;

pub const FAMILY_NAME: &str = "Test Sans";
pub const FULL_NAME: &str = "Test Sans Regular";
pub const POSTSCRIPT_NAME: &str = "TestSans-Regular";

const GLYPH_NAMES: [&str; NUM_GLYPHS as usize] =
    [".notdef", "space", "A", "B", "o", "acute", "Aacute", "fi"];
const ADVANCES: [u16; NUM_GLYPHS as usize] = [500, 250, 600, 500, 500, 300, 600, 600];
const MAPPINGS: [(char, GlyphId16); 7] = [
    (' ', GID_SPACE),
    ('A', GID_A),
    ('B', GID_B),
    ('o', GID_O),
    ('\u{B4}', GID_ACUTE),
    ('\u{C1}', GID_AACUTE),
    ('\u{FB01}', GID_FI),
];

/// Describes a test font; [TestFont::build] produces the bytes.
#[derive(Debug, Clone)]
pub struct TestFont {
    pub family_name: Option<String>,
    pub full_name: Option<String>,
    pub postscript_name: Option<String>,
    pub os2: bool,
    pub layout: bool,
    pub lowercase_o: bool,
}

impl Default for TestFont {
    fn default() -> Self {
        TestFont {
            family_name: Some(FAMILY_NAME.to_string()),
            full_name: Some(FULL_NAME.to_string()),
            postscript_name: Some(POSTSCRIPT_NAME.to_string()),
            os2: true,
            layout: true,
            lowercase_o: true,
        }
    }
}

/// The standard test font.
pub fn basic() -> Vec<u8> {
    TestFont::default().build()
}

/// A font with neither OS/2 nor layout tables, and no lowercase o mapped.
pub fn without_os2() -> Vec<u8> {
    TestFont {
        os2: false,
        layout: false,
        lowercase_o: false,
        ..Default::default()
    }
    .build()
}

/// The standard font carrying the given names; None leaves a name out.
pub fn with_names(family: Option<&str>, full: Option<&str>, postscript: Option<&str>) -> Vec<u8> {
    TestFont {
        family_name: family.map(str::to_string),
        full_name: full.map(str::to_string),
        postscript_name: postscript.map(str::to_string),
        ..Default::default()
    }
    .build()
}

fn contour(points: &[(i16, i16, bool)]) -> write_fonts::tables::glyf::Contour {
    points
        .iter()
        .map(|(x, y, on_curve)| CurvePoint::new(*x, *y, *on_curve))
        .collect::<Vec<_>>()
        .into()
}

/// A clockwise rectangle, as outer contours are in TrueType.
fn rect(x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<(i16, i16, bool)> {
    vec![(x0, y0, true), (x0, y1, true), (x1, y1, true), (x1, y0, true)]
}

fn simple(contours: Vec<Vec<(i16, i16, bool)>>) -> Glyph {
    let mut glyph = SimpleGlyph {
        contours: contours.iter().map(|points| contour(points)).collect(),
        ..Default::default()
    };
    glyph.recompute_bounding_box();
    Glyph::Simple(glyph)
}

fn glyphs() -> Vec<Glyph> {
    let mut notdef_counter = rect(100, 50, 400, 650);
    notdef_counter[1..].reverse();
    // on-curve points sit on the extrema, counter runs anticlockwise
    let o = simple(vec![
        vec![
            (250, 0, true),
            (0, 0, false),
            (0, 250, true),
            (0, 500, false),
            (250, 500, true),
            (500, 500, false),
            (500, 250, true),
            (500, 0, false),
        ],
        vec![
            (250, 100, true),
            (400, 100, false),
            (400, 250, true),
            (400, 400, false),
            (250, 400, true),
            (100, 400, false),
            (100, 250, true),
            (100, 100, false),
        ],
    ]);
    let acute = vec![(100, 600, true), (200, 750, true), (250, 720, true)];

    let mut aacute = CompositeGlyph::new(
        Component::new(
            GID_A,
            Anchor::Offset { x: 0, y: 0 },
            Transform::default(),
            ComponentFlags {
                use_my_metrics: true,
                ..Default::default()
            },
        ),
        Bbox {
            x_min: 0,
            y_min: 0,
            x_max: 600,
            y_max: 700,
        },
    );
    aacute.add_component(
        Component::new(
            GID_ACUTE,
            Anchor::Offset { x: 150, y: 0 },
            Transform::default(),
            ComponentFlags::default(),
        ),
        Bbox {
            x_min: 250,
            y_min: 600,
            x_max: 400,
            y_max: 750,
        },
    );

    vec![
        simple(vec![rect(50, 0, 450, 700), notdef_counter]),
        Glyph::Empty,
        simple(vec![vec![(0, 0, true), (300, 700, true), (600, 0, true)]]),
        simple(vec![rect(50, 0, 450, 700)]),
        o,
        simple(vec![acute]),
        Glyph::Composite(aacute),
        simple(vec![rect(50, 0, 550, 700)]),
    ]
}

fn gsub() -> Gsub {
    let ligature = LigatureSubstFormat1::new(
        vec![GID_A].into(),
        vec![LigatureSet::new(vec![Ligature::new(
            GID_AACUTE,
            vec![GID_ACUTE],
        )])],
    );
    let b_to_a = SingleSubst::Format2(SingleSubstFormat2::new(vec![GID_B].into(), vec![GID_A]));
    let o_to_b = SingleSubst::Format2(SingleSubstFormat2::new(vec![GID_O].into(), vec![GID_B]));
    Gsub::new(
        ScriptList::default(),
        FeatureList::default(),
        gsub::SubstitutionLookupList::new(vec![
            SubstitutionLookup::Ligature(Lookup::new(LookupFlag::empty(), vec![ligature])),
            SubstitutionLookup::Single(Lookup::new(LookupFlag::empty(), vec![b_to_a])),
            SubstitutionLookup::Extension(Lookup::new(
                LookupFlag::empty(),
                vec![gsub::ExtensionSubtable::Single(ExtensionSubstFormat1::new(
                    1, o_to_b,
                ))],
            )),
        ]),
    )
}

fn gpos() -> Gpos {
    let kern = |second, value| {
        PairValueRecord::new(
            second,
            ValueRecord::new().with_x_advance(value),
            ValueRecord::default(),
        )
    };
    let pairs = PairPos::Format1(PairPosFormat1::new(
        vec![GID_A, GID_B].into(),
        vec![
            PairSet::new(vec![kern(GID_B, -50)]),
            PairSet::new(vec![kern(GID_O, -20)]),
        ],
    ));
    Gpos::new(
        ScriptList::default(),
        FeatureList::default(),
        gpos::PositionLookupList::new(vec![PositionLookup::Pair(Lookup::new(
            LookupFlag::empty(),
            vec![pairs],
        ))]),
    )
}

fn name(font: &TestFont) -> Name {
    let mut records = Vec::new();
    for (name_id, value) in [
        (NameId::FAMILY_NAME, font.family_name.as_deref()),
        (NameId::SUBFAMILY_NAME, Some("Regular")),
        (NameId::FULL_NAME, font.full_name.as_deref()),
        (NameId::POSTSCRIPT_NAME, font.postscript_name.as_deref()),
    ] {
        let Some(value) = value else {
            continue;
        };
        records.push(NameRecord::new(3, 1, 0x409, name_id, value.to_string().into()));
        if value.is_ascii() {
            records.push(NameRecord::new(1, 0, 0, name_id, value.to_string().into()));
        }
    }
    records.sort();
    Name::new(records)
}

impl TestFont {
    pub fn build(&self) -> Vec<u8> {
        let glyphs = glyphs();
        let mut glyf_loca = GlyfLocaBuilder::new();
        for glyph in glyphs.iter() {
            glyf_loca.add_glyph(glyph).unwrap();
        }
        let (glyf, loca, loca_format) = glyf_loca.build();

        let head = Head {
            units_per_em: UNITS_PER_EM,
            x_min: 0,
            y_min: 0,
            x_max: 600,
            y_max: 750,
            lowest_rec_ppem: 8,
            index_to_loc_format: match loca_format {
                LocaFormat::Short => 0,
                LocaFormat::Long => 1,
            },
            ..Default::default()
        };
        let maxp = Maxp {
            num_glyphs: NUM_GLYPHS,
            max_points: Some(16),
            max_contours: Some(2),
            max_composite_points: Some(6),
            max_composite_contours: Some(2),
            max_zones: Some(1),
            max_twilight_points: Some(0),
            max_storage: Some(0),
            max_function_defs: Some(0),
            max_instruction_defs: Some(0),
            max_stack_elements: Some(0),
            max_size_of_instructions: Some(0),
            max_component_elements: Some(2),
            max_component_depth: Some(1),
        };
        let metrics = glyphs
            .iter()
            .zip(ADVANCES)
            .map(|(glyph, advance)| LongMetric {
                advance,
                side_bearing: match glyph {
                    Glyph::Simple(simple) => simple.bbox.x_min,
                    Glyph::Composite(composite) => composite.bbox.x_min,
                    Glyph::Empty => 0,
                },
            })
            .collect::<Vec<_>>();
        let hhea = Hhea {
            ascender: FWord::new(HHEA_ASCENT),
            descender: FWord::new(HHEA_DESCENT),
            line_gap: FWord::new(HHEA_LINE_GAP),
            advance_width_max: UfWord::new(600),
            caret_slope_rise: 1,
            number_of_h_metrics: NUM_GLYPHS,
            ..Default::default()
        };
        let hmtx = Hmtx::new(metrics, Vec::new());
        let cmap = Cmap::from_mappings(
            MAPPINGS
                .iter()
                .filter(|(c, _)| self.lowercase_o || *c != 'o')
                .map(|(c, gid)| (*c, GlyphId::from(*gid))),
        )
        .unwrap();
        let post = Post::new_v2(GLYPH_NAMES);

        let mut builder = FontBuilder::new();
        builder
            .add_table(&head)
            .unwrap()
            .add_table(&maxp)
            .unwrap()
            .add_table(&hhea)
            .unwrap()
            .add_table(&hmtx)
            .unwrap()
            .add_table(&glyf)
            .unwrap()
            .add_table(&loca)
            .unwrap()
            .add_table(&cmap)
            .unwrap()
            .add_table(&post)
            .unwrap()
            .add_table(&name(self))
            .unwrap();
        if self.os2 {
            let os2 = Os2 {
                us_weight_class: 400,
                us_width_class: 5,
                s_typo_ascender: TYPO_ASCENT,
                s_typo_descender: TYPO_DESCENT,
                s_typo_line_gap: TYPO_LINE_GAP,
                us_win_ascent: WIN_ASCENT,
                us_win_descent: WIN_DESCENT,
                us_first_char_index: 0x20,
                us_last_char_index: 0xFB01,
                ul_code_page_range_1: Some(1),
                ul_code_page_range_2: Some(0),
                sx_height: Some(500),
                s_cap_height: Some(700),
                us_default_char: Some(0),
                us_break_char: Some(0x20),
                us_max_context: Some(2),
                ..Default::default()
            };
            builder.add_table(&os2).unwrap();
        }
        if self.layout {
            builder.add_table(&gsub()).unwrap();
            builder.add_table(&gpos()).unwrap();
        }
        builder.build()
    }
}
