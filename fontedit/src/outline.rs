//! Operations on TrueType outlines.
//!
//! Contours are converted to [kurbo] paths when geometry is needed and back
//! to on/off curve points afterwards.

use kurbo::{Affine, BezPath, ParamCurve, ParamCurveExtrema, PathSeg, Point, Shape};
use log::warn;
use write_fonts::{
    read::tables::glyf::{Anchor, CurvePoint},
    tables::glyf::{Component, Contour, Glyph, SimpleGlyph},
    types::GlyphId16,
    OtRound,
};

// Deeper nesting than this is assumed to be a reference cycle
const MAX_COMPONENT_DEPTH: usize = 64;

fn point(p: &CurvePoint) -> Point {
    Point::new(p.x as f64, p.y as f64)
}

/// Convert one closed TrueType contour to a path, materialising implied
/// on-curve points between consecutive off-curve points.
pub(crate) fn contour_path(contour: &Contour) -> BezPath {
    let points = contour.iter().collect::<Vec<_>>();
    let mut path = BezPath::new();
    if points.is_empty() {
        return path;
    }
    let start_idx = points.iter().position(|p| p.on_curve);
    let start = match start_idx {
        Some(idx) => point(points[idx]),
        // every point is off-curve, start between the last and the first
        None => point(points[points.len() - 1]).midpoint(point(points[0])),
    };
    let first = start_idx.map(|idx| idx + 1).unwrap_or(0);

    path.move_to(start);
    let mut pending: Option<Point> = None;
    for i in 0..points.len() {
        let p = points[(first + i) % points.len()];
        if start_idx == Some((first + i) % points.len()) {
            break;
        }
        let pt = point(p);
        match (p.on_curve, pending) {
            (true, Some(ctrl)) => {
                path.quad_to(ctrl, pt);
                pending = None;
            }
            (true, None) => path.line_to(pt),
            (false, Some(ctrl)) => {
                path.quad_to(ctrl, ctrl.midpoint(pt));
                pending = Some(pt);
            }
            (false, None) => pending = Some(pt),
        }
    }
    if let Some(ctrl) = pending {
        path.quad_to(ctrl, start);
    }
    path.close_path();
    path
}

/// Reverse the direction of a contour, keeping its start point.
fn reversed(contour: &Contour) -> Contour {
    let mut points = contour.iter().copied().collect::<Vec<_>>();
    if points.len() > 1 {
        points[1..].reverse();
    }
    points.into()
}

/// Orient outer contours clockwise and holes counter-clockwise.
///
/// A contour's depth is the number of other contours enclosing its first
/// point; even depths are outer contours. Returns true if anything changed.
pub(crate) fn correct_direction(glyph: &mut SimpleGlyph) -> bool {
    let paths = glyph.contours.iter().map(contour_path).collect::<Vec<_>>();
    let mut changed = false;
    for (idx, contour) in glyph.contours.iter_mut().enumerate() {
        let Some(probe) = contour.iter().next().map(point) else {
            continue;
        };
        let area = paths[idx].area();
        if area == 0.0 {
            continue;
        }
        let depth = paths
            .iter()
            .enumerate()
            .filter(|(other, path)| *other != idx && path.winding(probe) != 0)
            .count();
        let should_be_clockwise = depth % 2 == 0;
        let is_clockwise = area < 0.0;
        if should_be_clockwise != is_clockwise {
            *contour = reversed(contour);
            changed = true;
        }
    }
    changed
}

fn on(p: Point) -> CurvePoint {
    let (x, y) = p.ot_round();
    CurvePoint::new(x, y, true)
}

fn off(p: Point) -> CurvePoint {
    let (x, y) = p.ot_round();
    CurvePoint::new(x, y, false)
}

/// Split quadratic segments at their horizontal and vertical extrema.
///
/// Contours that need no split keep their original points. Split points are
/// rounded to the integer grid as they are produced. Returns true if
/// anything changed.
pub(crate) fn add_extrema(glyph: &mut SimpleGlyph) -> bool {
    let mut changed = false;
    for contour in glyph.contours.iter_mut() {
        let path = contour_path(contour);
        let mut split = false;
        let mut points: Vec<CurvePoint> = Vec::with_capacity(contour.len());
        for seg in path.segments() {
            match seg {
                PathSeg::Line(line) => points.push(on(line.p0)),
                PathSeg::Quad(quad) => {
                    let ranges = quad.extrema_ranges();
                    split |= ranges.len() > 1;
                    for range in ranges {
                        let part = quad.subsegment(range);
                        points.push(on(part.p0));
                        points.push(off(part.p1));
                    }
                }
                PathSeg::Cubic(_) => unreachable!("TrueType contours are quadratic"),
            }
        }
        if !split {
            continue;
        }
        points.dedup_by(|b, a| a.on_curve && b.on_curve && a.x == b.x && a.y == b.y);
        *contour = points.into();
        changed = true;
    }
    changed
}

/// True if the component transform flips the outline or scales it by 2.0
/// or more along an axis; rasterizers commonly mishandle both.
pub(crate) fn is_problematic(component: &Component) -> bool {
    let t = &component.transform;
    let [xx, yx, xy, yy] = [t.xx, t.yx, t.xy, t.yy].map(|v| v.to_f32() as f64);
    let determinant = xx * yy - yx * xy;
    determinant < 0.0 || [xx, yx, xy, yy].iter().any(|v| v.abs() >= 2.0)
}

fn component_affine(component: &Component) -> Affine {
    let t = &component.transform;
    let [xx, yx, xy, yy] = [t.xx, t.yx, t.xy, t.yy].map(|v| v.to_f32() as f64);
    Affine::new([xx, yx, xy, yy, 0.0, 0.0])
}

/// Collect the contours of `gid` with every component resolved.
fn flatten(
    glyphs: &[Glyph],
    gid: GlyphId16,
    depth: usize,
    out: &mut Vec<Vec<Point>>,
    on_curve: &mut Vec<Vec<bool>>,
) -> bool {
    if depth > MAX_COMPONENT_DEPTH {
        warn!("Component nesting of glyph {gid} is too deep, assuming a cycle");
        return false;
    }
    match glyphs.get(gid.to_u16() as usize) {
        None | Some(Glyph::Empty) => true,
        Some(Glyph::Simple(simple)) => {
            for contour in simple.contours.iter() {
                out.push(contour.iter().map(point).collect());
                on_curve.push(contour.iter().map(|p| p.on_curve).collect());
            }
            true
        }
        Some(Glyph::Composite(composite)) => {
            for component in composite.components() {
                let mut points = Vec::new();
                let mut flags = Vec::new();
                if !flatten(glyphs, component.glyph, depth + 1, &mut points, &mut flags) {
                    return false;
                }
                let affine = component_affine(component);
                for contour in points.iter_mut() {
                    for p in contour.iter_mut() {
                        *p = affine * *p;
                    }
                }
                let offset = match component.anchor {
                    Anchor::Offset { x, y } => kurbo::Vec2::new(x as f64, y as f64),
                    Anchor::Point { base, component: child_point } => {
                        let parent = out.iter().flatten().nth(base as usize);
                        let child = points.iter().flatten().nth(child_point as usize);
                        match (parent, child) {
                            (Some(parent), Some(child)) => *parent - *child,
                            _ => {
                                warn!("Glyph {gid} anchors to a point that doesn't exist");
                                kurbo::Vec2::ZERO
                            }
                        }
                    }
                };
                for contour in points.iter_mut() {
                    for p in contour.iter_mut() {
                        *p += offset;
                    }
                }
                out.extend(points);
                on_curve.extend(flags);
            }
            true
        }
    }
}

/// Replace a composite glyph with a simple glyph carrying the same outline.
///
/// Returns None if `gid` is not a composite or its components can't be resolved.
pub(crate) fn decompose(glyphs: &[Glyph], gid: GlyphId16) -> Option<Glyph> {
    let Some(Glyph::Composite(_)) = glyphs.get(gid.to_u16() as usize) else {
        return None;
    };
    let mut points = Vec::new();
    let mut flags = Vec::new();
    if !flatten(glyphs, gid, 0, &mut points, &mut flags) {
        return None;
    }
    let contours = points
        .into_iter()
        .zip(flags)
        .map(|(points, flags)| {
            points
                .into_iter()
                .zip(flags)
                .map(|(p, on_curve)| {
                    let (x, y) = p.ot_round();
                    CurvePoint::new(x, y, on_curve)
                })
                .collect::<Vec<_>>()
                .into()
        })
        .collect::<Vec<Contour>>();
    if contours.is_empty() {
        return Some(Glyph::Empty);
    }
    let mut simple = SimpleGlyph {
        contours,
        ..Default::default()
    };
    simple.recompute_bounding_box();
    Some(Glyph::Simple(simple))
}
