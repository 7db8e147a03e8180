use planar::{
    graph::PlanarGraph, overlay, predicates, relate, Context, Contour, Coordinate, Geometry,
    Orientation, Polygon,
};
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> Contour {
    Contour::from_flat(&[x, y, x + w, y, x + w, y + h, x, y + h]).unwrap()
}

fn square(x: f64, y: f64, size: f64) -> Geometry {
    Geometry::Contour(rect(x, y, size, size))
}

fn total_area(gs: &[Geometry]) -> f64 {
    gs.iter().map(Geometry::area).sum()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

/// Integer rectangles, so that every overlay is exact.
fn rect_strategy() -> impl Strategy<Value = Contour> {
    (0..6i32, 0..6i32, 1..5i32, 1..5i32)
        .prop_map(|(x, y, w, h)| rect(x as f64, y as f64, w as f64, h as f64))
}

/// Rings with arbitrary float vertices: usually not rectilinear, often
/// self-intersecting.
fn ring_strategy() -> impl Strategy<Value = Contour> {
    prop::collection::vec((-10.0..10.0f64, -10.0..10.0f64), 3..9).prop_map(|vs| {
        Contour::new(vs.into_iter().map(|(x, y)| Coordinate::new(x, y)).collect())
    })
}

/// Each contour rotated to start at its smallest vertex, and the contours sorted.
fn canonical(p: &Polygon) -> Vec<Vec<Coordinate>> {
    let mut ret: Vec<Vec<Coordinate>> = p
        .contours()
        .iter()
        .map(|c| {
            let vs = c.vertices();
            let start = (0..vs.len())
                .min_by(|&i, &j| vs[i].cmp_xy(&vs[j]))
                .unwrap_or(0);
            vs[start..].iter().chain(&vs[..start]).copied().collect()
        })
        .collect();
    ret.sort_by(|a, b| a[0].cmp_xy(&b[0]));
    ret
}

proptest! {
    #[test]
    fn simplify_is_idempotent(a in rect_strategy(), b in rect_strategy()) {
        let ctx = Context::default();
        let once = Polygon::new(vec![a, b]).simplify(&ctx).unwrap();
        let twice = once.simplify(&ctx).unwrap();
        prop_assert_eq!(canonical(&once), canonical(&twice));
    }

    #[test]
    fn overlays_commute(a in rect_strategy(), b in rect_strategy()) {
        let ctx = Context::default();
        let (a, b) = (Geometry::Contour(a), Geometry::Contour(b));

        let ab = overlay::union(&ctx, &a, &b).unwrap();
        let ba = overlay::union(&ctx, &b, &a).unwrap();
        assert_close(total_area(&ab), total_area(&ba));
        prop_assert!(relate::equals(&ctx, &ab[0], &ba[0]).unwrap());

        let ab = overlay::intersection(&ctx, &a, &b).unwrap();
        let ba = overlay::intersection(&ctx, &b, &a).unwrap();
        assert_close(total_area(&ab), total_area(&ba));
    }

    #[test]
    fn set_algebra(a in rect_strategy(), b in rect_strategy()) {
        let ctx = Context::default();
        let (a, b) = (Geometry::Contour(a), Geometry::Contour(b));

        let a_minus_b = total_area(&overlay::difference(&ctx, &a, &b).unwrap());
        let b_minus_a = total_area(&overlay::difference(&ctx, &b, &a).unwrap());
        let both = total_area(&overlay::intersection(&ctx, &a, &b).unwrap());
        let either = total_area(&overlay::symmetric_difference(&ctx, &a, &b).unwrap());
        assert_close(a_minus_b + both, a.area());
        assert_close(either, a_minus_b + b_minus_a);
    }

    #[test]
    fn relate_is_consistent(a in rect_strategy(), b in rect_strategy()) {
        let ctx = Context::default();
        let (a, b) = (Geometry::Contour(a), Geometry::Contour(b));

        prop_assert_eq!(
            relate::equals(&ctx, &a, &b).unwrap(),
            relate::relate(&ctx, &a, &b, "T*F**FFF*").unwrap()
        );
        prop_assert_eq!(
            relate::disjoint(&ctx, &a, &b).unwrap(),
            !relate::intersects(&ctx, &a, &b).unwrap()
        );
        prop_assert!(relate::relate(&ctx, &a, &a, "T*F**FFF*").unwrap());
        prop_assert_eq!(
            relate::calculate(&ctx, &a, &b).unwrap().transposed(),
            relate::calculate(&ctx, &b, &a).unwrap()
        );
    }

    #[test]
    fn simplified_rings_are_valid(ring in ring_strategy()) {
        init_tracing();
        let ctx = Context::default();
        let once = Polygon::new(vec![ring]).simplify(&ctx).unwrap();
        prop_assert!(
            once.is_ogc_valid(ctx.tolerance),
            "{:?}",
            once.ogc_validation_error(ctx.tolerance)
        );

        let twice = once.simplify(&ctx).unwrap();
        prop_assert_eq!(once.contours().len(), twice.contours().len());
        prop_assert!((once.area() - twice.area()).abs() < 1e-6);
    }

    #[test]
    fn set_algebra_on_rings(ring in ring_strategy()) {
        let ctx = Context::default();
        let a = Geometry::Contour(ring.clone());
        let b = square(-2.0, -2.0, 4.0);
        let simple = Polygon::new(vec![ring]).simplify(&ctx).unwrap();

        let a_minus_b = total_area(&overlay::difference(&ctx, &a, &b).unwrap());
        let b_minus_a = total_area(&overlay::difference(&ctx, &b, &a).unwrap());
        let both = total_area(&overlay::intersection(&ctx, &a, &b).unwrap());
        let either = total_area(&overlay::symmetric_difference(&ctx, &a, &b).unwrap());
        prop_assert!((a_minus_b + both - simple.area()).abs() < 1e-6);
        prop_assert!((either - (a_minus_b + b_minus_a)).abs() < 1e-6);
    }

    #[test]
    fn arbitrary_rings_dont_panic(
        flat in prop::collection::vec(-10.0..10.0f64, 6..16),
        op in prop_oneof![
            Just(overlay::OverlayOp::Union),
            Just(overlay::OverlayOp::Intersection),
            Just(overlay::OverlayOp::Difference),
            Just(overlay::OverlayOp::SymmetricDifference),
        ],
    ) {
        let ctx = Context::default();
        let len = flat.len() / 2 * 2;
        let ring = Geometry::Contour(Contour::from_flat(&flat[..len]).unwrap());
        if let Ok(out) = overlay::overlay(&ctx, &ring, &square(-2.0, -2.0, 4.0), op) {
            prop_assert!(out.iter().all(|g| g.area() >= 0.0));
        }
    }
}

#[test]
fn orientation_survives_translation() {
    let offset = 1e12;
    let (a, b, c) = (
        Coordinate::new(0.0, 0.0),
        Coordinate::new(1.0, 0.0),
        Coordinate::new(0.0, 1.0),
    );
    let near = predicates::orientation(&a, &b, &c);
    let far = predicates::orientation(
        &a.translated(offset, offset),
        &b.translated(offset, offset),
        &c.translated(offset, offset),
    );
    assert_eq!(near, 1);
    assert_eq!(near, far);
}

#[test]
fn overlapping_squares() -> anyhow::Result<()> {
    init_tracing();
    let ctx = Context::default();
    let a = square(0.0, 0.0, 1.0);
    let b = square(0.5, 0.5, 1.0);
    assert_close(total_area(&overlay::union(&ctx, &a, &b)?), 1.75);
    assert_close(total_area(&overlay::intersection(&ctx, &a, &b)?), 0.25);
    assert_close(total_area(&overlay::difference(&ctx, &a, &b)?), 0.75);
    Ok(())
}

#[test]
fn square_with_triangular_hole() {
    let shell = rect(0.0, 0.0, 4.0, 4.0);
    let hole = Contour::from_flat(&[1.0, 1.0, 2.0, 3.0, 3.0, 1.0]).unwrap();
    assert_eq!(hole.orientation(1e-9), Orientation::Clockwise);
    let poly = Polygon::new(vec![shell, hole]);
    assert_eq!(poly.ogc_validation_error(1e-9), None);
    assert_close(poly.area(), 16.0 - 2.0);
}

#[test]
fn point_in_square() -> anyhow::Result<()> {
    let ctx = Context::default();
    let p = Geometry::Point(Coordinate::new(0.5, 0.5));
    let sq = square(0.0, 0.0, 1.0);
    assert!(relate::within(&ctx, &p, &sq)?);
    assert!(!relate::touches(&ctx, &p, &sq)?);
    Ok(())
}

#[test]
fn bowtie() {
    let c = Contour::from_flat(&[0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0]).unwrap();
    assert_eq!(c.orientation(1e-9), Orientation::Undefined);
    assert_eq!(c.self_intersections(1e-9), vec![Coordinate::new(0.5, 0.5)]);
}

#[test]
fn nearby_vertices_collapse() {
    init_tracing();
    let ctx = Context::new(1e-6).unwrap();
    let a = square(0.0, 0.0, 1.0);
    let b = Geometry::Contour(
        Contour::from_flat(&[1.0 + 1e-8, 1.0 - 1e-8, 2.0, 1.0, 2.0, 2.0, 1.0, 2.0]).unwrap(),
    );
    let g = PlanarGraph::build(&ctx, &[&a, &b], false).unwrap();
    let near_corner = g
        .node_indices()
        .filter(|&n| g[n].coord.distance(&Coordinate::new(1.0, 1.0)) < 1e-6)
        .count();
    assert_eq!(near_corner, 1);

    let union = overlay::union(&ctx, &a, &b).unwrap();
    assert!((total_area(&union) - 2.0).abs() < 1e-6);
}
