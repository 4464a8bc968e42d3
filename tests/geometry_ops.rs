mod util;
use util::*;

use serde_json::json;
use topo_shaper::io::Geometry;
use topo_shaper::prelude::OperationError;
use topo_shaper::{
    AffineOptions, BufferOptions, CleanOptions, ClipOptions, FilterSliversOptions,
    PassThroughOptions, PointsOptions, ProjOptions, ShaperError, SimplifyMethod, SimplifyOptions,
    SnapOptions, affine, buffer, clean, clip, divide, erase, explode, filter_slivers, innerlines,
    inlay, mosaic, points, proj, simplify, snap,
};

#[test]
fn clip_keeps_the_inside() {
    let target = collection(vec![
        feature(rect(0.0, 0.0, 2.0, 2.0), json!({ "id": 1 })),
        feature(rect(10.0, 10.0, 11.0, 11.0), json!({ "id": 2 })),
    ]);
    let mask = rect(1.0, 1.0, 3.0, 3.0);
    let fc = clip(&target, &mask, &ClipOptions::default()).unwrap();
    assert_eq!(fc.len(), 1);
    assert_eq!(prop(&fc.features[0], "id"), &json!(1));
    assert!(close(total_area(&fc), 1.0, 1e-9));
}

#[test]
fn clip_bbox_narrows_the_mask() {
    let target = collection(vec![feature(rect(0.0, 0.0, 4.0, 4.0), json!({}))]);
    let opts = ClipOptions {
        bbox: Some([0.0, 0.0, 1.0, 4.0]),
        ..Default::default()
    };
    let fc = clip(&target, &rect(0.0, 0.0, 2.0, 2.0), &opts).unwrap();
    assert!(close(total_area(&fc), 2.0, 1e-9));
}

#[test]
fn erase_removes_the_inside() {
    let target = collection(vec![feature(rect(0.0, 0.0, 2.0, 2.0), json!({}))]);
    let fc = erase(&target, &rect(1.0, 1.0, 3.0, 3.0), &ClipOptions::default()).unwrap();
    assert_eq!(fc.len(), 1);
    assert!(close(total_area(&fc), 3.0, 1e-9));
}

#[test]
fn clip_points_and_lines() {
    let pts = collection(vec![
        feature(point(0.5, 0.5), json!({ "in": true })),
        feature(point(5.0, 5.0), json!({ "in": false })),
    ]);
    let fc = clip(&pts, &rect(0.0, 0.0, 1.0, 1.0), &ClipOptions::default()).unwrap();
    assert_eq!(fc.len(), 1);
    assert_eq!(prop(&fc.features[0], "in"), &json!(true));

    let line = json!({ "type": "LineString", "coordinates": [[-1, 0.5], [2, 0.5]] });
    let fc = clip(&line, &rect(0.0, 0.0, 1.0, 1.0), &ClipOptions::default()).unwrap();
    let xs: Vec<f64> = positions(fc.features[0].geometry.as_ref())
        .iter()
        .map(|p| p[0])
        .collect();
    assert!(xs.iter().all(|&x| (-1e-9..=1.0 + 1e-9).contains(&x)));
}

#[test]
fn clip_with_point_mask_is_unsupported() {
    let target = rect(0.0, 0.0, 1.0, 1.0);
    assert!(matches!(
        clip(&target, &point(0.0, 0.0), &ClipOptions::default()),
        Err(ShaperError::Operation(OperationError::Unsupported { .. }))
    ));
}

#[test]
fn buffer_point_approximates_a_circle() {
    let fc = buffer(&point(0.0, 0.0), Some(1.0), &BufferOptions::default()).unwrap();
    let a = area(fc.features[0].geometry.as_ref());
    // inscribed 16-gon
    assert!(a > 3.0 && a < std::f64::consts::PI + 1e-9, "area {a}");
}

#[test]
fn buffer_distance_argument_wins() {
    let opts = BufferOptions {
        distance: Some(100.0),
        ..Default::default()
    };
    let fc = buffer(&point(0.0, 0.0), Some(1.0), &opts).unwrap();
    assert!(area(fc.features[0].geometry.as_ref()) < 4.0);
}

/// Two polygons whose shared boundary bulges through (1.3, 0.5).
fn bulging_pair() -> serde_json::Value {
    let a = json!({ "type": "Polygon", "coordinates":
        [[[0, 0], [1, 0], [1.3, 0.5], [1, 1], [0, 1], [0, 0]]] });
    let b = json!({ "type": "Polygon", "coordinates":
        [[[1, 0], [2, 0], [2, 1], [1, 1], [1.3, 0.5], [1, 0]]] });
    collection(vec![feature(a, json!({ "n": "a" })), feature(b, json!({ "n": "b" }))])
}

#[test]
fn simplify_moves_shared_boundaries_together() {
    let opts = SimplifyOptions {
        interval: Some(0.5),
        method: SimplifyMethod::Dp,
        ..Default::default()
    };
    let fc = simplify(&bulging_pair(), &opts).unwrap();
    assert_eq!(fc.len(), 2);
    for f in &fc.features {
        assert!(close(area(f.geometry.as_ref()), 1.0, 1e-12));
        assert!(!positions(f.geometry.as_ref()).contains(&[1.3, 0.5]));
    }
}

#[test]
fn simplify_with_full_percentage_is_a_no_op() {
    let opts = SimplifyOptions {
        percentage: Some(1.0),
        ..Default::default()
    };
    let fc = simplify(&bulging_pair(), &opts).unwrap();
    assert!(close(area(fc.features[0].geometry.as_ref()), 1.15, 1e-12));
    assert!(close(area(fc.features[1].geometry.as_ref()), 0.85, 1e-12));
}

#[test]
fn innerlines_returns_shared_edges() {
    let input = adjacent_squares(json!({}), json!({}));
    let fc = innerlines(&input, &PassThroughOptions::default()).unwrap();
    assert_eq!(fc.len(), 1);
    let mut pts = positions(fc.features[0].geometry.as_ref());
    pts.sort_by(|a, b| a[1].total_cmp(&b[1]));
    assert_eq!(pts, vec![[1.0, 0.0], [1.0, 1.0]]);
}

#[test]
fn explode_and_points() {
    let multi = json!({ "type": "MultiPolygon", "coordinates": [
        [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]],
        [[[5, 0], [6, 0], [6, 1], [5, 1], [5, 0]]]
    ]});
    let input = collection(vec![feature(multi, json!({ "k": "m" }))]);
    let fc = explode(&input, &PassThroughOptions::default()).unwrap();
    assert_eq!(fc.len(), 2);
    assert!(fc.features.iter().all(|f| prop(f, "k") == &json!("m")));

    let fc = points(&input, &PointsOptions::default()).unwrap();
    assert_eq!(fc.len(), 1);
    assert!(matches!(fc.features[0].geometry, Some(Geometry::Point { .. } | Geometry::MultiPoint { .. })));
}

#[test]
fn points_from_xy_fields() {
    let input = collection(vec![
        json!({ "type": "Feature", "geometry": null, "properties": { "lon": 3, "lat": "4.5" } }),
    ]);
    let opts = PointsOptions {
        x: Some("lon".into()),
        y: Some("lat".into()),
        ..Default::default()
    };
    let fc = points(&input, &opts).unwrap();
    assert_eq!(
        fc.features[0].geometry,
        Some(Geometry::Point {
            coordinates: [3.0, 4.5]
        })
    );
}

#[test]
fn snap_affine_and_proj() {
    let fc = snap(
        &point(1.04, 2.96),
        &SnapOptions {
            precision: Some(0.1),
            ..Default::default()
        },
    )
    .unwrap();
    let p = positions(fc.features[0].geometry.as_ref())[0];
    assert!(close(p[0], 1.0, 1e-9) && close(p[1], 3.0, 1e-9));

    let fc = affine(
        &point(1.0, 1.0),
        &AffineOptions {
            shift: Some([2.0, -1.0]),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(positions(fc.features[0].geometry.as_ref()), vec![[3.0, 0.0]]);

    let fc = proj(
        &point(180.0, 0.0),
        &ProjOptions {
            crs: Some("webmercator".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let p = positions(fc.features[0].geometry.as_ref())[0];
    assert!(close(p[0], 20_037_508.342789244, 1e-6));
    assert!(close(p[1], 0.0, 1e-9));
}

#[test]
fn filter_slivers_drops_tiny_rings() {
    let input = collection(vec![
        feature(rect(0.0, 0.0, 10.0, 10.0), json!({ "big": true })),
        feature(rect(20.0, 0.0, 20.1, 0.1), json!({ "big": false })),
    ]);
    let opts = FilterSliversOptions {
        min_area: Some(1.0),
        remove_empty: true,
        ..Default::default()
    };
    let fc = filter_slivers(&input, &opts).unwrap();
    assert_eq!(fc.len(), 1);
    assert_eq!(prop(&fc.features[0], "big"), &json!(true));
}

#[test]
fn clean_resolves_overlaps_in_favour_of_earlier_features() {
    let input = collection(vec![
        feature(rect(0.0, 0.0, 2.0, 2.0), json!({ "i": 0 })),
        feature(rect(1.0, 0.0, 3.0, 2.0), json!({ "i": 1 })),
    ]);
    let fc = clean(&input, &CleanOptions::default()).unwrap();
    assert_eq!(fc.len(), 2);
    assert!(close(area(fc.features[0].geometry.as_ref()), 4.0, 1e-9));
    assert!(close(area(fc.features[1].geometry.as_ref()), 2.0, 1e-9));
}

#[test]
fn mosaic_counts_covering_sources() {
    let input = collection(vec![
        feature(rect(0.0, 0.0, 2.0, 2.0), json!({})),
        feature(rect(1.0, 0.0, 3.0, 2.0), json!({})),
    ]);
    let fc = mosaic(&input, &PassThroughOptions::default()).unwrap();
    assert_eq!(fc.len(), 3);
    assert!(close(total_area(&fc), 6.0, 1e-9));
    let double: Vec<_> = fc
        .features
        .iter()
        .filter(|f| prop(f, "n_sources") == &json!(2))
        .collect();
    assert_eq!(double.len(), 1);
    assert!(close(area(double[0].geometry.as_ref()), 2.0, 1e-9));
}

#[test]
fn inlay_cuts_source_into_target() {
    let target = collection(vec![feature(rect(0.0, 0.0, 4.0, 4.0), json!({ "layer": "base" }))]);
    let source = collection(vec![feature(rect(1.0, 1.0, 2.0, 2.0), json!({ "layer": "inlay" }))]);
    let fc = inlay(&target, &source, &PassThroughOptions::default()).unwrap();
    assert_eq!(fc.len(), 2);
    assert!(close(area(fc.features[0].geometry.as_ref()), 15.0, 1e-9));
    assert_eq!(prop(&fc.features[1], "layer"), &json!("inlay"));
    assert!(close(total_area(&fc), 16.0, 1e-9));
}

#[test]
fn divide_splits_lines_at_polygon_boundaries() {
    let road = collection(vec![feature(
        json!({ "type": "LineString", "coordinates": [[0, 0.5], [4, 0.5]] }),
        json!({ "road": "main" }),
    )]);
    let zones = collection(vec![feature(rect(1.0, 0.0, 2.0, 1.0), json!({ "zone": "z1" }))]);
    let fc = divide(&road, &zones, &PassThroughOptions::default()).unwrap();
    assert!(fc.len() >= 2);
    let inside: Vec<_> = fc
        .features
        .iter()
        .filter(|f| prop(f, "zone") == &json!("z1"))
        .collect();
    assert_eq!(inside.len(), 1);
    assert_eq!(prop(inside[0], "road"), &json!("main"));
}
