mod util;
use util::*;

use proptest::prelude::*;
use serde_json::{Value, json};
use topo_shaper::io::{ExportOptions, Geometry, ImportOptions, export_dataset, import_geojson};
use topo_shaper::prelude::*;

fn round_trip(input: &Value) -> FeatureCollection {
    let ds = import_geojson(input, &ImportOptions::default()).unwrap();
    ds.validate_invariants().unwrap();
    export_dataset(&ds, &ExportOptions::default())
}

#[test]
fn bare_geometry_becomes_one_feature() {
    let fc = round_trip(&rect(0.0, 0.0, 2.0, 3.0));
    assert_eq!(fc.len(), 1);
    assert!(close(area(fc.features[0].geometry.as_ref()), 6.0, 1e-12));
    assert!(fc.features[0].properties.is_empty());
}

#[test]
fn shared_edge_is_stored_once() {
    let input = adjacent_squares(json!({ "n": 1 }), json!({ "n": 2 }));
    let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
    // shared edge plus one outer arc per square
    assert_eq!(ds.arcs.len(), 3);
    let fc = export_dataset(&ds, &ExportOptions::default());
    assert_eq!(prop(&fc.features[1], "n"), &json!(2));
    assert!(close(total_area(&fc), 2.0, 1e-12));
}

#[test]
fn null_geometry_and_id_field_survive() {
    let input = collection(vec![
        json!({ "type": "Feature", "id": "a", "geometry": null, "properties": { "k": 1 } }),
        json!({ "type": "Feature", "id": "b", "geometry": point(1.0, 2.0), "properties": {} }),
    ]);
    let ds = import_geojson(
        &input,
        &ImportOptions {
            id_field: Some("fid".into()),
        },
    )
    .unwrap();
    let fc = export_dataset(
        &ds,
        &ExportOptions {
            id_field: Some("fid".into()),
            ..Default::default()
        },
    );
    assert_eq!(fc.features[0].geometry, None);
    assert_eq!(fc.features[0].id, Some(json!("a")));
    assert_eq!(prop(&fc.features[1], "fid"), &json!("b"));
    assert_eq!(
        fc.features[1].geometry,
        Some(Geometry::Point {
            coordinates: [1.0, 2.0]
        })
    );
}

#[test]
fn mixed_geometry_kinds_are_rejected() {
    let input = collection(vec![
        feature(point(0.0, 0.0), json!({})),
        feature(rect(0.0, 0.0, 1.0, 1.0), json!({})),
    ]);
    assert!(matches!(
        import_geojson(&input, &ImportOptions::default()),
        Err(ShaperError::Validation(_))
    ));
}

/// Exterior plus square hole of side 0.5 at `(hx, hy)`; exterior
/// counter-clockwise and hole clockwise unless `cw`.
fn holed_rect(x0: f64, x1: f64, h: f64, hx: f64, hy: f64, cw: bool) -> Vec<Vec<[f64; 2]>> {
    let mut exterior = vec![[x0, 0.0], [x1, 0.0], [x1, h], [x0, h], [x0, 0.0]];
    let mut hole = vec![[hx, hy], [hx, hy + 0.5], [hx + 0.5, hy + 0.5], [hx + 0.5, hy], [hx, hy]];
    if cw {
        exterior.reverse();
        hole.reverse();
    }
    vec![exterior, hole]
}

fn assert_rings_match(fc: &FeatureCollection, expected: &[Vec<Vec<[f64; 2]>>]) {
    assert_eq!(fc.len(), expected.len());
    for (f, rings) in fc.features.iter().zip(expected) {
        let got = polygon_rings(f.geometry.as_ref());
        assert_eq!(got.len(), rings.len());
        for (g, r) in got.iter().zip(rings) {
            assert!(same_ring(g, r, 1e-12), "ring {g:?} does not match {r:?}");
        }
    }
}

#[test]
fn holed_neighbours_keep_their_rings_in_either_winding() {
    for cw in [false, true] {
        let polys = vec![
            holed_rect(0.0, 4.0, 4.0, 1.0, 1.0, cw),
            holed_rect(4.0, 6.0, 4.0, 5.0, 2.0, cw),
        ];
        let input = collection(
            polys
                .iter()
                .map(|rings| feature(json!({ "type": "Polygon", "coordinates": rings }), json!({})))
                .collect(),
        );
        let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
        // two outer arcs, the shared edge, two holes
        assert_eq!(ds.arcs.len(), 5);
        assert_rings_match(&export_dataset(&ds, &ExportOptions::default()), &polys);
    }
}

#[test]
fn lines_through_a_reversed_shared_arc_keep_their_coordinates() {
    let forward = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 1.0]];
    let backward: Vec<[f64; 2]> = forward.iter().rev().copied().collect();
    let tail = vec![[5.0, 5.0], [6.0, 6.0]];
    let input = collection(vec![
        feature(json!({ "type": "LineString", "coordinates": forward }), json!({})),
        feature(
            json!({ "type": "MultiLineString", "coordinates": [backward, tail] }),
            json!({}),
        ),
    ]);
    let ds = import_geojson(&input, &ImportOptions::default()).unwrap();
    assert_eq!(ds.arcs.len(), 2);
    let paths = ds.layers[0].shapes[1].as_ref().unwrap().paths().unwrap();
    assert!(paths[0][0].is_reversed());

    let fc = export_dataset(&ds, &ExportOptions::default());
    assert_eq!(
        fc.features[0].geometry,
        Some(Geometry::LineString { coordinates: forward })
    );
    assert_eq!(
        fc.features[1].geometry,
        Some(Geometry::MultiLineString {
            coordinates: vec![backward, tail]
        })
    );
}

fn rect_strategy() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((0.5f64..5.0, 0.5f64..5.0, -100.0f64..100.0), 1..8)
}

proptest! {
    #[test]
    fn points_and_properties_round_trip(
        pts in prop::collection::vec((-180.0f64..180.0, -90.0f64..90.0, any::<i32>()), 0..20)
    ) {
        let input = collection(
            pts.iter()
                .map(|&(x, y, k)| feature(point(x, y), json!({ "k": k })))
                .collect(),
        );
        let fc = round_trip(&input);
        prop_assert_eq!(fc.len(), pts.len());
        for (f, &(x, y, k)) in fc.features.iter().zip(&pts) {
            prop_assert_eq!(positions(f.geometry.as_ref()), vec![[x, y]]);
            prop_assert_eq!(prop(f, "k"), &json!(k));
        }
    }

    #[test]
    fn disjoint_rectangles_keep_their_area(rects in rect_strategy()) {
        let input = collection(
            rects.iter()
                .enumerate()
                .map(|(i, &(w, h, y))| {
                    let x = i as f64 * 10.0;
                    feature(rect(x, y, x + w, y + h), json!({ "i": i }))
                })
                .collect(),
        );
        let fc = round_trip(&input);
        prop_assert_eq!(fc.len(), rects.len());
        for (f, &(w, h, _)) in fc.features.iter().zip(&rects) {
            prop_assert!(close(area(f.geometry.as_ref()), w * h, 1e-9));
        }
    }

    #[test]
    fn holed_row_round_trips_up_to_ring_rotation(
        cells in prop::collection::vec((2.0f64..5.0, 0.0f64..1.0, 0.0f64..1.0), 1..6),
        height in 2.0f64..5.0,
        cw in any::<bool>(),
    ) {
        let mut x0 = 0.0;
        let mut polys = Vec::new();
        for &(w, fx, fy) in &cells {
            let hx = x0 + 0.25 + fx * (w - 1.0);
            let hy = 0.25 + fy * (height - 1.0);
            polys.push(holed_rect(x0, x0 + w, height, hx, hy, cw));
            x0 += w;
        }
        let input = collection(
            polys
                .iter()
                .map(|rings| feature(json!({ "type": "Polygon", "coordinates": rings }), json!({})))
                .collect(),
        );
        let fc = round_trip(&input);
        prop_assert_eq!(fc.len(), polys.len());
        for (f, rings) in fc.features.iter().zip(&polys) {
            let got = polygon_rings(f.geometry.as_ref());
            prop_assert_eq!(got.len(), rings.len());
            for (g, r) in got.iter().zip(rings) {
                prop_assert!(same_ring(g, r, 1e-12));
            }
        }
    }
}
