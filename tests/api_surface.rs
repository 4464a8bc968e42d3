mod util;
use util::*;

use serde_json::{Value, json};
use topo_shaper::prelude::*;
use topo_shaper::{
    BufferOptions, DissolveOptions, FilterOptions, GraticuleOptions, PointGridOptions,
    RectangleOptions, SplitOptions, buffer, dissolve, filter, graticule, info, point_grid,
    rectangle, split,
};

#[test]
fn invalid_inputs_fail_validation() {
    for bad in [
        Value::Null,
        json!({ "invalid": "object" }),
        json!({ "type": "Topology" }),
        json!({ "type": "Polygon", "coordinates": [[[0, 0], [1, 0]]] }),
        json!([1, 2, 3]),
    ] {
        assert!(
            matches!(dissolve(&bad, &DissolveOptions::default()), Err(ShaperError::Validation(_))),
            "{bad} was accepted"
        );
    }
}

#[test]
fn required_parameters_are_checked_before_import() {
    let pt = point(0.0, 0.0);
    assert_eq!(
        buffer(&pt, None, &BufferOptions::default()),
        Err(ShaperError::MissingParameter("distance"))
    );
    assert_eq!(
        filter(&pt, &FilterOptions::default()),
        Err(ShaperError::MissingParameter("expression"))
    );
    assert_eq!(
        point_grid(&PointGridOptions::default()),
        Err(ShaperError::MissingParameter("bbox"))
    );
}

#[test]
fn split_returns_one_collection_per_value() {
    let input = collection(vec![
        feature(point(0.0, 0.0), json!({ "k": "a" })),
        feature(point(1.0, 0.0), json!({ "k": "b" })),
        feature(point(2.0, 0.0), json!({ "k": "a" })),
    ]);
    let out = split(
        &input,
        &SplitOptions {
            field: Some("k".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(out.is_many());
    let parts = out.into_collections();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].len(), 2);
    assert_eq!(parts[1].len(), 1);
}

#[test]
fn split_into_one_layer_is_a_single_collection() {
    let input = collection(vec![feature(point(0.0, 0.0), json!({ "k": "a" }))]);
    let out = split(
        &input,
        &SplitOptions {
            field: Some("k".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(matches!(out, Output::One(ref fc) if fc.len() == 1));
}

#[test]
fn synthesized_layers() {
    let fc = rectangle(&RectangleOptions {
        bbox: Some([0.0, 0.0, 3.0, 2.0]),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(fc.len(), 1);
    assert!(close(total_area(&fc), 6.0, 1e-12));

    let fc = graticule(&GraticuleOptions {
        interval: 45.0,
        ..Default::default()
    })
    .unwrap();
    let meridians = fc
        .features
        .iter()
        .filter(|f| prop(f, "type") == &json!("meridian"))
        .count();
    assert_eq!(meridians, 9);

    let fc = point_grid(&PointGridOptions {
        bbox: Some([0.0, 0.0, 1.0, 1.0]),
        interval: Some(0.5),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(fc.len(), 9);
}

#[test]
fn info_summarizes_layers() {
    let input = adjacent_squares(json!({ "a": 1 }), json!({ "b": 2 }));
    let summary = info(&input).unwrap();
    assert_eq!(summary.arc_count, 3);
    assert_eq!(summary.layers.len(), 1);
    let layer = &summary.layers[0];
    assert_eq!(layer.feature_count, 2);
    assert_eq!(layer.bbox, Some([0.0, 0.0, 2.0, 1.0]));
    assert_eq!(layer.fields, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn api_instance_uses_its_export_settings() {
    let api = Api::new().with_export_options(ExportOptions {
        winding: Some(Winding::Cw),
        ..Default::default()
    });
    let fc = api
        .run(Command::Explode, &rect(0.0, 0.0, 1.0, 1.0), &OptionMap::new())
        .unwrap()
        .into_collection();
    let Some(Geometry::Polygon { coordinates }) = &fc.features[0].geometry else {
        panic!("expected a polygon");
    };
    let ring = &coordinates[0];
    let signed: f64 = ring
        .windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum();
    assert!(signed < 0.0);
}

#[test]
fn failed_calls_export_nothing() {
    // the dissolve error surfaces instead of a partial collection
    let input = adjacent_squares(json!({ "a": 1 }), json!({ "a": 2 }));
    let opts = DissolveOptions {
        fields: vec!["missing".into()],
        ..Default::default()
    };
    assert!(dissolve(&input, &opts).is_err());
}
