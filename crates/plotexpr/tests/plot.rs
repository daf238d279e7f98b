mod common;

use common::sample_frame;
use plotexpr::{DType, ExpressionParser, IndexLabel, ParserError, Scalar, plot_entries};
use serde_json::json;

#[test]
fn single_select_plots_against_row_position() {
    let parser = ExpressionParser::new(&sample_frame());
    let plot = parser
        .evaluate_plot(&json!({
            "select": "param2",
            "filter": [{"column": "time", "op": ">", "value": 5}]
        }))
        .expect("plot");

    assert_eq!(plot.x_label, "index");
    assert_eq!(plot.y_label, "value");
    assert_eq!(plot.x.name(), "index");
    assert_eq!(
        plot.x.values(),
        &[
            Scalar::Int64(0),
            Scalar::Int64(1),
            Scalar::Int64(2),
            Scalar::Int64(3)
        ]
    );
    assert_eq!(
        plot.y.index().labels(),
        &[
            IndexLabel::Int64(6),
            IndexLabel::Int64(7),
            IndexLabel::Int64(8),
            IndexLabel::Int64(9)
        ]
    );
    assert_eq!(
        plot.points().last(),
        Some((&Scalar::Int64(3), &Scalar::Int64(10)))
    );
}

#[test]
fn fully_filtered_plot_keeps_an_int_position_axis() {
    let parser = ExpressionParser::new(&sample_frame());
    let plot = parser
        .evaluate_plot(&json!({
            "select": "param2",
            "filter": [{"column": "time", "op": ">", "value": 100}]
        }))
        .expect("plot");

    assert!(plot.x.is_empty());
    assert!(plot.y.is_empty());
    assert_eq!(plot.x.dtype(), DType::Int64);
    assert_eq!(plot.y.dtype(), DType::Int64);
}

#[test]
fn name_overrides_the_value_label() {
    let parser = ExpressionParser::new(&sample_frame());
    let plot = parser
        .evaluate_plot(&json!({
            "select": {"op": "-", "left": "param2", "right": "param3"},
            "name": "p2 - p3"
        }))
        .expect("plot");
    assert_eq!(plot.y_label, "p2 - p3");
    assert_eq!(plot.y.len(), 10);
}

#[test]
fn axes_form_evaluates_each_side_on_the_filtered_table() {
    let parser = ExpressionParser::new(&sample_frame());
    let plot = parser
        .evaluate_plot(&json!({
            "x-values": {"select": "time", "name": "t"},
            "y-values": {"select": {"op": "+", "left": "param2", "right": "param3"}},
            "filter": [{"column": "param1", "op": "==", "value": 2}],
            "title": "group 2"
        }))
        .expect("plot");

    assert_eq!(plot.title.as_deref(), Some("group 2"));
    assert_eq!(plot.x_label, "t");
    assert_eq!(plot.y_label, "y-values");
    assert_eq!(
        plot.x.values(),
        &[Scalar::Int64(4), Scalar::Int64(5), Scalar::Int64(8)]
    );
    assert_eq!(plot.y.values().len(), 3);
    assert_eq!(plot.y.values()[2], Scalar::Float64(9.0 + 0.9));
}

#[test]
fn axes_sides_may_aggregate_independently() {
    let parser = ExpressionParser::new(&sample_frame());
    let grouped = |select: &str| {
        json!({
            "select": select,
            "group_by": "param1",
            "aggregate": {"func": "sum"}
        })
    };
    let plot = parser
        .evaluate_plot(&json!({
            "x-values": grouped("param1"),
            "y-values": grouped("param2"),
        }))
        .expect("plot");

    assert_eq!(
        plot.x.values(),
        &[Scalar::Int64(0), Scalar::Int64(3), Scalar::Int64(6)]
    );
    assert_eq!(
        plot.y.values(),
        &[Scalar::Int64(20), Scalar::Int64(15), Scalar::Int64(20)]
    );
}

#[test]
fn constant_selects_cannot_be_plotted() {
    let parser = ExpressionParser::new(&sample_frame());
    for config in [
        json!({"select": 42}),
        json!({"x-values": {"select": "time"}, "y-values": {"select": 3.5}}),
    ] {
        let err = parser.evaluate_plot(&config).expect_err("must fail");
        assert!(matches!(err, ParserError::Config(_)), "{config}: {err}");
    }
}

#[test]
fn unrecognized_plot_shape_is_rejected() {
    let parser = ExpressionParser::new(&sample_frame());
    let err = parser
        .evaluate_plot(&json!({"y-values": {"select": "param2"}}))
        .expect_err("must fail");
    assert!(matches!(err, ParserError::Config(_)));
}

#[test]
fn plot_documents_evaluate_every_entry() {
    let parser = ExpressionParser::new(&sample_frame());
    let document = json!({
        "plots": [
            {"select": "param3", "name": "p3"},
            {"x-values": {"select": "time"}, "y-values": {"select": "param2"}}
        ]
    });

    let plots = plot_entries(&document)
        .expect("entries")
        .into_iter()
        .map(|config| parser.evaluate_plot(config))
        .collect::<Result<Vec<_>, _>>()
        .expect("plots");
    assert_eq!(plots.len(), 2);
    assert_eq!(plots[0].y_label, "p3");
    assert_eq!(plots[1].x_label, "x-values");
}

#[test]
fn plot_series_serializes_with_labels() {
    let parser = ExpressionParser::new(&sample_frame());
    let plot = parser
        .evaluate_plot(&json!({
            "select": "param2",
            "filter": [{"column": "time", "op": "==", "value": 0}]
        }))
        .expect("plot");

    let encoded = serde_json::to_value(&plot).expect("serialize");
    assert_eq!(encoded["x_label"], "index");
    assert_eq!(encoded["y_label"], "value");
    assert_eq!(encoded["y"]["name"], "param2");
}
