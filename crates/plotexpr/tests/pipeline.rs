mod common;

use common::sample_frame;
use plotexpr::{
    ColumnError, DType, Expr, ExprError, ExprValue, ExpressionParser, FilterError, IndexLabel,
    ParserError, Scalar, TypeError, build_expr, evaluate,
};
use proptest::prelude::*;
use serde_json::{Value, json};

fn int_labels(values: &[i64]) -> Vec<IndexLabel> {
    values.iter().copied().map(IndexLabel::Int64).collect()
}

fn ints(values: &[i64]) -> Vec<Scalar> {
    values.iter().copied().map(Scalar::Int64).collect()
}

fn column(value: ExprValue) -> plotexpr::Series {
    match value {
        ExprValue::Column(series) => series,
        ExprValue::Scalar(scalar) => panic!("expected a column, got scalar {scalar}"),
    }
}

#[test]
fn column_reference_returns_the_column_unchanged() {
    let frame = sample_frame();
    let parser = ExpressionParser::new(&frame);

    let out = column(parser.evaluate(&json!({"select": "param2"})).expect("evaluate"));
    assert_eq!(out.name(), "param2");
    assert_eq!(out.index(), frame.index());
    assert_eq!(out.column(), frame.column("param2").expect("param2"));
}

#[test]
fn literal_select_is_a_scalar() {
    let parser = ExpressionParser::new(&sample_frame());
    let out = parser.evaluate(&json!({"select": 42})).expect("evaluate");
    assert_eq!(out, ExprValue::Scalar(Scalar::Int64(42)));

    let out = parser
        .evaluate(&json!({"select": {"op": "-", "left": 1.5, "right": 1}}))
        .expect("evaluate");
    assert_eq!(out, ExprValue::Scalar(Scalar::Float64(0.5)));
}

#[test]
fn column_arithmetic_is_elementwise() {
    let parser = ExpressionParser::new(&sample_frame());

    let sum = column(
        parser
            .evaluate(&json!({"select": {"op": "+", "left": "time", "right": "param2"}}))
            .expect("sum"),
    );
    assert_eq!(sum.name(), "time + param2");
    assert_eq!(sum.values(), ints(&[1, 3, 5, 7, 9, 11, 13, 15, 17, 19]).as_slice());

    let diff = column(
        parser
            .evaluate(&json!({"select": {"op": "-", "left": "param2", "right": "time"}}))
            .expect("diff"),
    );
    assert!(diff.values().iter().all(|v| *v == Scalar::Int64(1)));
}

#[test]
fn scalars_broadcast_over_rows() {
    let parser = ExpressionParser::new(&sample_frame());

    let shifted = column(
        parser
            .evaluate(&json!({"select": {"op": "+", "left": "param2", "right": 100}}))
            .expect("evaluate"),
    );
    assert_eq!(shifted.len(), 10);
    assert_eq!(shifted.values()[0], Scalar::Int64(101));

    let flipped = column(
        parser
            .evaluate(&json!({"select": {"op": "-", "left": 0, "right": "param3"}}))
            .expect("evaluate"),
    );
    assert_eq!(flipped.dtype(), DType::Float64);
    assert_eq!(flipped.values()[9], Scalar::Float64(-1.0));
}

#[test]
fn filter_keeps_original_row_identity() {
    let parser = ExpressionParser::new(&sample_frame());
    let out = column(
        parser
            .evaluate(&json!({
                "select": "param2",
                "filter": [{"column": "time", "op": ">", "value": 5}]
            }))
            .expect("evaluate"),
    );

    assert_eq!(out.values(), ints(&[7, 8, 9, 10]).as_slice());
    assert_eq!(out.index().labels(), int_labels(&[6, 7, 8, 9]).as_slice());
}

#[test]
fn mean_by_group_matches_manual_reduction() {
    let parser = ExpressionParser::new(&sample_frame());
    let out = column(
        parser
            .evaluate(&json!({
                "select": "param2",
                "group_by": "param1",
                "aggregate": {"func": "mean"}
            }))
            .expect("evaluate"),
    );

    assert_eq!(out.index().labels(), int_labels(&[0, 1, 2]).as_slice());
    assert_eq!(
        out.values(),
        &[
            Scalar::Float64(20.0 / 4.0),
            Scalar::Float64(15.0 / 3.0),
            Scalar::Float64(20.0 / 3.0),
        ]
    );
}

#[test]
fn aggregation_sees_only_filtered_rows() {
    let parser = ExpressionParser::new(&sample_frame());
    let out = column(
        parser
            .evaluate(&json!({
                "select": {"op": "+", "left": "param2", "right": "param2"},
                "filter": [{"column": "time", "op": "<", "value": 4}],
                "group_by": "param1",
                "aggregate": {"func": "sum"}
            }))
            .expect("evaluate"),
    );

    // rows 0..3: param1 = [0, 0, 1, 1], param2 = [1, 2, 3, 4]
    assert_eq!(out.name(), "param2 + param2");
    assert_eq!(out.index().labels(), int_labels(&[0, 1]).as_slice());
    assert_eq!(out.values(), ints(&[6, 14]).as_slice());
}

#[test]
fn filtering_to_zero_rows_keeps_the_dtype() {
    let parser = ExpressionParser::new(&sample_frame());
    let out = column(
        parser
            .evaluate(&json!({
                "select": "param3",
                "filter": [{"column": "time", "op": ">", "value": 100}]
            }))
            .expect("evaluate"),
    );
    assert!(out.is_empty());
    assert_eq!(out.dtype(), DType::Float64);

    let grouped = column(
        parser
            .evaluate(&json!({
                "select": "param3",
                "filter": [{"column": "time", "op": ">", "value": 100}],
                "group_by": "param1",
                "aggregate": {"func": "sum"}
            }))
            .expect("evaluate"),
    );
    assert!(grouped.is_empty());
}

#[test]
fn group_by_and_aggregate_must_come_together() {
    let parser = ExpressionParser::new(&sample_frame());
    for config in [
        json!({"select": "param2", "group_by": "param1"}),
        json!({"select": "param2", "aggregate": {"func": "sum"}}),
    ] {
        let err = parser.evaluate(&config).expect_err("must fail");
        assert!(matches!(err, ParserError::Config(_)), "{config}: {err}");
    }
}

#[test]
fn unknown_column_is_a_config_error() {
    let parser = ExpressionParser::new(&sample_frame());
    let err = parser
        .evaluate(&json!({"select": {"op": "+", "left": "pressure", "right": 1}}))
        .expect_err("must fail");
    match err {
        ParserError::Config(err) => {
            assert_eq!(err.issues, vec!["column 'pressure' not found in table"]);
        }
        other => panic!("expected config error, got {other}"),
    }
}

#[test]
fn unsupported_binary_operator() {
    let select = json!({"op": "*", "left": "param2", "right": "param3"});

    let err = build_expr(&select).expect_err("builder must fail");
    assert!(matches!(err, ExprError::UnsupportedOperator(op) if op == "*"));

    let parser = ExpressionParser::new(&sample_frame());
    let err = parser
        .evaluate(&json!({"select": select}))
        .expect_err("parser must fail");
    assert!(err.to_string().contains("unsupported operator \"*\""));
}

#[test]
fn function_nodes_are_not_implemented() {
    let expr = Expr::function("abs", Expr::column("param2"));
    let err = evaluate(&expr, &sample_frame()).expect_err("must fail");
    assert!(matches!(err, ExprError::NotImplemented(name) if name == "abs"));
}

#[test]
fn filter_value_of_the_wrong_type_fails() {
    let frame = plotexpr::DataFrame::from_dict(
        &["station", "reading"],
        vec![
            ("station", vec![Scalar::from("a"), Scalar::from("b")]),
            ("reading", ints(&[1, 2])),
        ],
    )
    .expect("frame");
    let parser = ExpressionParser::new(&frame);

    let err = parser
        .evaluate(&json!({
            "select": "reading",
            "filter": [{"column": "station", "op": ">", "value": 3}]
        }))
        .expect_err("must fail");
    assert!(matches!(
        err,
        ParserError::Filter(FilterError::Column(ColumnError::Type(
            TypeError::IncomparableDtypes { .. }
        )))
    ));

    let out = column(
        parser
            .evaluate(&json!({
                "select": "reading",
                "filter": [{"column": "station", "op": "==", "value": "b"}]
            }))
            .expect("evaluate"),
    );
    assert_eq!(out.values(), ints(&[2]).as_slice());
}

#[test]
fn parser_keeps_its_own_copy() {
    let mut frame = sample_frame();
    let parser = ExpressionParser::new(&frame);
    frame = frame.filter_by_mask(&[false; 10]).expect("narrow");

    assert!(frame.is_empty());
    assert_eq!(parser.frame().len(), 10);
}

fn config_strategy() -> impl Strategy<Value = Value> {
    let operand = prop_oneof![
        prop::sample::select(vec!["time", "param1", "param2", "param3", "pressure"])
            .prop_map(|name| json!(name)),
        (-5_i64..5).prop_map(|n| json!(n)),
    ];
    let select = prop_oneof![
        operand.clone(),
        (prop::sample::select(vec!["+", "-", "*"]), operand.clone(), operand)
            .prop_map(|(op, left, right)| json!({"op": op, "left": left, "right": right})),
    ];
    let filter = (
        prop::sample::select(vec!["time", "param1", "nope"]),
        prop::sample::select(vec![">", "<", "==", "!="]),
        0_i64..10,
    )
        .prop_map(|(column, op, value)| json!([{"column": column, "op": op, "value": value}]));
    let aggregate = prop::sample::select(vec!["mean", "sum", "median"]);

    (
        select,
        prop::option::of(filter),
        prop::option::of(prop::sample::select(vec!["param1", "time", "nope"])),
        prop::option::of(aggregate),
    )
        .prop_map(|(select, filter, group_by, func)| {
            let mut config = json!({"select": select});
            if let Some(filter) = filter {
                config["filter"] = filter;
            }
            if let Some(group_by) = group_by {
                config["group_by"] = json!(group_by);
            }
            if let Some(func) = func {
                config["aggregate"] = json!({"func": func});
            }
            config
        })
}

proptest! {
    #[test]
    fn validated_configs_run_to_completion(config in config_strategy()) {
        let parser = ExpressionParser::new(&sample_frame());
        match parser.evaluate(&config) {
            Ok(_) => {}
            Err(ParserError::Config(_)) => {
                let columns = parser.frame().column_names();
                prop_assert!(plotexpr::validate_config(&config, columns).is_err());
            }
            Err(other) => prop_assert!(false, "validated config failed later: {config}: {other}"),
        }
    }

    #[test]
    fn chained_filters_equal_combined_predicate(threshold in 0_i64..10, key in 0_i64..3) {
        let parser = ExpressionParser::new(&sample_frame());
        let out = column(
            parser
                .evaluate(&json!({
                    "select": "param2",
                    "filter": [
                        {"column": "time", "op": ">", "value": threshold},
                        {"column": "param1", "op": "==", "value": key}
                    ]
                }))
                .expect("evaluate"),
        );

        let param1 = [0, 0, 1, 1, 2, 2, 0, 1, 2, 0];
        let expected = (0..10_i64)
            .filter(|&time| time > threshold && param1[time as usize] == key)
            .map(IndexLabel::Int64)
            .collect::<Vec<_>>();
        prop_assert_eq!(out.index().labels(), expected.as_slice());
    }
}
