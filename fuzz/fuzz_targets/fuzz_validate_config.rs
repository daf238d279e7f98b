#![no_main]

use libfuzzer_sys::fuzz_target;
use plotexpr::{
    DataFrame, ExprError, ExpressionParser, FilterError, GroupByError, ParserError, Scalar,
    validate_config,
};

fn table() -> DataFrame {
    DataFrame::from_dict(
        &["time", "param1", "param2", "param3"],
        vec![
            ("time", (0..10).map(Scalar::Int64).collect()),
            ("param1", (0..10).map(|v| Scalar::Int64(v % 3)).collect()),
            ("param2", (1..=10).map(Scalar::Int64).collect()),
            (
                "param3",
                (1..=10_i32)
                    .map(|v| Scalar::Float64(f64::from(v) / 10.0))
                    .collect(),
            ),
        ],
    )
    .expect("fuzz table")
}

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let frame = table();
    if validate_config(&config, frame.column_names()).is_err() {
        return;
    }

    // Anything the validator accepts must not hit a registry or shape error later.
    match ExpressionParser::new(&frame).evaluate(&config) {
        Err(ParserError::Expr(
            ExprError::UnsupportedOperator(_) | ExprError::InvalidExpressionFormat(_),
        ))
        | Err(ParserError::Filter(
            FilterError::UnsupportedOperator(_)
            | FilterError::UnknownColumn(_)
            | FilterError::MalformedCondition(_),
        ))
        | Err(ParserError::GroupBy(
            GroupByError::UnsupportedAggregation(_)
            | GroupByError::UnknownColumn(_)
            | GroupByError::MalformedSpec(_),
        ))
        | Err(ParserError::Config(_))
        | Err(ParserError::ScalarAggregation) => {
            panic!("validated config failed after validation: {config}");
        }
        _ => {}
    }
});
