#![forbid(unsafe_code)]

//! Evaluate JSON-described column expressions against a table, with ordered
//! row filters and single-key group aggregation, and shape the results for
//! plotting.
//!
//! ```
//! use plotexpr::{DataFrame, ExpressionParser, Scalar};
//! use serde_json::json;
//!
//! let table = DataFrame::from_dict(
//!     &["time", "param2"],
//!     vec![
//!         ("time", (0..4).map(Scalar::Int64).collect()),
//!         ("param2", (1..=4).map(Scalar::Int64).collect()),
//!     ],
//! )
//! .unwrap();
//!
//! let parser = ExpressionParser::new(&table);
//! let out = parser
//!     .evaluate(&json!({"select": {"op": "+", "left": "param2", "right": 1}}))
//!     .unwrap();
//! assert_eq!(out.as_series().unwrap().values()[0], Scalar::Int64(2));
//! ```

pub use px_columnar::{ArithmeticOp, Column, ColumnError, ComparisonOp};
pub use px_config::{
    ConfigValidationError, PlotForm, is_constant_expression, plot_entries, validate_config,
    validate_plot_config,
};
pub use px_expr::{
    BINARY_OPERATORS, Expr, ExprError, ExprValue, binary_operator, build_expr, evaluate,
    supported_binary_operators,
};
pub use px_filter::{
    FILTER_OPERATORS, FilterCondition, FilterError, apply_filters, comparison_operator,
    filters_from_json, supported_filter_operators,
};
pub use px_frame::{DataFrame, FrameError, Series};
pub use px_groupby::{
    AGGREGATIONS, AggFunc, AggregationSpec, GroupByError, GroupByOptions, aggregation,
    apply_aggregation, apply_aggregation_with_options, supported_aggregations,
};
pub use px_index::{Index, IndexError, IndexLabel};
pub use px_types::{DType, NullKind, Scalar, TypeError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigValidationError),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("cannot aggregate a scalar result")]
    ScalarAggregation,
    #[error("{0} evaluated to a scalar; a plot needs one value per row")]
    ScalarPlot(String),
}

/// One plottable pair of series with axis labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub x: Series,
    pub y: Series,
    pub x_label: String,
    pub y_label: String,
    pub title: Option<String>,
}

impl PlotSeries {
    /// `(x, y)` pairs by position.
    pub fn points(&self) -> impl Iterator<Item = (&Scalar, &Scalar)> {
        self.x.values().iter().zip(self.y.values())
    }
}

/// Runs configs against a private copy of a table.
#[derive(Debug, Clone)]
pub struct ExpressionParser {
    frame: DataFrame,
}

impl ExpressionParser {
    /// Takes a copy; later changes to `frame` are not seen by this parser.
    #[must_use]
    pub fn new(frame: &DataFrame) -> Self {
        Self {
            frame: frame.clone(),
        }
    }

    #[must_use]
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// validate, filter, build, evaluate, aggregate.
    pub fn evaluate(&self, config: &Value) -> Result<ExprValue, ParserError> {
        validate_config(config, self.frame.column_names())?;
        self.run(config)
    }

    /// Evaluate a plot config: either `{select, ...}` against the row
    /// position, or `{"x-values", "y-values", "filter"?}`.
    pub fn evaluate_plot(&self, config: &Value) -> Result<PlotSeries, ParserError> {
        validate_plot_config(config, self.frame.column_names())?;

        let form = PlotForm::classify(config).ok_or_else(|| {
            ConfigValidationError::single(
                "config must have either 'select' or both 'x-values' and 'y-values'",
            )
        })?;

        match form {
            PlotForm::Single(config) => {
                let y = into_series(self.run(config)?, "select")?;
                // Typed up front so a fully filtered table still yields Int64.
                let positions = (0_i64..).take(y.len()).map(Scalar::Int64).collect();
                let positions = Column::new(DType::Int64, positions).map_err(FrameError::from)?;
                let x = Series::new("index", Index::range(y.len()), positions)?;
                Ok(PlotSeries {
                    x,
                    y,
                    x_label: "index".to_owned(),
                    y_label: label(config, "value"),
                    title: None,
                })
            }
            PlotForm::Axes { x, y } => {
                let scoped = match config.get("filter") {
                    Some(filters) => Self {
                        frame: apply_filters(&self.frame, &filters_from_json(filters)?)?,
                    },
                    None => self.clone(),
                };

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    rows_in = self.frame.len(),
                    rows_out = scoped.frame.len(),
                    "scoped plot table"
                );

                Ok(PlotSeries {
                    x: into_series(scoped.run(x)?, "x-values")?,
                    y: into_series(scoped.run(y)?, "y-values")?,
                    x_label: label(x, "x-values"),
                    y_label: label(y, "y-values"),
                    title: config.get("title").and_then(Value::as_str).map(str::to_owned),
                })
            }
        }
    }

    // Everything past validation. Lookups that validation guarantees are
    // still surfaced as errors rather than assumed.
    fn run(&self, config: &Value) -> Result<ExprValue, ParserError> {
        let filtered;
        let frame = match config.get("filter") {
            Some(filters) => {
                filtered = apply_filters(&self.frame, &filters_from_json(filters)?)?;
                &filtered
            }
            None => &self.frame,
        };

        let expr = build_expr(&config["select"])?;
        let value = evaluate(&expr, frame)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            %expr,
            rows = frame.len(),
            filtered = config.get("filter").is_some(),
            "evaluated select"
        );

        let Some(aggregate) = config.get("aggregate") else {
            return Ok(value);
        };
        let group_by = config["group_by"]
            .as_str()
            .ok_or_else(|| ConfigValidationError::single("aggregation requires 'group_by'"))?;
        let spec = AggregationSpec::from_json(aggregate)?;

        match value {
            ExprValue::Column(series) => Ok(ExprValue::Column(apply_aggregation(
                frame, &series, group_by, &spec,
            )?)),
            ExprValue::Scalar(_) => Err(ParserError::ScalarAggregation),
        }
    }
}

fn into_series(value: ExprValue, side: &str) -> Result<Series, ParserError> {
    match value {
        ExprValue::Column(series) => Ok(series),
        ExprValue::Scalar(_) => Err(ParserError::ScalarPlot(side.to_owned())),
    }
}

fn label(config: &Value, default: &str) -> String {
    config
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_owned()
}
