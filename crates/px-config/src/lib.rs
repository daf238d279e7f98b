#![forbid(unsafe_code)]

//! Static checks for evaluation and plot configs.
//!
//! Every rule reachable from the given shape is checked and all violations
//! are reported together, so a config that passes here runs through the
//! filter, build, evaluate and aggregate stages without schema or operator
//! errors.

use px_expr::{binary_operator, json_kind, supported_binary_operators};
use px_filter::{comparison_operator, supported_filter_operators};
use px_groupby::{aggregation, supported_aggregations};
use serde_json::{Map, Value};
use thiserror::Error;

/// Keys a single evaluation config may carry.
pub const CONFIG_KEYS: &[&str] = &["select", "filter", "group_by", "aggregate", "name"];

/// Keys of the two-sided plot form. `title` is a rendering hint.
pub const AXIS_PLOT_KEYS: &[&str] = &["x-values", "y-values", "filter", "title"];

const FILTER_KEYS: &[&str] = &["column", "op", "value"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.join("; "))]
pub struct ConfigValidationError {
    pub issues: Vec<String>,
}

impl ConfigValidationError {
    #[must_use]
    pub fn single(issue: impl Into<String>) -> Self {
        Self {
            issues: vec![issue.into()],
        }
    }
}

/// The two accepted top-level plot shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlotForm<'a> {
    /// `{select, ...}`: one series against the implicit row position.
    Single(&'a Value),
    /// `{"x-values": {...}, "y-values": {...}, "filter"?: [...], "title"?: "..."}`.
    Axes { x: &'a Value, y: &'a Value },
}

impl<'a> PlotForm<'a> {
    #[must_use]
    pub fn classify(config: &'a Value) -> Option<Self> {
        let fields = config.as_object()?;
        if fields.contains_key("select") {
            return Some(Self::Single(config));
        }
        match (fields.get("x-values"), fields.get("y-values")) {
            (Some(x), Some(y)) => Some(Self::Axes { x, y }),
            _ => None,
        }
    }
}

pub fn validate_config(config: &Value, columns: &[String]) -> Result<(), ConfigValidationError> {
    let mut validator = Validator::new(columns);
    validator.config("", config);
    validator.finish()
}

pub fn validate_plot_config(
    config: &Value,
    columns: &[String],
) -> Result<(), ConfigValidationError> {
    let mut validator = Validator::new(columns);
    validator.plot_config(config);
    validator.finish()
}

/// Split a plot document into its plot configs: either `{"plots": [...]}` or
/// a single config at the top level.
pub fn plot_entries(document: &Value) -> Result<Vec<&Value>, ConfigValidationError> {
    let Some(fields) = document.as_object() else {
        return Err(ConfigValidationError::single(format!(
            "plot document must be an object, found {}",
            json_kind(document)
        )));
    };
    let Some(plots) = fields.get("plots") else {
        return Ok(vec![document]);
    };

    let mut issues = Vec::new();
    let extra = unknown_keys(fields, &["plots"]);
    if !extra.is_empty() {
        issues.push(format!(
            "plot document with 'plots' has unknown keys: {}",
            extra.join(", ")
        ));
    }
    match plots {
        Value::Array(entries) if entries.is_empty() => {
            issues.push("'plots' cannot be empty".to_owned());
        }
        Value::Array(entries) if issues.is_empty() => return Ok(entries.iter().collect()),
        Value::Array(_) => {}
        other => issues.push(format!("'plots' must be a list, found {}", json_kind(other))),
    }
    Err(ConfigValidationError { issues })
}

/// True when the expression references no column anywhere in its tree.
#[must_use]
pub fn is_constant_expression(expr: &Value) -> bool {
    match expr {
        Value::String(_) => false,
        Value::Object(fields) => ["left", "right"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .all(is_constant_expression),
        _ => true,
    }
}

struct Validator<'a> {
    columns: &'a [String],
    issues: Vec<String>,
}

impl<'a> Validator<'a> {
    fn new(columns: &'a [String]) -> Self {
        Self {
            columns,
            issues: Vec::new(),
        }
    }

    fn finish(self) -> Result<(), ConfigValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError {
                issues: self.issues,
            })
        }
    }

    fn push(&mut self, context: &str, issue: impl AsRef<str>) {
        if context.is_empty() {
            self.issues.push(issue.as_ref().to_owned());
        } else {
            self.issues.push(format!("{context}: {}", issue.as_ref()));
        }
    }

    fn known(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn config(&mut self, context: &str, config: &Value) {
        let Some(fields) = config.as_object() else {
            self.push(
                context,
                format!("config must be an object, found {}", json_kind(config)),
            );
            return;
        };
        if fields.is_empty() {
            self.push(context, "config cannot be empty");
            return;
        }

        match fields.get("select") {
            Some(select) => {
                self.expression(context, select);
                if fields.contains_key("aggregate") && is_constant_expression(select) {
                    self.push(
                        context,
                        "cannot aggregate a constant 'select'; reference at least one column",
                    );
                }
            }
            None => self.push(context, "config must contain 'select'"),
        }

        if let Some(filters) = fields.get("filter") {
            self.filters(context, filters);
        }

        match (fields.get("group_by"), fields.get("aggregate")) {
            (Some(group_by), Some(aggregate)) => {
                self.group_by(context, group_by);
                self.aggregation(context, aggregate);
            }
            (None, Some(_)) => self.push(context, "aggregation requires 'group_by'"),
            (Some(_), None) => self.push(context, "'group_by' specified but no 'aggregate' provided"),
            (None, None) => {}
        }

        if let Some(name) = fields.get("name") {
            if !name.is_string() {
                self.push(
                    context,
                    format!("'name' must be a string, found {}", json_kind(name)),
                );
            }
        }

        let extra = unknown_keys(fields, CONFIG_KEYS);
        if !extra.is_empty() {
            self.push(context, format!("unknown config keys: {}", extra.join(", ")));
        }
    }

    fn plot_config(&mut self, config: &Value) {
        match PlotForm::classify(config) {
            Some(PlotForm::Single(config)) => {
                if config.get("select").is_some_and(is_constant_expression) {
                    self.push(
                        "",
                        "plotting a constant is not meaningful; use a column reference or an expression over columns",
                    );
                }
                self.config("", config);
            }
            Some(PlotForm::Axes { x, y }) => {
                for (side, config) in [("x-values", x), ("y-values", y)] {
                    if !config.is_object() {
                        self.push(
                            side,
                            format!("must be an object, found {}", json_kind(config)),
                        );
                        continue;
                    }
                    if config.get("select").is_some_and(is_constant_expression) {
                        self.push(side, "cannot be a constant expression");
                    }
                    self.config(side, config);
                }
                if let Some(fields) = config.as_object() {
                    if let Some(filters) = fields.get("filter") {
                        self.filters("", filters);
                    }
                    if let Some(title) = fields.get("title") {
                        if !title.is_string() {
                            self.push(
                                "",
                                format!("'title' must be a string, found {}", json_kind(title)),
                            );
                        }
                    }
                    let extra = unknown_keys(fields, AXIS_PLOT_KEYS);
                    if !extra.is_empty() {
                        self.push("", format!("unknown plot keys: {}", extra.join(", ")));
                    }
                }
            }
            None if !config.is_object() => self.push(
                "",
                format!("plot config must be an object, found {}", json_kind(config)),
            ),
            None => self.push(
                "",
                "config must have either 'select' or both 'x-values' and 'y-values'",
            ),
        }
    }

    fn expression(&mut self, context: &str, expr: &Value) {
        match expr {
            Value::String(name) => {
                if !self.known(name) {
                    self.push(context, format!("column '{name}' not found in table"));
                }
            }
            Value::Number(_) => {}
            Value::Object(fields) => {
                match fields.get("op") {
                    Some(Value::String(op)) if binary_operator(op).is_some() => {}
                    Some(op) => self.push(
                        context,
                        format!(
                            "unsupported operator {op}; supported operators: {:?}",
                            supported_binary_operators()
                        ),
                    ),
                    None => self.push(context, "expression object must contain 'op'"),
                }
                for side in ["left", "right"] {
                    match fields.get(side) {
                        Some(operand) => self.expression(context, operand),
                        None => self.push(
                            context,
                            format!("binary operation must have '{side}'"),
                        ),
                    }
                }
            }
            other => self.push(
                context,
                format!("invalid expression type: {}", json_kind(other)),
            ),
        }
    }

    fn filters(&mut self, context: &str, filters: &Value) {
        let Some(entries) = filters.as_array() else {
            self.push(
                context,
                format!("filters must be a list, found {}", json_kind(filters)),
            );
            return;
        };
        if entries.is_empty() {
            self.push(context, "filter list cannot be empty");
        }

        for (idx, entry) in entries.iter().enumerate() {
            let Some(fields) = entry.as_object() else {
                self.push(
                    context,
                    format!("filter at index {idx} must be an object, found {}", json_kind(entry)),
                );
                continue;
            };

            let missing = FILTER_KEYS
                .iter()
                .filter(|key| !fields.contains_key(**key))
                .copied()
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                self.push(
                    context,
                    format!("filter at index {idx} is missing keys: {}", missing.join(", ")),
                );
            }
            let extra = unknown_keys(fields, FILTER_KEYS);
            if !extra.is_empty() {
                self.push(
                    context,
                    format!("filter at index {idx} has unknown keys: {}", extra.join(", ")),
                );
            }

            match fields.get("column") {
                Some(Value::String(column)) if !self.known(column) => self.push(
                    context,
                    format!("filter column '{column}' not found in table"),
                ),
                Some(Value::String(_)) | None => {}
                Some(other) => self.push(
                    context,
                    format!(
                        "filter at index {idx}: 'column' must be a string, found {}",
                        json_kind(other)
                    ),
                ),
            }

            match fields.get("op") {
                Some(Value::String(op)) if comparison_operator(op).is_some() => {}
                Some(op) => self.push(
                    context,
                    format!(
                        "unsupported filter operator {op}; supported operators: {:?}",
                        supported_filter_operators()
                    ),
                ),
                None => {}
            }

            match fields.get("value") {
                Some(Value::Number(_) | Value::String(_)) | None => {}
                Some(other) => self.push(
                    context,
                    format!(
                        "filter value must be a number or string, found {}",
                        json_kind(other)
                    ),
                ),
            }
        }
    }

    fn group_by(&mut self, context: &str, group_by: &Value) {
        match group_by {
            Value::String(column) if !self.known(column) => self.push(
                context,
                format!("group_by column '{column}' not found in table"),
            ),
            Value::String(_) => {}
            other => self.push(
                context,
                format!("'group_by' must be a column name, found {}", json_kind(other)),
            ),
        }
    }

    fn aggregation(&mut self, context: &str, aggregate: &Value) {
        let Some(fields) = aggregate.as_object() else {
            self.push(
                context,
                format!("aggregation must be an object, found {}", json_kind(aggregate)),
            );
            return;
        };
        match fields.get("func") {
            Some(Value::String(func)) if aggregation(func).is_some() => {}
            Some(func) => self.push(
                context,
                format!(
                    "unsupported aggregation function {func}; supported functions: {:?}",
                    supported_aggregations()
                ),
            ),
            None => self.push(context, "aggregation must contain 'func'"),
        }
    }
}

fn unknown_keys<'m>(fields: &'m Map<String, Value>, allowed: &[&str]) -> Vec<&'m str> {
    let mut extra = fields
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect::<Vec<_>>();
    extra.sort_unstable();
    extra
}
