#![forbid(unsafe_code)]

use std::path::PathBuf;

use plotexpr::{DataFrame, ExpressionParser, PlotSeries, Scalar, plot_entries};
use px_io::{TableShape, read_csv_path, read_plot_document, validate_table};
use serde_json::{Value, json};

const SYNTHETIC_ROWS: i64 = 50;

enum DataSource {
    Synthetic,
    Csv(PathBuf),
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Plain,
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut source = DataSource::Synthetic;
    let mut config_path: Option<PathBuf> = None;
    let mut shape = TableShape::default();
    let mut format = OutputFormat::Plain;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data" => {
                let value = args
                    .next()
                    .ok_or("--data requires synthetic or a CSV path")?;
                source = match value.as_str() {
                    "synthetic" => DataSource::Synthetic,
                    path => DataSource::Csv(PathBuf::from(path)),
                };
            }
            "--config" => {
                let value = args.next().ok_or("--config requires a JSON file path")?;
                config_path = Some(PathBuf::from(value));
            }
            "--required-columns" => {
                let value = args
                    .next()
                    .ok_or("--required-columns requires a count or 'any'")?;
                shape.required_columns = match value.as_str() {
                    "any" => None,
                    count => Some(
                        count
                            .parse()
                            .map_err(|_| format!("invalid column count: {count}"))?,
                    ),
                };
            }
            "--format" => {
                let value = args.next().ok_or("--format requires plain or json")?;
                format = match value.as_str() {
                    "plain" => OutputFormat::Plain,
                    "json" => OutputFormat::Json,
                    _ => return Err(format!("unsupported format: {value}").into()),
                };
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let frame = match &source {
        DataSource::Synthetic => synthetic_table()?,
        DataSource::Csv(path) => read_csv_path(path)?,
    };
    validate_table(&frame, shape)?;

    let document = match &config_path {
        Some(path) => read_plot_document(path)?,
        None => default_document(),
    };

    let parser = ExpressionParser::new(&frame);
    let plots = plot_entries(&document)?
        .into_iter()
        .map(|config| parser.evaluate_plot(config))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        OutputFormat::Plain => {
            println!(
                "table rows={} columns={}",
                frame.len(),
                frame.column_names().join(",")
            );
            for (idx, plot) in plots.iter().enumerate() {
                print_plot(idx, plot);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plots)?);
        }
    }

    Ok(())
}

/// Deterministic stand-in for random demo data: `time` 0..50 with three
/// parameters of different shapes.
fn synthetic_table() -> Result<DataFrame, plotexpr::FrameError> {
    DataFrame::from_dict(
        &["time", "param1", "param2", "param3"],
        vec![
            ("time", (0..SYNTHETIC_ROWS).map(Scalar::Int64).collect()),
            (
                "param1",
                (0..SYNTHETIC_ROWS)
                    .map(|t| Scalar::Int64((t * 7) % 10))
                    .collect(),
            ),
            (
                "param2",
                (0..SYNTHETIC_ROWS)
                    .map(|t| Scalar::Int64((t * 5 + 3) % 9))
                    .collect(),
            ),
            (
                "param3",
                (0..SYNTHETIC_ROWS)
                    .map(|t| Scalar::Float64(((t * 37) % 100) as f64 / 100.0))
                    .collect(),
            ),
        ],
    )
}

fn default_document() -> Value {
    json!({
        "select": {"op": "+", "left": "param2", "right": "param3"},
        "name": "param2 + param3"
    })
}

fn print_plot(idx: usize, plot: &PlotSeries) {
    let title = plot
        .title
        .clone()
        .unwrap_or_else(|| format!("Plot {}", idx + 1));
    println!(
        "\n{title}: {} vs {} ({} points)",
        plot.y_label,
        plot.x_label,
        plot.y.len()
    );
    for (x, y) in plot.points() {
        println!("\t{x}\t{y}");
    }
}

fn print_help() {
    println!(
        "plotexpr\n\
         Usage:\n\
         \tplotexpr [--data synthetic|<csv>] [--config <json>] [--required-columns <n>|any] [--format plain|json]\n\
         Options:\n\
         \t--data <source>          synthetic (default) or a CSV file with a header row\n\
         \t--config <path>          Plot document: {{\"plots\": [...]}} or a single plot config\n\
         \t--required-columns <n>   Exact column count the table must have (default 4, 'any' to skip)\n\
         \t--format <fmt>           plain (default) or json\n\
         \t-h, --help               Show this help"
    );
}
