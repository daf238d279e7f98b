use plotexpr::{DataFrame, Scalar};

/// time 0..9, param1 cycling group keys, param2 1..10, param3 0.1..1.0.
pub fn sample_frame() -> DataFrame {
    DataFrame::from_dict(
        &["time", "param1", "param2", "param3"],
        vec![
            ("time", (0..10).map(Scalar::Int64).collect()),
            (
                "param1",
                [0, 0, 1, 1, 2, 2, 0, 1, 2, 0]
                    .into_iter()
                    .map(Scalar::Int64)
                    .collect(),
            ),
            ("param2", (1..=10).map(Scalar::Int64).collect()),
            (
                "param3",
                (1..=10_i32)
                    .map(|v| Scalar::Float64(f64::from(v) / 10.0))
                    .collect(),
            ),
        ],
    )
    .expect("sample frame")
}
