//! The numbers behind the regression posts' diagnostic figures. Each function
//! returns an [`Axes`] (or a pair of them) describing what to draw; rendering
//! is left to whatever plotting tool consumes the serialized result.

use crate::regression::{evaluate_elbo_landscape, linspace, Dataset, Error, Matrix, Result};
use serde::Serialize;

/// Points sampled along a line or the default resolution of a contour grid.
pub const DEFAULT_SAMPLES: usize = 50;

/// A set of points drawn as a line or as a scatter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// A shaded region between `lower` and `upper` along `x`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Band {
    pub x: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Filled-in values over a grid: `z[j][i]` belongs to `(x[i], y[j])`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Contour {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<Vec<f64>>,
}

/// One trace within an [`Axes`]. Traces that belong together (a parameter's
/// line, its reference value and its band) share a `group` and therefore a
/// colour.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trace {
    Line { group: usize, series: Series },
    Scatter { group: usize, series: Series },
    HorizontalLine { group: usize, y: f64 },
    Band { group: usize, band: Band },
    Point { group: usize, x: f64, y: f64 },
    Contour { contour: Contour },
}

/// A single set of axes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Axes {
    pub x_label: String,
    pub y_label: String,
    pub traces: Vec<Trace>,
}

impl Axes {
    fn new(x_label: &str, y_label: &str) -> Axes {
        Axes {
            x_label: x_label.to_owned(),
            y_label: y_label.to_owned(),
            traces: Vec::new(),
        }
    }
}

/// The covariate/observation scatter plus the line the data was generated
/// from.
pub fn data_figure(data: &Dataset) -> Axes {
    let mut axes = Axes::new("Covariates", "Observations");
    let covariate: Vec<f64> = match data.x.cols() {
        0 | 1 => vec![0.0; data.x.rows()],
        _ => data.x.column(1).collect(),
    };

    axes.traces.push(Trace::Scatter {
        group: 0,
        series: Series {
            x: covariate.clone(),
            y: data.y.clone(),
        },
    });

    if let Some((lo, hi)) = bounds(covariate.iter().copied()) {
        let theta0 = data.theta.first().copied().unwrap_or(0.0);
        let theta1 = data.theta.get(1).copied().unwrap_or(0.0);
        let x = linspace(lo, hi, DEFAULT_SAMPLES);
        let y = x.iter().map(|v| theta0 + theta1 * v).collect();
        axes.traces.push(Trace::Line {
            group: 1,
            series: Series { x, y },
        });
    }
    axes
}

/// One line per parameter over iterations. `trace[i][j]` is parameter `j`
/// at iteration `i`; every `step`-th iteration is kept. With a `reference`,
/// each parameter gets a horizontal line at its true value. With a design
/// matrix `x`, each gets a band of `sigma` standard errors, where the
/// standard error of parameter `j` is `(Σ x[:, j]²)^-½`. Every iteration
/// must carry the same number of parameters.
pub fn parameter_trace_figure(
    trace: &[Vec<f64>],
    reference: Option<&[f64]>,
    x: Option<&Matrix>,
    sigma: f64,
    step: usize,
) -> Result<Axes> {
    let params = trace.first().map(|row| row.len()).unwrap_or(0);
    if trace.iter().any(|row| row.len() != params) {
        return Err(Error::RaggedRows);
    }

    let mut axes = Axes::new("Iteration", "Parameter μ");
    let kept: Vec<&Vec<f64>> = trace.iter().step_by(step.max(1)).collect();
    let iterations: Vec<f64> = (0..kept.len()).map(|i| i as f64).collect();

    for j in 0..params {
        let values: Vec<f64> = kept.iter().map(|row| row[j]).collect();
        if let Some(reference) = reference.and_then(|r| r.get(j)) {
            axes.traces.push(Trace::HorizontalLine {
                group: j,
                y: *reference,
            });
        }
        if let Some(x) = x.filter(|x| j < x.cols()) {
            let err = x.column(j).map(|v| v * v).sum::<f64>().powf(-0.5);
            axes.traces.push(Trace::Band {
                group: j,
                band: Band {
                    x: iterations.clone(),
                    lower: values.iter().map(|v| v - sigma * err).collect(),
                    upper: values.iter().map(|v| v + sigma * err).collect(),
                },
            });
        }
        axes.traces.push(Trace::Line {
            group: j,
            series: Series {
                x: iterations.clone(),
                y: values,
            },
        });
    }
    Ok(axes)
}

/// The ELBO over iterations.
pub fn elbo_trace_figure(elbos: &[f64]) -> Axes {
    let mut axes = Axes::new("Iteration", "ELBO L");
    axes.traces.push(Trace::Line {
        group: 0,
        series: Series {
            x: (0..elbos.len()).map(|i| i as f64).collect(),
            y: elbos.to_vec(),
        },
    });
    axes
}

/// The parameter trace and the ELBO trace, side by side.
pub fn trace_figure(
    elbos: &[f64],
    trace: &[Vec<f64>],
    reference: Option<&[f64]>,
    x: Option<&Matrix>,
    sigma: f64,
    step: usize,
) -> Result<(Axes, Axes)> {
    Ok((
        parameter_trace_figure(trace, reference, x, sigma, step)?,
        elbo_trace_figure(elbos),
    ))
}

/// The path of the first two parameters over iterations, drawn over the ELBO
/// landscape of a two-column `x`. `limits` gives the `(mu1, mu2)` ranges of
/// the landscape; by default it is the path's bounding box with a 5% margin.
pub fn trajectory_figure(
    x: &Matrix,
    y: &[f64],
    trace: &[Vec<f64>],
    reference: Option<(f64, f64)>,
    limits: Option<((f64, f64), (f64, f64))>,
) -> Result<Axes> {
    let mut axes = Axes::new("μ1", "μ2");
    let path = Series {
        x: trace.iter().map(|row| row.get(0).copied().unwrap_or(0.0)).collect(),
        y: trace.iter().map(|row| row.get(1).copied().unwrap_or(0.0)).collect(),
    };

    let limits = limits.or_else(|| {
        let mut xs = path.x.clone();
        let mut ys = path.y.clone();
        if let Some((rx, ry)) = reference {
            xs.push(rx);
            ys.push(ry);
        }
        Some((padded(bounds(xs.into_iter())?), padded(bounds(ys.into_iter())?)))
    });

    axes.traces.push(Trace::Line {
        group: 0,
        series: path,
    });
    if let Some((rx, ry)) = reference {
        axes.traces.push(Trace::Point {
            group: 1,
            x: rx,
            y: ry,
        });
    }
    if let Some(((x0, x1), (y0, y1))) = limits {
        let mu1 = linspace(x0, x1, DEFAULT_SAMPLES);
        let mu2 = linspace(y0, y1, DEFAULT_SAMPLES);
        let z = evaluate_elbo_landscape(x, y, &mu1, &mu2)?;
        axes.traces.push(Trace::Contour {
            contour: Contour { x: mu1, y: mu2, z },
        });
    }
    Ok(axes)
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    let margin = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
    (lo - margin, hi + margin)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::regression::{generate_data, GenerateOptions};

    fn small() -> Dataset {
        generate_data(&GenerateOptions {
            n: 20,
            theta: Some(vec![1.0, 2.0]),
            ..GenerateOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_data_figure() {
        let data = small();
        let axes = data_figure(&data);
        assert_eq!(("Covariates", "Observations"), (axes.x_label.as_str(), axes.y_label.as_str()));
        match &axes.traces[..] {
            [Trace::Scatter { series: scatter, .. }, Trace::Line { series: line, .. }] => {
                assert_eq!(data.y, scatter.y);
                assert_eq!(DEFAULT_SAMPLES, line.x.len());
                for (x, y) in line.x.iter().zip(&line.y) {
                    assert!((1.0 + 2.0 * x - y).abs() < 1e-12);
                }
                let min = scatter.x.iter().copied().fold(f64::INFINITY, f64::min);
                assert_eq!(min, line.x[0]);
            }
            other => panic!("unexpected traces {:?}", other),
        }
    }

    #[test]
    fn test_parameter_trace_with_reference_and_band() {
        let x = Matrix::from_rows(vec![vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0, 2.0]]).unwrap();
        let trace = vec![vec![0.0, 0.0], vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let axes = parameter_trace_figure(&trace, Some(&[3.0, 6.0][..]), Some(&x), 3.0, 2).unwrap();

        // per parameter: reference, band, line
        assert_eq!(6, axes.traces.len());
        match &axes.traces[..3] {
            [Trace::HorizontalLine { group: 0, y }, Trace::Band { group: 0, band }, Trace::Line { group: 0, series }] => {
                assert_eq!(3.0, *y);
                assert_eq!(vec![0.0, 2.0], series.y);
                assert_eq!(vec![0.0, 1.0], series.x);
                // Σ x[:, 0]² = 4 → err = 0.5
                assert_eq!(vec![-1.5, 0.5], band.lower);
                assert_eq!(vec![1.5, 3.5], band.upper);
            }
            other => panic!("unexpected traces {:?}", other),
        }
    }

    #[test]
    fn test_parameter_trace_plain() {
        let trace = vec![vec![0.0], vec![1.0]];
        let axes = parameter_trace_figure(&trace, None, None, 3.0, 1).unwrap();
        assert_eq!(1, axes.traces.len());
    }

    #[test]
    fn test_parameter_trace_rejects_short_iterations() {
        let trace = vec![vec![0.0, 1.0], vec![1.0]];
        assert_eq!(Err(Error::RaggedRows), parameter_trace_figure(&trace, None, None, 3.0, 1));
        // a short row that the step skips still counts
        let trace = vec![vec![0.0, 1.0], vec![1.0], vec![2.0, 3.0]];
        assert_eq!(Err(Error::RaggedRows), parameter_trace_figure(&trace, None, None, 3.0, 2));
    }

    #[test]
    fn test_trace_figure_pairs_axes() {
        let (params, elbo) =
            trace_figure(&[-3.0, -2.0, -1.5], &[vec![0.0], vec![1.0], vec![1.5]], None, None, 3.0, 1).unwrap();
        assert_eq!("Parameter μ", params.y_label);
        assert_eq!("ELBO L", elbo.y_label);
        assert_eq!(
            vec![Trace::Line {
                group: 0,
                series: Series {
                    x: vec![0.0, 1.0, 2.0],
                    y: vec![-3.0, -2.0, -1.5],
                },
            }],
            elbo.traces
        );
    }

    #[test]
    fn test_trajectory_default_limits() {
        let data = small();
        let trace = vec![vec![0.0, 0.0], vec![1.0, 2.0]];
        let axes = trajectory_figure(&data.x, &data.y, &trace, Some((1.0, 2.0)), None).unwrap();
        match axes.traces.last() {
            Some(Trace::Contour { contour }) => {
                assert_eq!(DEFAULT_SAMPLES, contour.x.len());
                assert_eq!(DEFAULT_SAMPLES, contour.z.len());
                assert!((contour.x[0] + 0.05).abs() < 1e-12);
                assert!((contour.y[DEFAULT_SAMPLES - 1] - 2.1).abs() < 1e-12);
            }
            other => panic!("wanted a contour; found {:?}", other),
        }
        assert!(matches!(axes.traces[1], Trace::Point { x, y, .. } if x == 1.0 && y == 2.0));
    }

    #[test]
    fn test_trajectory_explicit_limits_and_empty_trace() {
        let data = small();
        let axes = trajectory_figure(&data.x, &data.y, &[], None, Some(((0.0, 1.0), (0.0, 1.0)))).unwrap();
        assert_eq!(2, axes.traces.len());

        let axes = trajectory_figure(&data.x, &data.y, &[], None, None).unwrap();
        assert_eq!(1, axes.traces.len());
    }

    #[test]
    fn test_trajectory_needs_two_columns() {
        let data = generate_data(&GenerateOptions {
            n: 10,
            p: 3,
            ..GenerateOptions::default()
        })
        .unwrap();
        let result = trajectory_figure(&data.x, &data.y, &[vec![0.0, 0.0]], None, None);
        assert_eq!(Err(Error::ParameterLength { wanted: 3, found: 2 }), result);
    }
}
