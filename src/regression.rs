//! Synthetic linear-regression data and the evidence lower bound (ELBO) used
//! by the variational-inference posts. [`crate::figures`] turns the results
//! into plottable series.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

/// A dense row-major matrix.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(Error::RaggedRows);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows).map(move |row| self.get(row, col))
    }

    /// `self · v`. `v` must have `cols` entries.
    pub fn dot(&self, v: &[f64]) -> Vec<f64> {
        (0..self.rows).map(|row| dot(self.row(row), v)).collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

/// Parameters for [`generate_data`]. The defaults are chosen for
/// illustration.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateOptions {
    /// Number of observations.
    pub n: usize,

    /// Number of features, including the bias column.
    pub p: usize,

    pub seed: u64,

    /// Regression coefficients. Drawn from
    /// `Normal(theta_mean, theta_std)` when absent.
    pub theta: Option<Vec<f64>>,
    pub theta_mean: f64,
    pub theta_std: f64,

    /// Mean and standard deviation of the non-bias features.
    pub x_mean: f64,
    pub x_std: f64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            n: 1000,
            p: 2,
            seed: 1,
            theta: None,
            theta_mean: 1.0,
            theta_std: 1.0,
            x_mean: 3.0,
            x_std: 1.0,
        }
    }
}

/// A design matrix `x`, observations `y` and the coefficients `theta` that
/// generated them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub x: Matrix,
    pub y: Vec<f64>,
    pub theta: Vec<f64>,
}

/// Generates `y = X·theta + ε` with `ε ~ Normal(0, 1)`. The first column of
/// `X` is all ones; the rest are `Normal(x_mean, x_std)`. The same options
/// always produce the same data.
pub fn generate_data(options: &GenerateOptions) -> Result<Dataset> {
    if options.p == 0 {
        return Err(Error::InvalidDimension);
    }
    if let Some(theta) = &options.theta {
        if theta.len() != options.p {
            return Err(Error::ThetaLength {
                wanted: options.p,
                found: theta.len(),
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut data = Vec::with_capacity(options.n * options.p);
    for _ in 0..options.n {
        data.push(1.0);
        for _ in 1..options.p {
            data.push(normal(&mut rng, options.x_mean, options.x_std));
        }
    }
    let x = Matrix {
        rows: options.n,
        cols: options.p,
        data,
    };

    let theta = match &options.theta {
        Some(theta) => theta.clone(),
        None => (0..options.p)
            .map(|_| normal(&mut rng, options.theta_mean, options.theta_std))
            .collect(),
    };

    let y = x
        .dot(&theta)
        .into_iter()
        .map(|mean| mean + normal(&mut rng, 0.0, 1.0))
        .collect();

    Ok(Dataset { x, y, theta })
}

// Box-Muller
fn normal<R: Rng>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>(); // (0, 1]
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Evaluates the ELBO `-½‖Xμ‖² + yᵀXμ`, up to additive constants. `mu` needs
/// one entry per column of `x` and `y` one per row.
pub fn evaluate_elbo(x: &Matrix, y: &[f64], mu: &[f64]) -> Result<f64> {
    if mu.len() != x.cols() {
        return Err(Error::ParameterLength {
            wanted: x.cols(),
            found: mu.len(),
        });
    }
    if y.len() != x.rows() {
        return Err(Error::ObservationLength {
            wanted: x.rows(),
            found: y.len(),
        });
    }
    let predictor = x.dot(mu);
    Ok(-0.5 * dot(&predictor, &predictor) + dot(y, &predictor))
}

/// Evaluates the ELBO of a two-parameter model over a grid, so `x` must have
/// exactly two columns. The result has one row per `mu2` value and one column
/// per `mu1` value, i.e. `grid[j][i] = elbo((mu1[i], mu2[j]))`, which is the
/// orientation contour plots expect.
pub fn evaluate_elbo_landscape(
    x: &Matrix,
    y: &[f64],
    mu1: &[f64],
    mu2: &[f64],
) -> Result<Vec<Vec<f64>>> {
    mu2.iter()
        .map(|&b| mu1.iter().map(|&a| evaluate_elbo(x, y, &[a, b])).collect())
        .collect()
}

/// `num` evenly spaced values from `start` to `stop`, both inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// The result of a fallible regression operation.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when asked for a model without any features.
    InvalidDimension,

    /// Returned when explicit coefficients don't match the feature count.
    ThetaLength { wanted: usize, found: usize },

    /// Returned when matrix rows differ in length.
    RaggedRows,

    /// Returned when the parameter vector doesn't match the feature count.
    ParameterLength { wanted: usize, found: usize },

    /// Returned when the observations don't match the design matrix's rows.
    ObservationLength { wanted: usize, found: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidDimension => write!(f, "need at least one feature"),
            Error::ThetaLength { wanted, found } => write!(
                f,
                "expected {} regression coefficients; found {}",
                wanted, found
            ),
            Error::RaggedRows => write!(f, "matrix rows differ in length"),
            Error::ParameterLength { wanted, found } => {
                write!(f, "expected {} parameters; found {}", wanted, found)
            }
            Error::ObservationLength { wanted, found } => {
                write!(f, "expected {} observations; found {}", wanted, found)
            }
        }
    }
}

impl std::error::Error for Error {}
