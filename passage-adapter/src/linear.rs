//! The linear projection and its online trainer.

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use tracing::debug;

use passage_core::{PassageError, Result};

/// Adam learning rate.
const LEARNING_RATE: f32 = 1e-4;
const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Epochs per training call.
const EPOCHS: usize = 3;

/// Upper bound on the minibatch size.
const MAX_BATCH: usize = 32;

/// Cosine floor below which a transform is flagged in the safety report.
const SAFETY_THRESHOLD: f32 = 0.75;

/// Diagnostic comparing a vector before and after the projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyReport {
    pub cosine: f32,
    pub is_safe: bool,
}

/// Adam moment buffers for one parameter tensor shape.
#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f32>,
    v_w: Array2<f32>,
    m_b: Array1<f32>,
    v_b: Array1<f32>,
    step: i32,
}

impl Moments {
    fn zeros(dim: usize) -> Self {
        Self {
            m_w: Array2::zeros((dim, dim)),
            v_w: Array2::zeros((dim, dim)),
            m_b: Array1::zeros(dim),
            v_b: Array1::zeros(dim),
            step: 0,
        }
    }
}

/// A D×D linear projection `y = Wq + b` with L2-normalized output.
///
/// Freshly initialized adapters have `W = I`, `b = 0`, so the transform is
/// the identity on unit vectors. The optimizer state is transient — records
/// persist only weights, bias, and the training count.
#[derive(Debug, Clone)]
pub struct LinearAdapter {
    weights: Array2<f32>,
    bias: Array1<f32>,
    dim: usize,
    training_count: u64,
    moments: Moments,
}

impl LinearAdapter {
    /// Identity-initialized adapter for the given embedding dimension.
    pub fn identity(dim: usize) -> Self {
        Self {
            weights: Array2::eye(dim),
            bias: Array1::zeros(dim),
            dim,
            training_count: 0,
            moments: Moments::zeros(dim),
        }
    }

    /// Restore from persisted parameters.
    pub fn from_parts(weights: Vec<Vec<f32>>, bias: Vec<f32>, training_count: u64) -> Result<Self> {
        let dim = bias.len();
        if weights.len() != dim || weights.iter().any(|row| row.len() != dim) {
            return Err(PassageError::Adapter(format!(
                "weight matrix is not {dim}x{dim}"
            )));
        }
        let flat: Vec<f32> = weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((dim, dim), flat)
            .map_err(|e| PassageError::Adapter(e.to_string()))?;
        Ok(Self {
            weights,
            bias: Array1::from_vec(bias),
            dim,
            training_count,
            moments: Moments::zeros(dim),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn training_count(&self) -> u64 {
        self.training_count
    }

    /// Export parameters for persistence.
    pub fn to_parts(&self) -> (Vec<Vec<f32>>, Vec<f32>) {
        let weights = self
            .weights
            .rows()
            .into_iter()
            .map(|row| row.to_vec())
            .collect();
        (weights, self.bias.to_vec())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(PassageError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Forward pass plus L2 normalization of the output.
    pub fn transform(&self, query: &[f32]) -> Result<Vec<f32>> {
        self.check_dim(query)?;
        let q = Array1::from_vec(query.to_vec());
        let projected = self.weights.dot(&q) + &self.bias;
        Ok(normalize(projected).to_vec())
    }

    /// One online training call: L2-normalize both batches row-wise, then
    /// run [`EPOCHS`] shuffled passes of Adam on the negative cosine loss
    /// with minibatches of `min(32, n)`. Bumps the training count once.
    pub fn train(&mut self, queries: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<()> {
        if queries.is_empty() || queries.len() != targets.len() {
            return Err(PassageError::Adapter(format!(
                "training needs matched non-empty batches, got {} queries / {} targets",
                queries.len(),
                targets.len()
            )));
        }
        for vector in queries.iter().chain(targets) {
            self.check_dim(vector)?;
        }

        let queries: Vec<Array1<f32>> = queries
            .iter()
            .map(|v| normalize(Array1::from_vec(v.clone())))
            .collect();
        let targets: Vec<Array1<f32>> = targets
            .iter()
            .map(|v| normalize(Array1::from_vec(v.clone())))
            .collect();

        let batch_size = MAX_BATCH.min(queries.len());
        let mut order: Vec<usize> = (0..queries.len()).collect();
        let mut rng = rand::thread_rng();

        for _ in 0..EPOCHS {
            order.shuffle(&mut rng);
            for batch in order.chunks(batch_size) {
                self.step(batch, &queries, &targets);
            }
        }

        self.training_count += 1;
        debug!(
            dim = self.dim,
            training_count = self.training_count,
            samples = queries.len(),
            "adapter trained"
        );
        Ok(())
    }

    /// One Adam step on a minibatch, minimizing `-cos(Wq + b, c)`.
    fn step(&mut self, batch: &[usize], queries: &[Array1<f32>], targets: &[Array1<f32>]) {
        let mut grad_w: Array2<f32> = Array2::zeros((self.dim, self.dim));
        let mut grad_b: Array1<f32> = Array1::zeros(self.dim);
        let scale = 1.0 / batch.len() as f32;

        for &i in batch {
            let q = &queries[i];
            let c = &targets[i];
            let y = self.weights.dot(q) + &self.bias;
            let norm_y = y.dot(&y).sqrt().max(EPSILON);
            let y_hat = &y / norm_y;
            let cos = y_hat.dot(c);
            // d(-cos)/dy = -(c - cos·ŷ) / ‖y‖  (targets are unit vectors)
            let grad_y = (&(&y_hat * cos) - c) / norm_y;
            for (row, &g) in grad_y.iter().enumerate() {
                for (col, &qv) in q.iter().enumerate() {
                    grad_w[(row, col)] += scale * g * qv;
                }
                grad_b[row] += scale * g;
            }
        }

        self.moments.step += 1;
        let t = self.moments.step;
        let bias_correction1 = 1.0 - BETA1.powi(t);
        let bias_correction2 = 1.0 - BETA2.powi(t);

        azip_update(
            &mut self.weights,
            &mut self.moments.m_w,
            &mut self.moments.v_w,
            &grad_w,
            bias_correction1,
            bias_correction2,
        );
        for idx in 0..self.dim {
            let g = grad_b[idx];
            let m = &mut self.moments.m_b[idx];
            let v = &mut self.moments.v_b[idx];
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / bias_correction1;
            let v_hat = *v / bias_correction2;
            self.bias[idx] -= LEARNING_RATE * m_hat / (v_hat.sqrt() + EPSILON);
        }
    }

    /// Diagnostic only: how far the projection moved a vector. The query
    /// path does not gate on this.
    pub fn safety(original: &[f32], transformed: &[f32]) -> SafetyReport {
        let cosine = cosine(original, transformed);
        SafetyReport {
            cosine,
            is_safe: cosine >= SAFETY_THRESHOLD,
        }
    }
}

fn azip_update(
    param: &mut Array2<f32>,
    m: &mut Array2<f32>,
    v: &mut Array2<f32>,
    grad: &Array2<f32>,
    bias_correction1: f32,
    bias_correction2: f32,
) {
    ndarray::Zip::from(param)
        .and(m)
        .and(v)
        .and(grad)
        .for_each(|p, m, v, &g| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / bias_correction1;
            let v_hat = *v / bias_correction2;
            *p -= LEARNING_RATE * m_hat / (v_hat.sqrt() + EPSILON);
        });
}

fn normalize(vector: Array1<f32>) -> Array1<f32> {
    let norm = vector.dot(&vector).sqrt();
    if norm <= f32::EPSILON {
        return vector;
    }
    vector / norm
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
