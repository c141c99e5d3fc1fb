//! Adam optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;

/// Adam optimizer
///
/// m_t = β1 * m_{t-1} + (1 - β1) * g
/// v_t = β2 * v_{t-1} + (1 - β2) * g²
/// θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
///
/// The WGAN-GP convention of β1 = 0.0, β2 = 0.9 is the library default;
/// momentum from the sign-flipping adversarial gradients hurts more than it
/// helps.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, m: Vec::new(), v: Vec::new() }
    }

    /// Create Adam with the WGAN-GP default betas (0.0, 0.9)
    pub fn wgan_defaults(lr: f32) -> Self {
        Self::new(lr, 0.0, 0.9, 1e-8)
    }

    /// Initialize moments if needed
    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
    }

    /// Get optimizer step counter
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Adam {
    fn update_param(&mut self, i: usize, param: &mut Tensor, lr_t: f32) {
        if let Some(grad) = param.grad() {
            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = if let Some(m) = &self.m[i] {
                m * self.beta1 + &grad * (1.0 - self.beta1)
            } else {
                &grad * (1.0 - self.beta1)
            };

            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = &grad * &grad;
            let v_t = if let Some(v) = &self.v[i] {
                v * self.beta2 + &grad_sq * (1.0 - self.beta2)
            } else {
                &grad_sq * (1.0 - self.beta2)
            };

            let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
            *param.data_mut() -= &update;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
        }
    }

    fn bias_corrected_lr(&self) -> f32 {
        self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)))
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_moments(params);
        self.t += 1;
        let lr_t = self.bias_corrected_lr();

        for (i, param) in params.iter_mut().enumerate() {
            self.update_param(i, param, lr_t);
        }
    }

    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;
        let lr_t = self.bias_corrected_lr();

        for (i, param) in params.iter_mut().enumerate() {
            self.update_param(i, &mut **param, lr_t);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
