//! WGAN-GP gradient penalty
//!
//! For a batch of real and generated images, draws a per-sample uniform
//! interpolation factor, scores the interpolated images, and penalizes the
//! critic for input-gradient norms away from 1:
//!
//! ```text
//! GP = λ · mean_i (‖∇_x̂ D(x̂_i)‖₂ − 1)²
//! ```
//!
//! The penalty value needs one extra backward pass into the interpolated
//! input leaf. Its contribution to the critic's parameter gradient is a
//! second-order quantity (∂²D/∂θ∂x), which the first-order tape cannot
//! produce directly; it is evaluated with the central-difference
//! Hessian-vector-product identity
//!
//! ```text
//! ∂GP/∂θ = Σ_i c_i · ∂²D(x̂_i)/∂θ∂x · g_i
//!        ≈ (∇_θ ΣD(x̂+εu) − ∇_θ ΣD(x̂−εu)) · ‖v‖ / 2ε
//! ```
//!
//! where v folds the per-sample coefficients c_i into the input gradients
//! g_i and u = v/‖v‖. The norm in c_i is clamped below so a degenerate
//! zero-gradient sample cannot divide by zero.

use ndarray::Array1;
use rand::Rng;

use super::critic::Critic;
use crate::autograd::{self, ops, Tensor};

/// Guard for the per-sample norm in the coefficient denominator
const NORM_FLOOR: f32 = 1e-8;

/// Per-sample interpolation between real and fake batches.
/// Returns a gradient-tracking leaf: x̂_i = α_i·real_i + (1−α_i)·fake_i.
pub fn interpolate(real: &Tensor, fake: &Tensor, alphas: &[f32]) -> Tensor {
    assert_eq!(real.shape(), fake.shape(), "interpolate: shape mismatch");
    let n = real.shape()[0];
    assert_eq!(alphas.len(), n, "interpolate: one alpha per sample");
    let per_sample = real.len() / n;

    let real_data = real.data();
    let fake_data = fake.data();
    let mut data = Vec::with_capacity(real.len());
    for (i, &alpha) in alphas.iter().enumerate() {
        for j in 0..per_sample {
            let idx = i * per_sample + j;
            data.push(alpha * real_data[idx] + (1.0 - alpha) * fake_data[idx]);
        }
    }
    // A fresh leaf: gradients flow into it, not back to real/fake
    Tensor::from_shape_vec(real.shape(), data, true)
}

/// Gradient of the summed critic scores with respect to the input batch.
/// Returns the flat gradient buffer and the per-sample L2 norms. Critic
/// parameter gradients accumulated by this pass are wiped before returning.
pub fn input_gradients(critic: &Critic, x_hat: &Tensor) -> (Vec<f32>, Vec<f32>) {
    debug_assert!(x_hat.requires_grad(), "input_gradients needs a grad-tracking leaf");
    let n = x_hat.shape()[0];
    let per_sample = x_hat.len() / n;

    let mut scores = critic.score(x_hat);
    autograd::backward(&mut scores, Some(Array1::ones(n)));

    let grad = x_hat.grad().expect("input leaf received a gradient").to_vec();
    // This pass only exists for the input gradient; drop the incidental
    // parameter gradients so the caller's loss accounting stays clean.
    critic.zero_grad();
    x_hat.zero_grad();

    let norms: Vec<f32> = (0..n)
        .map(|i| {
            grad[i * per_sample..(i + 1) * per_sample]
                .iter()
                .map(|&g| g * g)
                .sum::<f32>()
                .sqrt()
        })
        .collect();
    (grad, norms)
}

/// Penalty value from precomputed per-sample gradient norms
pub fn penalty_value(norms: &[f32], lambda_gp: f32) -> f32 {
    let mean: f32 =
        norms.iter().map(|&n| (n - 1.0) * (n - 1.0)).sum::<f32>() / norms.len() as f32;
    lambda_gp * mean
}

/// The penalty value plus its contribution to the critic parameter gradients
pub struct PenaltyTerm {
    /// Scalar penalty value (added to the reported critic loss)
    pub value: f32,
    grads: Option<Vec<Array1<f32>>>,
}

impl PenaltyTerm {
    /// Add the penalty's parameter-gradient contribution into the critic's
    /// gradient cells. Call after the Wasserstein loss backward pass, before
    /// the optimizer step.
    pub fn accumulate(&self, critic: &Critic) {
        if let Some(grads) = &self.grads {
            for (param, grad) in critic.parameters().iter().zip(grads.iter()) {
                param.accumulate_grad(grad.clone());
            }
        }
    }
}

/// Gradient penalty operator
pub struct GradientPenalty {
    /// Penalty coefficient λ
    pub lambda_gp: f32,
    fd_epsilon: f32,
}

impl GradientPenalty {
    /// Create with the given coefficient
    pub fn new(lambda_gp: f32) -> Self {
        Self { lambda_gp, fd_epsilon: 1e-2 }
    }

    /// Compute the penalty for a real/fake batch pair. Leaves the critic's
    /// parameter gradients untouched; the caller applies the returned term.
    pub fn apply<R: Rng>(
        &self,
        critic: &Critic,
        real: &Tensor,
        fake: &Tensor,
        rng: &mut R,
    ) -> PenaltyTerm {
        let n = real.shape()[0];
        let per_sample = real.len() / n;
        let alphas: Vec<f32> = (0..n).map(|_| rng.random::<f32>()).collect();
        let x_hat = interpolate(real, fake, &alphas);

        let (grad, norms) = input_gradients(critic, &x_hat);
        let value = penalty_value(&norms, self.lambda_gp);

        // Fold the outer-derivative coefficients into a single perturbation
        // direction: v_i = 2λ(‖g_i‖−1) / (n·‖g_i‖) · g_i
        let mut v = vec![0.0f32; grad.len()];
        for i in 0..n {
            let norm = norms[i].max(NORM_FLOOR);
            let coeff = 2.0 * self.lambda_gp * (norms[i] - 1.0) / (n as f32 * norm);
            for j in 0..per_sample {
                v[i * per_sample + j] = coeff * grad[i * per_sample + j];
            }
        }
        let v_norm = v.iter().map(|&x| x * x).sum::<f32>().sqrt();
        if v_norm < NORM_FLOOR {
            // Flat penalty landscape: no parameter-gradient contribution
            return PenaltyTerm { value, grads: None };
        }

        let eps = self.fd_epsilon;
        let base = x_hat.data();
        let perturbed = |sign: f32| -> Vec<f32> {
            base.iter()
                .zip(v.iter())
                .map(|(&x, &vi)| x + sign * eps * vi / v_norm)
                .collect()
        };

        let g_plus = self.param_grads_at(critic, real.shape(), perturbed(1.0));
        let g_minus = self.param_grads_at(critic, real.shape(), perturbed(-1.0));

        let scale = v_norm / (2.0 * eps);
        let grads = g_plus
            .into_iter()
            .zip(g_minus)
            .map(|(p, m)| (p - m) * scale)
            .collect();
        PenaltyTerm { value, grads: Some(grads) }
    }

    /// Parameter gradients of the summed critic scores at a fixed input
    fn param_grads_at(&self, critic: &Critic, shape: &[usize], data: Vec<f32>) -> Vec<Array1<f32>> {
        critic.zero_grad();
        let x = Tensor::from_shape_vec(shape, data, false);
        let mut loss = ops::sum(&critic.score(&x));
        autograd::backward(&mut loss, None);
        let grads = critic
            .parameters()
            .iter()
            .map(|p| p.grad().unwrap_or_else(|| Array1::zeros(p.len())))
            .collect();
        critic.zero_grad();
        grads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gan::config::CriticConfig;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_critic(seed: u64) -> Critic {
        Critic::with_seed(CriticConfig { channels_img: 3, features: 4, image_size: 64 }, seed)
    }

    fn wavy_batch(n: usize, phase: f32) -> Tensor {
        let data: Vec<f32> =
            (0..n * 3 * 64 * 64).map(|i| ((i as f32) * 0.013 + phase).sin()).collect();
        Tensor::from_shape_vec(&[n, 3, 64, 64], data, false)
    }

    #[test]
    fn test_interpolate_endpoints() {
        let real = wavy_batch(2, 0.0);
        let fake = wavy_batch(2, 1.0);

        let at_real = interpolate(&real, &fake, &[1.0, 1.0]);
        assert_eq!(at_real.data(), real.data());

        let at_fake = interpolate(&real, &fake, &[0.0, 0.0]);
        assert_eq!(at_fake.data(), fake.data());

        assert!(at_real.requires_grad());
    }

    #[test]
    fn test_penalty_value_formula() {
        // (‖g‖−1)² averaged then scaled by λ
        let norms = vec![0.0, 2.0];
        // ((0−1)² + (2−1)²)/2 = 1.0
        assert_abs_diff_eq!(penalty_value(&norms, 10.0), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_boundary_alpha_one_matches_real_sample_gradients() {
        // At interpolation factor 1 the penalty is computed purely over
        // real-sample gradients.
        let critic = small_critic(42);
        let real = wavy_batch(2, 0.3);
        let fake = wavy_batch(2, 2.0);

        let x_hat = interpolate(&real, &fake, &[1.0, 1.0]);
        let (_, norms_interp) = input_gradients(&critic, &x_hat);

        let real_leaf = interpolate(&real, &real, &[1.0, 1.0]);
        let (_, norms_real) = input_gradients(&critic, &real_leaf);

        for (a, b) in norms_interp.iter().zip(norms_real.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
        let gp = penalty_value(&norms_interp, 10.0);
        assert_abs_diff_eq!(gp, penalty_value(&norms_real, 10.0), epsilon = 1e-5);
        assert!(gp.is_finite());
    }

    #[test]
    fn test_input_gradients_leave_critic_clean() {
        let critic = small_critic(7);
        let x_hat = interpolate(&wavy_batch(1, 0.0), &wavy_batch(1, 1.0), &[0.5]);
        let _ = input_gradients(&critic, &x_hat);
        for param in critic.parameters() {
            assert!(param.grad().is_none());
        }
    }

    #[test]
    fn test_apply_produces_finite_value_and_grads() {
        let critic = small_critic(11);
        let gp = GradientPenalty::new(10.0);
        let mut rng = StdRng::seed_from_u64(5);

        let term = gp.apply(&critic, &wavy_batch(2, 0.0), &wavy_batch(2, 1.5), &mut rng);
        assert!(term.value.is_finite());
        assert!(term.value >= 0.0);

        critic.zero_grad();
        term.accumulate(&critic);
        if term.grads.is_some() {
            for param in critic.parameters() {
                let grad = param.grad().expect("penalty accumulated a gradient");
                assert_eq!(grad.len(), param.len());
                assert!(grad.iter().all(|g| g.is_finite()));
            }
        }
    }

    #[test]
    fn test_accumulate_adds_to_existing_grads() {
        let critic = small_critic(13);
        let gp = GradientPenalty::new(10.0);
        let mut rng = StdRng::seed_from_u64(6);
        let term = gp.apply(&critic, &wavy_batch(1, 0.2), &wavy_batch(1, 1.1), &mut rng);

        // Seed each parameter with a unit gradient, then accumulate
        critic.zero_grad();
        for param in critic.parameters() {
            param.set_grad(Array1::ones(param.len()));
        }
        term.accumulate(&critic);

        if let Some(grads) = &term.grads {
            for (param, term_grad) in critic.parameters().iter().zip(grads.iter()) {
                let combined = param.grad().unwrap();
                for (c, t) in combined.iter().zip(term_grad.iter()) {
                    assert_abs_diff_eq!(*c, 1.0 + t, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_zero_norm_guard() {
        // All-equal norms of zero must not divide by zero; each contributes
        // (0−1)² to the mean.
        let norms = vec![0.0, 0.0, 0.0];
        assert_abs_diff_eq!(penalty_value(&norms, 10.0), 10.0, epsilon = 1e-6);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_penalty_value_non_negative(
                norms in prop::collection::vec(0.0f32..100.0, 1..32),
                lambda in 0.0f32..50.0,
            ) {
                let value = penalty_value(&norms, lambda);
                prop_assert!(value >= 0.0);
                prop_assert!(value.is_finite());
            }

            #[test]
            fn prop_unit_norms_give_zero_penalty(n in 1usize..32) {
                let norms = vec![1.0f32; n];
                prop_assert!(penalty_value(&norms, 10.0).abs() < 1e-6);
            }
        }
    }
}
