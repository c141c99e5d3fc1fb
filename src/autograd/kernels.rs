//! Pure numeric kernels for convolution, transposed convolution and
//! normalization, shared by the gradient-tape ops and the frozen inference
//! path. All buffers are flat `f32` slices in row-major NCHW layout.

/// Output spatial size of a strided convolution
pub fn conv_out_dim(input: usize, kernel: usize, stride: usize, pad: usize) -> usize {
    (input + 2 * pad - kernel) / stride + 1
}

/// Output spatial size of a strided transposed convolution
pub fn conv_transpose_out_dim(input: usize, kernel: usize, stride: usize, pad: usize) -> usize {
    (input - 1) * stride + kernel - 2 * pad
}

/// 2D convolution forward. `x` is `[n, c_in, h, w]`, `weight` is
/// `[c_out, c_in, k, k]`, optional `bias` is `[c_out]`. Returns the output
/// buffer plus its spatial dimensions.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_forward(
    x: &[f32],
    n: usize,
    c_in: usize,
    h: usize,
    w: usize,
    weight: &[f32],
    c_out: usize,
    k: usize,
    bias: Option<&[f32]>,
    stride: usize,
    pad: usize,
) -> (Vec<f32>, usize, usize) {
    let h_out = conv_out_dim(h, k, stride, pad);
    let w_out = conv_out_dim(w, k, stride, pad);
    let mut out = vec![0.0f32; n * c_out * h_out * w_out];

    for ni in 0..n {
        for oc in 0..c_out {
            let b = bias.map_or(0.0, |b| b[oc]);
            for oh in 0..h_out {
                for ow in 0..w_out {
                    let mut acc = b;
                    for ic in 0..c_in {
                        for kh in 0..k {
                            let ih = (oh * stride + kh) as isize - pad as isize;
                            if ih < 0 || ih >= h as isize {
                                continue;
                            }
                            for kw in 0..k {
                                let iw = (ow * stride + kw) as isize - pad as isize;
                                if iw < 0 || iw >= w as isize {
                                    continue;
                                }
                                let xi = ((ni * c_in + ic) * h + ih as usize) * w + iw as usize;
                                let wi = ((oc * c_in + ic) * k + kh) * k + kw;
                                acc += x[xi] * weight[wi];
                            }
                        }
                    }
                    out[((ni * c_out + oc) * h_out + oh) * w_out + ow] = acc;
                }
            }
        }
    }
    (out, h_out, w_out)
}

/// 2D convolution backward. Given the upstream gradient `gout`
/// (`[n, c_out, h_out, w_out]`), returns gradients for the input, the weight
/// and (when `with_bias`) the bias.
#[allow(clippy::too_many_arguments)]
pub fn conv2d_backward(
    x: &[f32],
    n: usize,
    c_in: usize,
    h: usize,
    w: usize,
    weight: &[f32],
    c_out: usize,
    k: usize,
    stride: usize,
    pad: usize,
    gout: &[f32],
    with_bias: bool,
) -> (Vec<f32>, Vec<f32>, Option<Vec<f32>>) {
    let h_out = conv_out_dim(h, k, stride, pad);
    let w_out = conv_out_dim(w, k, stride, pad);
    let mut gx = vec![0.0f32; n * c_in * h * w];
    let mut gw = vec![0.0f32; c_out * c_in * k * k];
    let mut gb = if with_bias { vec![0.0f32; c_out] } else { Vec::new() };

    for ni in 0..n {
        for oc in 0..c_out {
            for oh in 0..h_out {
                for ow in 0..w_out {
                    let g = gout[((ni * c_out + oc) * h_out + oh) * w_out + ow];
                    if with_bias {
                        gb[oc] += g;
                    }
                    for ic in 0..c_in {
                        for kh in 0..k {
                            let ih = (oh * stride + kh) as isize - pad as isize;
                            if ih < 0 || ih >= h as isize {
                                continue;
                            }
                            for kw in 0..k {
                                let iw = (ow * stride + kw) as isize - pad as isize;
                                if iw < 0 || iw >= w as isize {
                                    continue;
                                }
                                let xi = ((ni * c_in + ic) * h + ih as usize) * w + iw as usize;
                                let wi = ((oc * c_in + ic) * k + kh) * k + kw;
                                gx[xi] += weight[wi] * g;
                                gw[wi] += x[xi] * g;
                            }
                        }
                    }
                }
            }
        }
    }
    (gx, gw, if with_bias { Some(gb) } else { None })
}

/// 2D transposed convolution forward. `x` is `[n, c_in, h, w]`, `weight` is
/// `[c_in, c_out, k, k]`, optional `bias` is `[c_out]`.
#[allow(clippy::too_many_arguments)]
pub fn conv_transpose2d_forward(
    x: &[f32],
    n: usize,
    c_in: usize,
    h: usize,
    w: usize,
    weight: &[f32],
    c_out: usize,
    k: usize,
    bias: Option<&[f32]>,
    stride: usize,
    pad: usize,
) -> (Vec<f32>, usize, usize) {
    let h_out = conv_transpose_out_dim(h, k, stride, pad);
    let w_out = conv_transpose_out_dim(w, k, stride, pad);
    let mut out = vec![0.0f32; n * c_out * h_out * w_out];

    for ni in 0..n {
        for ic in 0..c_in {
            for ih in 0..h {
                for iw in 0..w {
                    let v = x[((ni * c_in + ic) * h + ih) * w + iw];
                    for oc in 0..c_out {
                        for kh in 0..k {
                            let oh = (ih * stride + kh) as isize - pad as isize;
                            if oh < 0 || oh >= h_out as isize {
                                continue;
                            }
                            for kw in 0..k {
                                let ow = (iw * stride + kw) as isize - pad as isize;
                                if ow < 0 || ow >= w_out as isize {
                                    continue;
                                }
                                let oi = ((ni * c_out + oc) * h_out + oh as usize) * w_out
                                    + ow as usize;
                                let wi = ((ic * c_out + oc) * k + kh) * k + kw;
                                out[oi] += v * weight[wi];
                            }
                        }
                    }
                }
            }
        }
    }
    if let Some(b) = bias {
        for ni in 0..n {
            for oc in 0..c_out {
                let base = (ni * c_out + oc) * h_out * w_out;
                for i in 0..h_out * w_out {
                    out[base + i] += b[oc];
                }
            }
        }
    }
    (out, h_out, w_out)
}

/// 2D transposed convolution backward.
#[allow(clippy::too_many_arguments)]
pub fn conv_transpose2d_backward(
    x: &[f32],
    n: usize,
    c_in: usize,
    h: usize,
    w: usize,
    weight: &[f32],
    c_out: usize,
    k: usize,
    stride: usize,
    pad: usize,
    gout: &[f32],
    with_bias: bool,
) -> (Vec<f32>, Vec<f32>, Option<Vec<f32>>) {
    let h_out = conv_transpose_out_dim(h, k, stride, pad);
    let w_out = conv_transpose_out_dim(w, k, stride, pad);
    let mut gx = vec![0.0f32; n * c_in * h * w];
    let mut gw = vec![0.0f32; c_in * c_out * k * k];

    for ni in 0..n {
        for ic in 0..c_in {
            for ih in 0..h {
                for iw in 0..w {
                    let xi = ((ni * c_in + ic) * h + ih) * w + iw;
                    let v = x[xi];
                    let mut acc = 0.0f32;
                    for oc in 0..c_out {
                        for kh in 0..k {
                            let oh = (ih * stride + kh) as isize - pad as isize;
                            if oh < 0 || oh >= h_out as isize {
                                continue;
                            }
                            for kw in 0..k {
                                let ow = (iw * stride + kw) as isize - pad as isize;
                                if ow < 0 || ow >= w_out as isize {
                                    continue;
                                }
                                let g = gout[((ni * c_out + oc) * h_out + oh as usize) * w_out
                                    + ow as usize];
                                let wi = ((ic * c_out + oc) * k + kh) * k + kw;
                                acc += weight[wi] * g;
                                gw[wi] += v * g;
                            }
                        }
                    }
                    gx[xi] = acc;
                }
            }
        }
    }

    let gb = if with_bias {
        let mut gb = vec![0.0f32; c_out];
        for ni in 0..n {
            for oc in 0..c_out {
                let base = (ni * c_out + oc) * h_out * w_out;
                for i in 0..h_out * w_out {
                    gb[oc] += gout[base + i];
                }
            }
        }
        Some(gb)
    } else {
        None
    };
    (gx, gw, gb)
}

/// Instance normalization forward: statistics per (sample, channel) over the
/// spatial extent. Returns the output, the normalized values and the inverse
/// standard deviations (one per (n, c) pair), both needed by the backward.
pub fn instance_norm_forward(
    x: &[f32],
    n: usize,
    c: usize,
    spatial: usize,
    gamma: &[f32],
    beta: &[f32],
    eps: f32,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut out = vec![0.0f32; x.len()];
    let mut xhat = vec![0.0f32; x.len()];
    let mut inv_std = vec![0.0f32; n * c];

    for ni in 0..n {
        for ci in 0..c {
            let base = (ni * c + ci) * spatial;
            let group = &x[base..base + spatial];
            let mean = group.iter().sum::<f32>() / spatial as f32;
            let var = group.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / spatial as f32;
            let istd = 1.0 / (var + eps).sqrt();
            inv_std[ni * c + ci] = istd;
            for j in 0..spatial {
                let h = (group[j] - mean) * istd;
                xhat[base + j] = h;
                out[base + j] = gamma[ci] * h + beta[ci];
            }
        }
    }
    (out, xhat, inv_std)
}

/// Instance normalization backward.
#[allow(clippy::too_many_arguments)]
pub fn instance_norm_backward(
    gout: &[f32],
    xhat: &[f32],
    inv_std: &[f32],
    n: usize,
    c: usize,
    spatial: usize,
    gamma: &[f32],
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut gx = vec![0.0f32; gout.len()];
    let mut ggamma = vec![0.0f32; c];
    let mut gbeta = vec![0.0f32; c];
    let m = spatial as f32;

    for ni in 0..n {
        for ci in 0..c {
            let base = (ni * c + ci) * spatial;
            let istd = inv_std[ni * c + ci];

            let mut sum_g = 0.0f32;
            let mut sum_gh = 0.0f32;
            for j in 0..spatial {
                let g = gout[base + j];
                sum_g += g;
                sum_gh += g * xhat[base + j];
                gbeta[ci] += g;
                ggamma[ci] += g * xhat[base + j];
            }
            let mean_g = sum_g / m;
            let mean_gh = sum_gh / m;
            for j in 0..spatial {
                let g = gout[base + j];
                gx[base + j] = gamma[ci] * istd * (g - mean_g - xhat[base + j] * mean_gh);
            }
        }
    }
    (gx, ggamma, gbeta)
}

/// Batch normalization forward: statistics per channel over samples and the
/// spatial extent. Same return layout as `instance_norm_forward`, with one
/// inverse standard deviation per channel.
pub fn batch_norm_forward(
    x: &[f32],
    n: usize,
    c: usize,
    spatial: usize,
    gamma: &[f32],
    beta: &[f32],
    eps: f32,
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut out = vec![0.0f32; x.len()];
    let mut xhat = vec![0.0f32; x.len()];
    let mut inv_std = vec![0.0f32; c];
    let m = (n * spatial) as f32;

    for ci in 0..c {
        let mut sum = 0.0f32;
        for ni in 0..n {
            let base = (ni * c + ci) * spatial;
            for j in 0..spatial {
                sum += x[base + j];
            }
        }
        let mean = sum / m;
        let mut var = 0.0f32;
        for ni in 0..n {
            let base = (ni * c + ci) * spatial;
            for j in 0..spatial {
                let d = x[base + j] - mean;
                var += d * d;
            }
        }
        var /= m;
        let istd = 1.0 / (var + eps).sqrt();
        inv_std[ci] = istd;
        for ni in 0..n {
            let base = (ni * c + ci) * spatial;
            for j in 0..spatial {
                let h = (x[base + j] - mean) * istd;
                xhat[base + j] = h;
                out[base + j] = gamma[ci] * h + beta[ci];
            }
        }
    }
    (out, xhat, inv_std)
}

/// Batch normalization backward.
#[allow(clippy::too_many_arguments)]
pub fn batch_norm_backward(
    gout: &[f32],
    xhat: &[f32],
    inv_std: &[f32],
    n: usize,
    c: usize,
    spatial: usize,
    gamma: &[f32],
) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut gx = vec![0.0f32; gout.len()];
    let mut ggamma = vec![0.0f32; c];
    let mut gbeta = vec![0.0f32; c];
    let m = (n * spatial) as f32;

    for ci in 0..c {
        let istd = inv_std[ci];
        let mut sum_g = 0.0f32;
        let mut sum_gh = 0.0f32;
        for ni in 0..n {
            let base = (ni * c + ci) * spatial;
            for j in 0..spatial {
                let g = gout[base + j];
                sum_g += g;
                sum_gh += g * xhat[base + j];
            }
        }
        gbeta[ci] = sum_g;
        ggamma[ci] = sum_gh;
        let mean_g = sum_g / m;
        let mean_gh = sum_gh / m;
        for ni in 0..n {
            let base = (ni * c + ci) * spatial;
            for j in 0..spatial {
                let g = gout[base + j];
                gx[base + j] = gamma[ci] * istd * (g - mean_g - xhat[base + j] * mean_gh);
            }
        }
    }
    (gx, ggamma, gbeta)
}

/// Leaky ReLU scalar
pub fn leaky_relu_scalar(x: f32, slope: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        slope * x
    }
}

/// Sigmoid scalar
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_conv_out_dims() {
        // The critic path: 64 -> 32 -> 16 -> 8 -> 4 -> 2 -> 1
        assert_eq!(conv_out_dim(64, 4, 2, 1), 32);
        assert_eq!(conv_out_dim(32, 4, 2, 1), 16);
        assert_eq!(conv_out_dim(4, 4, 2, 1), 2);
        assert_eq!(conv_out_dim(2, 2, 1, 0), 1);
    }

    #[test]
    fn test_conv_transpose_out_dims() {
        // The generator path: 1 -> 4 -> 8 -> 16 -> 32 -> 64
        assert_eq!(conv_transpose_out_dim(1, 4, 1, 0), 4);
        assert_eq!(conv_transpose_out_dim(4, 4, 2, 1), 8);
        assert_eq!(conv_transpose_out_dim(32, 4, 2, 1), 64);
    }

    #[test]
    fn test_conv2d_identity_kernel() {
        // 1x1 kernel with weight 1.0 reproduces the input
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let w = vec![1.0];
        let (out, h, ww) = conv2d_forward(&x, 1, 1, 2, 2, &w, 1, 1, None, 1, 0);
        assert_eq!((h, ww), (2, 2));
        assert_eq!(out, x);
    }

    #[test]
    fn test_conv2d_sum_kernel() {
        // 2x2 all-ones kernel, stride 2: each output is the sum of a quadrant
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let w = vec![1.0; 4];
        let (out, h, ww) = conv2d_forward(&x, 1, 1, 2, 2, &w, 1, 2, None, 2, 0);
        assert_eq!((h, ww), (1, 1));
        assert_abs_diff_eq!(out[0], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_conv2d_bias() {
        let x = vec![0.0; 4];
        let w = vec![1.0];
        let (out, _, _) = conv2d_forward(&x, 1, 1, 2, 2, &w, 1, 1, Some(&[5.0]), 1, 0);
        assert!(out.iter().all(|&v| (v - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_conv2d_backward_finite_difference() {
        // Check analytic gradients against central differences on a tiny case
        let n = 1;
        let (c_in, h, w) = (2, 4, 4);
        let (c_out, k, stride, pad) = (2, 3, 1, 1);
        let x: Vec<f32> = (0..c_in * h * w).map(|i| ((i as f32) * 0.37).sin()).collect();
        let wt: Vec<f32> = (0..c_out * c_in * k * k)
            .map(|i| ((i as f32) * 0.73).cos() * 0.5)
            .collect();
        let bias = vec![0.1, -0.2];

        let (out, ho, wo) = conv2d_forward(&x, n, c_in, h, w, &wt, c_out, k, Some(&bias), stride, pad);
        let gout = vec![1.0f32; out.len()];
        let (gx, gw, gb) =
            conv2d_backward(&x, n, c_in, h, w, &wt, c_out, k, stride, pad, &gout, true);

        let loss = |x: &[f32], wt: &[f32], b: &[f32]| -> f32 {
            let (o, _, _) = conv2d_forward(x, n, c_in, h, w, wt, c_out, k, Some(b), stride, pad);
            o.iter().sum()
        };
        let eps = 1e-2;

        for i in [0usize, 7, 15, 31] {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += eps;
            xm[i] -= eps;
            let fd = (loss(&xp, &wt, &bias) - loss(&xm, &wt, &bias)) / (2.0 * eps);
            assert_abs_diff_eq!(gx[i], fd, epsilon = 1e-2);
        }
        for i in [0usize, 5, 17] {
            let mut wp = wt.clone();
            let mut wm = wt.clone();
            wp[i] += eps;
            wm[i] -= eps;
            let fd = (loss(&x, &wp, &bias) - loss(&x, &wm, &bias)) / (2.0 * eps);
            assert_abs_diff_eq!(gw[i], fd, epsilon = 1e-2);
        }
        let gb = gb.unwrap();
        assert_abs_diff_eq!(gb[0], (ho * wo) as f32, epsilon = 1e-3);
    }

    #[test]
    fn test_conv_transpose2d_backward_finite_difference() {
        let n = 1;
        let (c_in, h, w) = (2, 3, 3);
        let (c_out, k, stride, pad) = (2, 4, 2, 1);
        let x: Vec<f32> = (0..c_in * h * w).map(|i| ((i as f32) * 0.41).sin()).collect();
        let wt: Vec<f32> = (0..c_in * c_out * k * k)
            .map(|i| ((i as f32) * 0.29).cos() * 0.5)
            .collect();
        let bias = vec![0.3, -0.1];

        let (out, _, _) =
            conv_transpose2d_forward(&x, n, c_in, h, w, &wt, c_out, k, Some(&bias), stride, pad);
        let gout: Vec<f32> = (0..out.len()).map(|i| ((i as f32) * 0.13).sin()).collect();
        let (gx, gw, gb) =
            conv_transpose2d_backward(&x, n, c_in, h, w, &wt, c_out, k, stride, pad, &gout, true);

        let loss = |x: &[f32], wt: &[f32], b: &[f32]| -> f32 {
            let (o, _, _) =
                conv_transpose2d_forward(x, n, c_in, h, w, wt, c_out, k, Some(b), stride, pad);
            o.iter().zip(gout.iter()).map(|(a, g)| a * g).sum()
        };
        let eps = 1e-2;

        for i in [0usize, 4, 9, 17] {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += eps;
            xm[i] -= eps;
            let fd = (loss(&xp, &wt, &bias) - loss(&xm, &wt, &bias)) / (2.0 * eps);
            assert_abs_diff_eq!(gx[i], fd, epsilon = 1e-2);
        }
        for i in [0usize, 11, 30] {
            let mut wp = wt.clone();
            let mut wm = wt.clone();
            wp[i] += eps;
            wm[i] -= eps;
            let fd = (loss(&x, &wp, &bias) - loss(&x, &wm, &bias)) / (2.0 * eps);
            assert_abs_diff_eq!(gw[i], fd, epsilon = 1e-2);
        }
        let gb = gb.unwrap();
        let bp = {
            let mut b2 = bias.clone();
            b2[0] += eps;
            (loss(&x, &wt, &b2) - loss(&x, &wt, &bias)) / eps
        };
        assert_abs_diff_eq!(gb[0], bp, epsilon = 1e-2);
    }

    #[test]
    fn test_instance_norm_zero_mean_unit_var() {
        let x: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let gamma = vec![1.0, 1.0];
        let beta = vec![0.0, 0.0];
        let (out, _, _) = instance_norm_forward(&x, 1, 2, 8, &gamma, &beta, 1e-5);
        for ci in 0..2 {
            let group = &out[ci * 8..(ci + 1) * 8];
            let mean: f32 = group.iter().sum::<f32>() / 8.0;
            let var: f32 = group.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / 8.0;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-4);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_instance_norm_affine() {
        let x: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let (out, _, _) = instance_norm_forward(&x, 1, 1, 8, &[2.0], &[3.0], 1e-5);
        let mean: f32 = out.iter().sum::<f32>() / 8.0;
        assert_abs_diff_eq!(mean, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_instance_norm_backward_finite_difference() {
        let (n, c, spatial) = (2, 2, 6);
        let x: Vec<f32> = (0..n * c * spatial).map(|i| ((i as f32) * 0.57).sin()).collect();
        let gamma = vec![1.5, 0.8];
        let beta = vec![0.1, -0.3];
        let eps = 1e-5;

        let (_, xhat, inv_std) = instance_norm_forward(&x, n, c, spatial, &gamma, &beta, eps);
        let gout: Vec<f32> = (0..n * c * spatial).map(|i| ((i as f32) * 0.23).cos()).collect();
        let (gx, ggamma, gbeta) =
            instance_norm_backward(&gout, &xhat, &inv_std, n, c, spatial, &gamma);

        let loss = |x: &[f32], gamma: &[f32], beta: &[f32]| -> f32 {
            let (o, _, _) = instance_norm_forward(x, n, c, spatial, gamma, beta, eps);
            o.iter().zip(gout.iter()).map(|(a, g)| a * g).sum()
        };
        let fd_eps = 1e-2;

        for i in [0usize, 5, 13, 20] {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += fd_eps;
            xm[i] -= fd_eps;
            let fd = (loss(&xp, &gamma, &beta) - loss(&xm, &gamma, &beta)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(gx[i], fd, epsilon = 2e-2);
        }
        for ci in 0..c {
            let mut gp = gamma.clone();
            let mut gm = gamma.clone();
            gp[ci] += fd_eps;
            gm[ci] -= fd_eps;
            let fd = (loss(&x, &gp, &beta) - loss(&x, &gm, &beta)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(ggamma[ci], fd, epsilon = 2e-2);

            let mut bp = beta.clone();
            let mut bm = beta.clone();
            bp[ci] += fd_eps;
            bm[ci] -= fd_eps;
            let fd = (loss(&x, &gamma, &bp) - loss(&x, &gamma, &bm)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(gbeta[ci], fd, epsilon = 2e-2);
        }
    }

    #[test]
    fn test_batch_norm_backward_finite_difference() {
        let (n, c, spatial) = (3, 2, 4);
        let x: Vec<f32> = (0..n * c * spatial).map(|i| ((i as f32) * 0.61).sin()).collect();
        let gamma = vec![1.2, 0.7];
        let beta = vec![0.0, 0.5];
        let eps = 1e-5;

        let (_, xhat, inv_std) = batch_norm_forward(&x, n, c, spatial, &gamma, &beta, eps);
        let gout: Vec<f32> = (0..n * c * spatial).map(|i| ((i as f32) * 0.31).cos()).collect();
        let (gx, ggamma, gbeta) = batch_norm_backward(&gout, &xhat, &inv_std, n, c, spatial, &gamma);

        let loss = |x: &[f32], gamma: &[f32], beta: &[f32]| -> f32 {
            let (o, _, _) = batch_norm_forward(x, n, c, spatial, gamma, beta, eps);
            o.iter().zip(gout.iter()).map(|(a, g)| a * g).sum()
        };
        let fd_eps = 1e-2;

        for i in [0usize, 7, 15, 22] {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += fd_eps;
            xm[i] -= fd_eps;
            let fd = (loss(&xp, &gamma, &beta) - loss(&xm, &gamma, &beta)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(gx[i], fd, epsilon = 2e-2);
        }
        for ci in 0..c {
            let mut gp = gamma.clone();
            let mut gm = gamma.clone();
            gp[ci] += fd_eps;
            gm[ci] -= fd_eps;
            let fd = (loss(&x, &gp, &beta) - loss(&x, &gm, &beta)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(ggamma[ci], fd, epsilon = 2e-2);

            let mut bp = beta.clone();
            let mut bm = beta.clone();
            bp[ci] += fd_eps;
            bm[ci] -= fd_eps;
            let fd = (loss(&x, &gamma, &bp) - loss(&x, &gamma, &bm)) / (2.0 * fd_eps);
            assert_abs_diff_eq!(gbeta[ci], fd, epsilon = 2e-2);
        }
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5, epsilon = 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_leaky_relu_scalar() {
        assert_abs_diff_eq!(leaky_relu_scalar(2.0, 0.2), 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(leaky_relu_scalar(-2.0, 0.2), -0.4, epsilon = 1e-6);
    }
}
