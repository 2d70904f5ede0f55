// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Closed-form kernels and synthetic images for tests, benches and tools.
//!
//! Kernel generation is not part of the library surface; pipelines always take
//! caller-supplied banks. These renderers exist so that tests have something
//! realistic to feed them.

use ndarray::{s, Array3};

use crate::geometry::Dims2;

/// Index of the on-center kernel in [`dog_bank`]
pub const DOG_ON: usize = 0;
/// Index of the off-surround kernel in [`dog_bank`]
pub const DOG_OFF: usize = 1;
/// Index of the balanced net kernel in [`dog_bank`]
pub const DOG_NET: usize = 2;

fn gauss_density(x: f32, sigma: f32) -> f32 {
    let z = x / sigma;
    0.398_942_3 * (-0.5 * z * z).exp() / sigma
}

/// `[on, off, net]` difference-of-Gaussians bank.
///
/// Sigmas are fractions of `size`. Values outside the inscribed circle are zero.
/// `on` and `off` each sum to one; the positive and negative lobes of `net` each
/// sum to one in magnitude.
pub fn dog_bank(size: usize, on_sigma: f32, off_sigma: f32) -> Array3<f32> {
    let mut bank = Array3::<f32>::zeros((3, size, size));
    let center = 0.5 * (size as f32 - 1.0);
    let radius = 0.5 * size as f32;
    let (sig_on, sig_off) = (on_sigma * size as f32, off_sigma * size as f32);
    for y in 0..size {
        for x in 0..size {
            let dist = (x as f32 - center).hypot(y as f32 - center);
            if dist > radius {
                continue;
            }
            let on = gauss_density(dist, sig_on);
            let off = gauss_density(dist, sig_off);
            bank[[DOG_ON, y, x]] = on;
            bank[[DOG_OFF, y, x]] = off;
            bank[[DOG_NET, y, x]] = on - off;
        }
    }
    for f in [DOG_ON, DOG_OFF] {
        let sum = bank.slice(s![f, .., ..]).sum();
        if sum > 0.0 {
            bank.slice_mut(s![f, .., ..]).mapv_inplace(|v| v / sum);
        }
    }
    balance_lobes(&mut bank, DOG_NET);
    bank
}

/// `angles` Gabor kernels, angle `a` rotated by `-a * pi / angles`.
///
/// Lobes are normalized like [`dog_bank`]'s net kernel.
pub fn gabor_bank(
    size: usize,
    angles: usize,
    wavelength: f32,
    sigma_length: f32,
    sigma_width: f32,
    phase_degrees: f32,
) -> Array3<f32> {
    let mut bank = Array3::<f32>::zeros((angles, size, size));
    let center = 0.5 * (size as f32 - 1.0);
    let radius = 0.5 * size as f32;
    let len_norm = 1.0 / (2.0 * (sigma_length * size as f32).powi(2));
    let wd_norm = 1.0 / (2.0 * (sigma_width * size as f32).powi(2));
    let freq = std::f32::consts::TAU / wavelength;
    let phase = phase_degrees.to_radians();
    for a in 0..angles {
        let theta = -(a as f32) * std::f32::consts::PI / angles as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for y in 0..size {
            for x in 0..size {
                let (xf, yf) = (x as f32 - center, y as f32 - center);
                if xf.hypot(yf) > radius {
                    continue;
                }
                let nx = xf * cos_t - yf * sin_t;
                let ny = yf * cos_t + xf * sin_t;
                let envelope = (-(len_norm * nx * nx + wd_norm * ny * ny)).exp();
                bank[[a, y, x]] = envelope * (freq * ny + phase).sin();
            }
        }
        balance_lobes(&mut bank, a);
    }
    bank
}

fn balance_lobes(bank: &mut Array3<f32>, filter: usize) {
    let mut kernel = bank.slice_mut(s![filter, .., ..]);
    let pos: f32 = kernel.iter().filter(|v| **v > 0.0).sum();
    let neg: f32 = -kernel.iter().filter(|v| **v < 0.0).sum::<f32>();
    kernel.mapv_inplace(|v| {
        if v > 0.0 && pos > 0.0 {
            v / pos
        } else if v < 0.0 && neg > 0.0 {
            v / neg
        } else {
            v
        }
    });
}

/// `[channels][Y][X]` image of `background` with a filled rectangle of `value`
/// at `origin` (clipped to the content)
pub fn bar_image(
    content: Dims2,
    channels: usize,
    origin: Dims2,
    extent: Dims2,
    value: f32,
    background: f32,
) -> Array3<f32> {
    let mut image = Array3::<f32>::from_elem((channels, content.y, content.x), background);
    let y1 = (origin.y + extent.y).min(content.y);
    let x1 = (origin.x + extent.x).min(content.x);
    if origin.y < y1 && origin.x < x1 {
        image
            .slice_mut(s![.., origin.y..y1, origin.x..x1])
            .fill(value);
    }
    image
}

/// RGB image with a smooth horizontal red ramp, a vertical green ramp and a
/// constant blue level
pub fn rgb_ramp(content: Dims2, blue: f32) -> Array3<f32> {
    let (h, w) = (content.y.max(1) as f32, content.x.max(1) as f32);
    Array3::from_shape_fn((3, content.y, content.x), |(c, y, x)| match c {
        0 => x as f32 / w,
        1 => y as f32 / h,
        _ => blue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dog_lobes_balanced() {
        let bank = dog_bank(12, 0.125, 0.25);
        let net = bank.slice(s![DOG_NET, .., ..]);
        let pos: f32 = net.iter().filter(|v| **v > 0.0).sum();
        let neg: f32 = net.iter().filter(|v| **v < 0.0).sum();
        assert!((pos - 1.0).abs() < 1e-4);
        assert!((neg + 1.0).abs() < 1e-4);
        assert!((bank.slice(s![DOG_ON, .., ..]).sum() - 1.0).abs() < 1e-4);
        // on-center: the middle of the net kernel is positive
        assert!(net[[6, 6]] > 0.0);
        assert!(net[[6, 1]] < 0.0);
    }

    #[test]
    fn test_gabor_bank_shape_and_lobes() {
        let bank = gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0);
        assert_eq!(bank.dim(), (4, 6, 6));
        for a in 0..4 {
            let k = bank.slice(s![a, .., ..]);
            let pos: f32 = k.iter().filter(|v| **v > 0.0).sum();
            assert!((pos - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bar_clipped_to_content() {
        let img = bar_image(Dims2::new(10, 8), 1, Dims2::new(7, 6), Dims2::new(8, 4), 1.0, 0.0);
        assert_eq!(img.sum(), 6.0);
        assert_eq!(img[[0, 7, 9]], 1.0);
        assert_eq!(img[[0, 5, 9]], 0.0);
    }
}
