// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Noisy X-over-X-plus-1 rate code: a saturating activation convolved with
//! Gaussian noise, approximated by a sigmoid below threshold, a linear bridge near
//! threshold and a gain-corrected XX1 above.

/// Noisy XX1 activation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nxx1Params {
    /// Firing threshold on normalized membrane potential
    pub thr: f32,
    /// Gain of the XX1 function
    pub gain: f32,
    /// Variance of the convolving noise
    pub nvar: f32,
    /// Multiplier on the sigmoid below threshold
    pub sig_mult: f32,
    pub sig_mult_pow: f32,
    pub sig_gain: f32,
    /// Width of the linear interpolation region above threshold
    pub interp_range: f32,
    /// Range (in NVar units) over which gain correction fades out
    pub gain_cor_range: f32,
    pub gain_cor: f32,

    // derived by update()
    pub sig_gain_nvar: f32,
    pub sig_mult_eff: f32,
    pub sig_val_at_0: f32,
    pub interp_val: f32,
}

impl Default for Nxx1Params {
    fn default() -> Self {
        let mut p = Self {
            thr: 0.5,
            gain: 100.0,
            nvar: 0.005,
            sig_mult: 0.33,
            sig_mult_pow: 0.8,
            sig_gain: 3.0,
            interp_range: 0.01,
            gain_cor_range: 10.0,
            gain_cor: 0.1,
            sig_gain_nvar: 0.0,
            sig_mult_eff: 0.0,
            sig_val_at_0: 0.0,
            interp_val: 0.0,
        };
        p.update();
        p
    }
}

impl Nxx1Params {
    pub fn update(&mut self) {
        self.sig_gain_nvar = self.sig_gain / self.nvar;
        self.sig_mult_eff = self.sig_mult * (self.gain * self.nvar).powf(self.sig_mult_pow);
        self.sig_val_at_0 = 0.5 * self.sig_mult_eff;
        self.interp_val = self.xx1_gain_cor(self.interp_range) - self.sig_val_at_0;
    }

    #[inline]
    pub fn xx1(&self, x: f32) -> f32 {
        x / (x + 1.0)
    }

    /// XX1 with gain reduced close to threshold
    #[inline]
    pub fn xx1_gain_cor(&self, x: f32) -> f32 {
        let gain_cor_fact = (self.gain_cor_range - (x / self.nvar)) / self.gain_cor_range;
        if gain_cor_fact < 0.0 {
            return self.xx1(self.gain * x);
        }
        let new_gain = self.gain * (1.0 - self.gain_cor * gain_cor_fact);
        self.xx1(new_gain * x)
    }

    /// Activation for `x` = excitation above threshold
    #[inline]
    pub fn noisy_xx1(&self, x: f32) -> f32 {
        if x < 0.0 {
            let ex = -(x * self.sig_gain_nvar);
            if ex > 50.0 {
                return 0.0;
            }
            self.sig_mult_eff / (1.0 + ex.exp())
        } else if x < self.interp_range {
            let interp = 1.0 - ((self.interp_range - x) / self.interp_range);
            self.sig_val_at_0 + interp * self.interp_val
        } else {
            self.xx1_gain_cor(x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_continuous_at_region_boundaries() {
        let p = Nxx1Params::default();
        assert_relative_eq!(p.noisy_xx1(-1e-7), p.noisy_xx1(0.0), epsilon = 1e-3);
        let below = p.noisy_xx1(p.interp_range - 1e-6);
        let above = p.noisy_xx1(p.interp_range);
        assert_relative_eq!(below, above, epsilon = 1e-3);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let p = Nxx1Params::default();
        let mut last = 0.0;
        for i in -100..400 {
            let x = i as f32 * 0.001;
            let y = p.noisy_xx1(x);
            assert!(y >= last - 1e-6, "not monotonic at {}", x);
            assert!((0.0..1.0).contains(&y));
            last = y;
        }
        assert_eq!(p.noisy_xx1(-1.0), 0.0);
    }
}
