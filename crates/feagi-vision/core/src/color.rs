// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! sRGB → LMS cone space and the opponent decompositions built on it.

use ndarray::{s, ArrayView3};

/// Channel layout written by `LmsOpponents`
pub mod opponent {
    pub const GREY: usize = 0;
    pub const RED_GREEN: usize = 1;
    pub const BLUE_YELLOW: usize = 2;
}

/// Channel layout of the two images written by `LmsComponents`
pub mod component {
    /// Long-wavelength cone, in the red-green image
    pub const RED: usize = 0;
    /// Medium-wavelength cone, in the red-green image
    pub const GREEN: usize = 1;
    /// Short-wavelength cone, in the blue-yellow image
    pub const BLUE: usize = 0;
    /// Mean of long and medium, in the blue-yellow image
    pub const YELLOW: usize = 1;
}

#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear sRGB to CIE XYZ (D65)
#[inline]
pub fn linear_to_xyz(r: f32, g: f32, b: f32) -> [f32; 3] {
    [
        0.4124 * r + 0.3576 * g + 0.1805 * b,
        0.2126 * r + 0.7152 * g + 0.0722 * b,
        0.0193 * r + 0.1192 * g + 0.9505 * b,
    ]
}

/// CIE XYZ to Hunt-Pointer-Estevez LMS
#[inline]
pub fn xyz_to_lms(xyz: [f32; 3]) -> [f32; 3] {
    let [x, y, z] = xyz;
    [
        0.38971 * x + 0.68898 * y - 0.07868 * z,
        -0.22981 * x + 1.18340 * y + 0.04641 * z,
        z,
    ]
}

#[inline]
pub fn srgb_to_lms(r: f32, g: f32, b: f32) -> [f32; 3] {
    xyz_to_lms(linear_to_xyz(
        srgb_to_linear(r),
        srgb_to_linear(g),
        srgb_to_linear(b),
    ))
}

/// `[grey, red-green, blue-yellow]`; the chromatic channels are scaled by `gain`
#[inline]
pub fn lms_opponents(lms: [f32; 3], gain: f32) -> [f32; 3] {
    let [l, m, s] = lms;
    let lm = 0.5 * (l + m);
    [lm, gain * (l - m), gain * (s - lm)]
}

/// `([L, M], [S, (L+M)/2])`, each scaled by `gain`
#[inline]
pub fn lms_components(lms: [f32; 3], gain: f32) -> ([f32; 2], [f32; 2]) {
    let [l, m, s] = lms;
    (
        [gain * l, gain * m],
        [gain * s, gain * 0.5 * (l + m)],
    )
}

/// Mean color of the `band`-wide frame around the edge of a `[channel][y][x]` image.
///
/// Used as the fade color for `FadePad`. A band covering the whole image averages
/// every pixel; an empty image reads black.
pub fn edge_average(image: ArrayView3<f32>, band: usize) -> [f32; 3] {
    let (channels, height, width) = image.dim();
    let mut out = [0.0f32; 3];
    if height == 0 || width == 0 || band == 0 {
        return out;
    }
    let band_y = band.min(height);
    let band_x = band.min(width);
    for (c, avg) in out.iter_mut().enumerate().take(channels.min(3)) {
        let plane = image.slice(s![c, .., ..]);
        let mut sum = 0.0f32;
        let mut n = 0usize;
        for ((y, x), &v) in plane.indexed_iter() {
            let on_edge = y < band_y || y >= height - band_y || x < band_x || x >= width - band_x;
            if on_edge {
                sum += v;
                n += 1;
            }
        }
        *avg = if n > 0 { sum / n as f32 } else { 0.0 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    #[test]
    fn test_grey_has_no_chroma() {
        let lms = srgb_to_lms(0.5, 0.5, 0.5);
        let opp = lms_opponents(lms, 1.0);
        assert!(opp[opponent::GREY] > 0.0);
        assert!(opp[opponent::RED_GREEN].abs() < 0.02);
    }

    #[test]
    fn test_red_is_positive_red_green() {
        let opp = lms_opponents(srgb_to_lms(1.0, 0.0, 0.0), 1.0);
        assert!(opp[opponent::RED_GREEN] > 0.0);
        let opp = lms_opponents(srgb_to_lms(0.0, 1.0, 0.0), 1.0);
        assert!(opp[opponent::RED_GREEN] < 0.0);
    }

    #[test]
    fn test_edge_average_ignores_interior() {
        let mut img = Array3::<f32>::from_elem((3, 6, 6), 0.25);
        img.slice_mut(s![.., 1..5, 1..5]).fill(1.0);
        let avg = edge_average(img.view(), 1);
        for c in avg {
            assert_relative_eq!(c, 0.25, epsilon = 1e-6);
        }
    }
}
