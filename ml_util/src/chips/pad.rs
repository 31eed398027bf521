/*
This file is part of the Chip Extraction Tool
Copyright (C) 2022 Novel-T

The Chip Extraction Tool is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use ndarray::{s, Array2, Array3, ArrayViewMut3};

#[derive(Debug, Clone)]
pub struct PadParams {
    pub min_chip_hw: usize,

    //also the side length of the padded output
    pub max_chip_hw: usize,
    pub normalize: bool,
}

pub fn fits_size_bounds(
    num_rows: usize,
    num_cols: usize,
    min_chip_hw: usize,
    max_chip_hw: usize,
) -> bool {
    num_rows.min(num_cols) >= min_chip_hw && num_rows.max(num_cols) <= max_chip_hw
}

/// Zeroes every pixel whose center is outside the polygon, all bands
pub fn apply_chip_mask(mut pixels: ArrayViewMut3<f64>, mask: &Array2<bool>) {
    assert_eq!(&pixels.shape()[1..], mask.shape());

    for ((_, row, col), v) in pixels.indexed_iter_mut() {
        if !mask[[row, col]] {
            *v = 0.0;
        }
    }
}

/// Drops chips outside the size bounds, centers the rest on a square
/// of zeros with side max_chip_hw.  Odd leftovers pad the trailing
/// edge.  Division by 255 happens after padding so the border stays 0
pub fn filter_and_pad(
    pixels: &Array3<f64>,
    mask: Option<&Array2<bool>>,
    params: &PadParams,
) -> Option<Array3<f64>> {
    let num_bands = pixels.shape()[0];
    let num_rows = pixels.shape()[1];
    let num_cols = pixels.shape()[2];

    if !fits_size_bounds(num_rows, num_cols, params.min_chip_hw, params.max_chip_hw) {
        return None;
    }

    let side = params.max_chip_hw;

    let pad_top = (side - num_rows) / 2;
    let pad_left = (side - num_cols) / 2;

    let mut padded = Array3::zeros((num_bands, side, side));

    {
        let mut target = padded.slice_mut(s![
            ..,
            pad_top..pad_top + num_rows,
            pad_left..pad_left + num_cols
        ]);

        target.assign(pixels);

        if let Some(mask) = mask {
            apply_chip_mask(target, mask);
        }
    }

    if params.normalize {
        padded.mapv_inplace(|v| v / 255.0);
    }

    Some(padded)
}

#[cfg(test)]
mod pad_tests {
    use super::*;
    use crate::raster::float_within_eps;

    fn no_normalize(min_chip_hw: usize, max_chip_hw: usize) -> PadParams {
        PadParams {
            min_chip_hw,
            max_chip_hw,
            normalize: false,
        }
    }

    #[test]
    fn test_fits_size_bounds() {
        assert!(fits_size_bounds(50, 50, 0, 125));
        assert!(fits_size_bounds(125, 125, 0, 125));
        assert!(fits_size_bounds(1, 125, 0, 125));

        //either side over the cap rejects
        assert!(!fits_size_bounds(200, 10, 0, 125));
        assert!(!fits_size_bounds(10, 200, 0, 125));
        assert!(!fits_size_bounds(126, 126, 0, 125));

        //either side under the floor rejects
        assert!(!fits_size_bounds(3, 50, 4, 125));
        assert!(!fits_size_bounds(50, 3, 4, 125));
    }

    #[test]
    fn test_pad_is_centered_with_trailing_remainder() {
        //3 x 4 chip on a 10 x 10 square
        let pixels = Array3::from_elem((2, 3, 4), 5.0);

        let padded = filter_and_pad(&pixels, None, &no_normalize(0, 10)).unwrap();

        assert_eq!(padded.shape(), &[2, 10, 10]);

        //7 spare rows split 3 leading 4 trailing, 6 spare cols split 3 and 3
        assert_eq!(0.0, padded[[0, 2, 3]]);
        assert_eq!(5.0, padded[[0, 3, 3]]);
        assert_eq!(5.0, padded[[0, 5, 6]]);
        assert_eq!(0.0, padded[[0, 6, 3]]);

        assert_eq!(0.0, padded[[0, 3, 2]]);
        assert_eq!(0.0, padded[[0, 3, 7]]);

        //both bands carry the values
        assert_eq!(5.0, padded[[1, 4, 4]]);

        let total: f64 = padded.sum();
        assert_eq!(2.0 * 12.0 * 5.0, total);
    }

    #[test]
    fn test_filter_rejects_out_of_bounds_chips() {
        let too_wide = Array3::from_elem((1, 10, 200), 1.0);
        assert!(filter_and_pad(&too_wide, None, &no_normalize(0, 125)).is_none());

        let too_small = Array3::from_elem((1, 3, 50), 1.0);
        assert!(filter_and_pad(&too_small, None, &no_normalize(4, 125)).is_none());
    }

    #[test]
    fn test_pad_is_idempotent() {
        let pixels = Array3::from_elem((1, 3, 4), 5.0);
        let params = no_normalize(0, 10);

        let once = filter_and_pad(&pixels, None, &params).unwrap();
        let twice = filter_and_pad(&once, None, &params).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_zeroes_outside_pixels() {
        let pixels = Array3::from_elem((2, 2, 2), 9.0);

        let mask = Array2::from_shape_fn((2, 2), |(row, col)| row == 0 || col == 0);

        let padded = filter_and_pad(&pixels, Some(&mask), &no_normalize(0, 4)).unwrap();

        //chip lands at rows 1..3, cols 1..3
        assert_eq!(9.0, padded[[0, 1, 1]]);
        assert_eq!(9.0, padded[[0, 1, 2]]);
        assert_eq!(9.0, padded[[0, 2, 1]]);
        assert_eq!(0.0, padded[[0, 2, 2]]);
        assert_eq!(0.0, padded[[1, 2, 2]]);
    }

    #[test]
    fn test_normalize_divides_after_padding() {
        let pixels = Array3::from_elem((1, 2, 2), 51.0);

        let params = PadParams {
            min_chip_hw: 0,
            max_chip_hw: 4,
            normalize: true,
        };

        let padded = filter_and_pad(&pixels, None, &params).unwrap();

        assert!(float_within_eps(0.2, padded[[0, 1, 1]], 1e-12));
        assert_eq!(0.0, padded[[0, 0, 0]]);
    }
}
