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
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use gdal::raster::{Buffer, GdalDataType};
use structopt::StructOpt;

use ml_util::raster::{create_empty_raster, Raster};
use ml_util::util::{format_duration, print_remaining_time};

#[derive(StructOpt)]
pub struct ApplyMaskArgs {
    #[structopt(long, parse(from_os_str), help="Source image")]
    pub(crate) image: PathBuf,

    #[structopt(long, parse(from_os_str), help="Single band raster, 0 blanks the source pixel")]
    pub(crate) mask: PathBuf,

    #[structopt(long, parse(from_os_str), help="Byte typed masked output")]
    pub(crate) output: PathBuf,
}

/// Blanks every image pixel where the mask raster is 0, writing bytes.
/// Works row by row so image sized rasters never sit in memory
pub fn apply_mask(args: &ApplyMaskArgs) -> Result<()> {
    let now = Instant::now();
    let mut last_output = Instant::now();

    let image = Raster::read(&args.image)?;
    let mask = Raster::read(&args.mask)?;

    if image.stats.num_cols != mask.stats.num_cols || image.stats.num_rows != mask.stats.num_rows {
        bail!(
            "Image is {}x{} but the mask is {}x{}",
            image.stats.num_rows,
            image.stats.num_cols,
            mask.stats.num_rows,
            mask.stats.num_cols
        );
    }

    if !image.stats.is_aligned(&mask.stats) {
        bail!("Image and mask do not share a grid");
    }

    let mut out_stats = image.stats.clone();
    out_stats.gdal_type = GdalDataType::UInt8;
    out_stats.no_data_value = None;

    let num_bands = image.num_bands();

    create_empty_raster::<u8>(&args.output, &out_stats, num_bands, false)?;

    let output = Raster::update(&args.output)?;

    let num_cols = image.stats.num_cols as usize;
    let num_rows = image.stats.num_rows;

    let mask_band = mask.band(1)?;

    let mut image_bands = Vec::with_capacity(num_bands as usize);
    let mut out_bands = Vec::with_capacity(num_bands as usize);

    for band_index in 1..=num_bands {
        image_bands.push(image.band(band_index)?);
        out_bands.push(output.band(band_index)?);
    }

    for row in 0..num_rows {
        let mask_values = mask_band.read_as::<f64>(
            (0, row as isize),
            (num_cols, 1),
            (num_cols, 1),
            None,
        )?;

        for (in_band, out_band) in image_bands.iter().zip(out_bands.iter_mut()) {
            let values = in_band.read_as::<f64>(
                (0, row as isize),
                (num_cols, 1),
                (num_cols, 1),
                None,
            )?;

            let masked: Vec<u8> = values
                .data
                .iter()
                .zip(mask_values.data.iter())
                .map(|(&v, &m)| if m != 0.0 { v as u8 } else { 0 })
                .collect();

            out_band.write((0, row as isize), (num_cols, 1), &Buffer::new((num_cols, 1), masked))?;
        }

        if last_output.elapsed().as_secs() >= 3 {
            last_output = Instant::now();
            print_remaining_time(&now, row, num_rows);
        }
    }

    println!(
        "Wrote {:?} in {}",
        &args.output,
        format_duration(now.elapsed())
    );

    Ok(())
}

#[cfg(test)]
mod apply_mask_tests {
    use super::*;

    use ml_util::raster::{create_test_raster, get_temp_filename, RasterStats};

    fn test_stats(num_rows: u32, num_cols: u32) -> RasterStats {
        RasterStats {
            origin_x: 0.0,
            origin_y: 10.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
            num_rows,
            num_cols,
            no_data_value: None,
            gdal_type: GdalDataType::UInt8,
            projection: "".to_string(),
        }
    }

    #[test]
    fn test_apply_mask() {
        let stats = test_stats(2, 3);

        let band_1: Vec<u8> = vec![
            10, 20, 30,
            40, 50, 60,
        ];
        let band_2: Vec<u8> = vec![
            1, 2, 3,
            4, 5, 6,
        ];
        //any non zero value keeps the pixel
        let mask_data: Vec<u8> = vec![
            1, 0, 255,
            0, 7, 0,
        ];

        let image_path = create_test_raster("mask_image.tif", &stats, &[band_1, band_2]).unwrap();
        let mask_path = create_test_raster("mask_mask.tif", &stats, &[mask_data]).unwrap();

        let output = get_temp_filename("masked.tif");

        apply_mask(&ApplyMaskArgs {
            image: image_path,
            mask: mask_path,
            output: output.clone(),
        })
        .unwrap();

        assert!(output.exists());

        let out = Raster::read(&output).unwrap();

        assert_eq!(2, out.num_bands());
        assert!(matches!(out.stats.gdal_type, GdalDataType::UInt8));

        let read_band = |band_index: isize| -> Vec<u8> {
            out.band(band_index)
                .unwrap()
                .read_as::<u8>((0, 0), (3, 2), (3, 2), None)
                .unwrap()
                .data
        };

        assert_eq!(vec![10, 0, 30, 0, 50, 0], read_band(1));
        assert_eq!(vec![1, 0, 3, 0, 5, 0], read_band(2));
    }

    #[test]
    fn test_apply_mask_checks_dimensions() {
        let band: Vec<u8> = vec![0; 6];

        let image_path =
            create_test_raster("dims_image.tif", &test_stats(2, 3), &[band.clone()]).unwrap();
        let mask_path = create_test_raster("dims_mask.tif", &test_stats(3, 2), &[band]).unwrap();

        let result = apply_mask(&ApplyMaskArgs {
            image: image_path,
            mask: mask_path,
            output: get_temp_filename("dims_out.tif"),
        });

        assert!(result.is_err());
    }
}
