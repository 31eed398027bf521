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

use anyhow::Result;
use gdal::raster::{Buffer, GdalType};
use uuid::Uuid;

use crate::raster::{create_empty_raster, Raster, RasterStats};

pub fn get_temp_filename(file_name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(Uuid::new_v4().to_string());
    p.push(file_name);
    p
}

/// Writes a small raster to a fresh temp path, one Vec per band, row major
pub fn create_test_raster<T:Copy + GdalType>(in_file_name: &str, input_raster_stats: &RasterStats, band_data: &[Vec<T>]) -> Result<PathBuf> {

    let input_path = get_temp_filename(in_file_name);

    assert!(!input_path.exists());
    assert!(!band_data.is_empty());

    create_empty_raster::<T>(&input_path, input_raster_stats, band_data.len() as isize, false)?;

    assert!(input_path.exists());

    {
        let input_raster = Raster::update(&input_path)?;

        let num_rows = input_raster_stats.num_rows as usize;
        let num_cols = input_raster_stats.num_cols as usize;

        for (band_index, data) in band_data.iter().enumerate() {
            assert_eq!(data.len(), num_rows * num_cols);

            let mut band = input_raster.band(band_index as isize + 1)?;
            band.write((0, 0), (num_cols, num_rows),
                       &Buffer::new((num_cols, num_rows), data.clone()))?;
        }
    }

    Ok(input_path)
}
