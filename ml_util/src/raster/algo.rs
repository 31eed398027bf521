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
use std::fs::create_dir_all;
use std::path::Path;

use anyhow::{bail, Result};
use gdal::errors::GdalError;
use gdal::raster::{Buffer, GdalDataType, GdalType, RasterBand};
use gdal::DriverManager;
use gdal_sys::CPLErr;
use ndarray::{Array3, Axis};

use crate::raster::{Raster, RasterStats};

/// `RasterBand::fill` exists in registry gdal 0.17 but not in 0.16, which
/// this workspace pins because 0.17 removes the `read_as_array` used by
/// `chips::extract`. Backport of the 0.17 method (georust/gdal#528),
/// unchanged except for going through the public `c_rasterband()` accessor.
trait FillBand {
    fn fill(&mut self, real_value: f64, imaginary_value: Option<f64>) -> gdal::errors::Result<()>;
}

impl FillBand for RasterBand<'_> {
    fn fill(&mut self, real_value: f64, imaginary_value: Option<f64>) -> gdal::errors::Result<()> {
        let rv = unsafe {
            gdal_sys::GDALFillRaster(
                self.c_rasterband(),
                real_value,
                imaginary_value.unwrap_or(0.0),
            )
        };
        if rv != CPLErr::CE_None {
            let number = unsafe { gdal_sys::CPLGetLastErrorNo() };
            let msg = unsafe { std::ffi::CStr::from_ptr(gdal_sys::CPLGetLastErrorMsg()) }
                .to_string_lossy()
                .into_owned();
            unsafe { gdal_sys::CPLErrorReset() };
            return Err(GdalError::CplError {
                class: rv,
                number,
                msg,
            });
        }
        Ok(())
    }
}

pub fn create_empty_raster<T: Copy + GdalType>(raster_path: &Path,
                           stats: &RasterStats,
                           num_bands: isize,
    fill_with_nodata: bool
) -> Result<()>
{
    if let Some(a) = raster_path.parent() {
        if !a.exists() {
            create_dir_all(a)?;
        }
    }

    let drv = DriverManager::get_driver_by_name("GTiff")?;

    //just want to create it and close it
    let mut ds = drv.create_with_band_type::<T, _>(
        raster_path,
        stats.num_cols as isize,
        stats.num_rows as isize,
        num_bands,
        )?;

    for band_index in 1..=num_bands {
        let mut band = ds.rasterband(band_index)?;
        if let Some(no_data_value) = stats.no_data_value {
            band.set_no_data_value(Some(no_data_value))?;
            if fill_with_nodata {
                band.fill(no_data_value, None)?;
            }
        }
    }

    //because y is the top not the bottom
    assert!(stats.pixel_height < 0.0);
    ds.set_geo_transform(&[stats.origin_x, stats.pixel_width, 0.0, stats.origin_y, 0.0, stats.pixel_height])?;

    ds.set_projection(&stats.projection)?;

    Ok(())
}

/// Same as create_empty_raster but the band type comes from the stats
pub fn create_empty_raster_like(raster_path: &Path,
                           stats: &RasterStats,
                           num_bands: isize,
    fill_with_nodata: bool
) -> Result<()>
{
    match stats.gdal_type {
        GdalDataType::UInt8 => create_empty_raster::<u8>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::UInt16 => create_empty_raster::<u16>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::Int16 => create_empty_raster::<i16>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::UInt32 => create_empty_raster::<u32>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::Int32 => create_empty_raster::<i32>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::Float32 => create_empty_raster::<f32>(raster_path, stats, num_bands, fill_with_nodata),
        GdalDataType::Float64 => create_empty_raster::<f64>(raster_path, stats, num_bands, fill_with_nodata),
        other => bail!("Unsupported band type {:?} for {:?}", other, raster_path),
    }
}

/// Writes a (bands, rows, cols) tensor as a float64 GeoTIFF
pub fn write_chip_raster(raster_path: &Path, stats: &RasterStats, pixels: &Array3<f64>) -> Result<()> {
    let (num_bands, num_rows, num_cols) = pixels.dim();

    assert_eq!(num_rows, stats.num_rows as usize);
    assert_eq!(num_cols, stats.num_cols as usize);

    let mut out_stats = stats.clone();
    out_stats.gdal_type = GdalDataType::Float64;

    create_empty_raster::<f64>(raster_path, &out_stats, num_bands as isize, false)?;

    let raster = Raster::update(raster_path)?;

    for band_index in 0..num_bands {
        let data: Vec<f64> = pixels.index_axis(Axis(0), band_index).iter().copied().collect();
        let mut band = raster.band(band_index as isize + 1)?;
        band.write((0, 0), (num_cols, num_rows), &Buffer::new((num_cols, num_rows), data))?;
    }

    Ok(())
}

#[cfg(test)]
mod algo_tests {
    use super::*;
    use crate::raster::get_temp_filename;
    use ndarray::arr3;

    #[test]
    fn test_write_chip_raster() {
        let stats = RasterStats {
            origin_x: 5.0,
            origin_y: 8.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
            num_rows: 2,
            num_cols: 3,
            no_data_value: None,
            gdal_type: GdalDataType::UInt8,
            projection: "".to_string(),
        };

        let pixels = arr3(&[
            [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            [[10.0, 20.0, 30.0], [40.0, 50.0, 60.0]],
        ]);

        let path = get_temp_filename("chip.tif");
        write_chip_raster(&path, &stats, &pixels).unwrap();

        let raster = Raster::read(&path).unwrap();

        assert_eq!(2, raster.num_bands());
        //the input stats said bytes, chips are always written as doubles
        assert!(matches!(raster.stats.gdal_type, GdalDataType::Float64));
        assert_eq!(2, raster.stats.num_rows);
        assert_eq!(3, raster.stats.num_cols);

        let band_2 = raster
            .band(2)
            .unwrap()
            .read_as::<f64>((0, 0), (3, 2), (3, 2), None)
            .unwrap()
            .data;

        assert_eq!(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0], band_2);
    }
}
