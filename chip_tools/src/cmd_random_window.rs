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
use gdal::raster::{GdalDataType, GdalType};
use log::info;
use rand::{thread_rng, Rng};
use structopt::StructOpt;

use ml_util::raster::{create_empty_raster_like, Raster};
use ml_util::util::{format_duration, print_remaining_time};

#[derive(StructOpt)]
pub struct RandomWindowArgs {
    #[structopt(long, parse(from_os_str), help="Source GeoTIFF")]
    pub(crate) image: PathBuf,

    #[structopt(long, parse(from_os_str), help="Window GeoTIFFs land here")]
    pub(crate) out_dir: PathBuf,

    #[structopt(long, default_value = "125")]
    pub(crate) num_rows: usize,

    #[structopt(long, default_value = "125")]
    pub(crate) num_cols: usize,

    #[structopt(long, default_value = "10000", help="How many windows to cut")]
    pub(crate) count: usize,
}

/// Cuts count windows out of the image, uniformly placed, for negative
/// training examples.  Each window keeps the source band type and grid
pub fn random_windows(args: &RandomWindowArgs) -> Result<()> {
    let now = Instant::now();
    let mut last_output = Instant::now();

    let raster = Raster::read(&args.image)?;
    let stats = &raster.stats;

    if args.num_cols > stats.num_cols as usize || args.num_rows > stats.num_rows as usize {
        bail!(
            "A {}x{} window does not fit the {}x{} image",
            args.num_rows,
            args.num_cols,
            stats.num_rows,
            stats.num_cols
        );
    }

    info!(
        "Cutting {} windows of {}x{} out of {:?}",
        args.count, args.num_rows, args.num_cols, &args.image
    );

    let num_bands = raster.num_bands();

    let max_x = stats.num_cols as usize - args.num_cols;
    let max_y = stats.num_rows as usize - args.num_rows;

    let mut rng = thread_rng();

    for window_number in 0..args.count {
        let raster_x = rng.gen_range(0..=max_x) as i32;
        let raster_y = rng.gen_range(0..=max_y) as i32;

        let window_stats = stats.window_stats(
            raster_x,
            raster_y,
            args.num_cols as u32,
            args.num_rows as u32,
        );

        let out_path = args.out_dir.join(format!("window_{:06}.tif", window_number));

        create_empty_raster_like(&out_path, &window_stats, num_bands, false)?;

        let out_raster = Raster::update(&out_path)?;

        match stats.gdal_type {
            GdalDataType::UInt8 => copy_window::<u8>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::UInt16 => copy_window::<u16>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::Int16 => copy_window::<i16>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::UInt32 => copy_window::<u32>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::Int32 => copy_window::<i32>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::Float32 => copy_window::<f32>(&raster, &out_raster, raster_x, raster_y)?,
            GdalDataType::Float64 => copy_window::<f64>(&raster, &out_raster, raster_x, raster_y)?,
            other => bail!("Unsupported band type {:?} for {:?}", other, &args.image),
        }

        if last_output.elapsed().as_secs() >= 3 {
            last_output = Instant::now();
            print_remaining_time(&now, window_number as u32, args.count as u32);
        }
    }

    println!(
        "Wrote {} windows to {:?} in {}",
        args.count,
        &args.out_dir,
        format_duration(now.elapsed())
    );

    Ok(())
}

/// The destination raster has the window dimensions, the source read
/// starts at raster_x, raster_y
fn copy_window<T: Copy + GdalType>(
    src: &Raster,
    dst: &Raster,
    raster_x: i32,
    raster_y: i32,
) -> Result<()> {
    let num_cols = dst.stats.num_cols as usize;
    let num_rows = dst.stats.num_rows as usize;

    for band_index in 1..=src.num_bands() {
        let src_band = src.band(band_index)?;

        let buffer = src_band.read_as::<T>(
            (raster_x as isize, raster_y as isize),
            (num_cols, num_rows),
            (num_cols, num_rows),
            None,
        )?;

        let mut dst_band = dst.band(band_index)?;
        dst_band.write((0, 0), (num_cols, num_rows), &buffer)?;
    }

    Ok(())
}
