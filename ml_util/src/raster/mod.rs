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
use std::path::{Path, PathBuf};

use anyhow::Result;
use gdal::raster::RasterBand;
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};

mod algo;
mod raster_stats;

//#[cfg(test)]
mod test_util;

pub use algo::*;
pub use raster_stats::*;
//#[cfg(test)]
pub use test_util::*;

pub struct Raster
{
    pub path: PathBuf,
    pub stats: RasterStats,
    pub dataset: Dataset,
}

impl Raster {
    pub fn read(path: &Path) -> Result<Raster> {
        let dataset = Dataset::open(path)?;

        let stats = RasterStats::read(&dataset)?;

        Ok(Raster {
            path: path.to_path_buf(),
            stats,
            dataset,
        })
    }

    /// Opens in update mode so bands can be written
    pub fn update(path: &Path) -> Result<Raster> {
        let dataset = Dataset::open_ex(path, DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE,
            ..Default::default()
        })?;

        let stats = RasterStats::read(&dataset)?;

        Ok(Raster {
            path: path.to_path_buf(),
            stats,
            dataset,
        })
    }

    /// 1 based, like gdal
    pub fn band(&self, band_index: isize) -> Result<RasterBand> {
        Ok(self.dataset.rasterband(band_index)?)
    }

    pub fn num_bands(&self) -> isize {
        self.dataset.raster_count()
    }
}
