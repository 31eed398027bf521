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
use core::fmt;

use anyhow::Result;
use float_cmp::{ApproxEq, F64Margin};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use log::debug;

/// Helper struct to hold stats of a raster
#[derive(Debug, Clone)]
pub struct RasterStats {
    pub origin_y: f64,
    pub origin_x: f64,
    pub pixel_height: f64,
    pub pixel_width: f64,
    pub num_rows: u32,
    pub num_cols: u32,
    pub no_data_value: Option<f64>,
    pub gdal_type: GdalDataType,

    //WKT projection string
    pub projection: String
}

pub const MEDIUM_EPSILON: f64 = 1e-10;

// In lat/lon this is less than a meter
pub const LARGE_EPSILON: f64 = 1e-6;

pub fn float_within_eps(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

impl fmt::Display for RasterStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {

        write!(f, "Origin X,Y: {}, {}\nRight/Bottom: {},{}\nPixel Width/Height: {},{}\nRows: {} Cols: {}\nNo data value: {:?}\nGdal Type: {:?}\nProjection: {}",
               self.origin_x,
               self.origin_y,
            self.right_x_coord(),
            self.bottom_y_coord(),
               self.pixel_width,
                self.pixel_height,
            self.num_rows,
            self.num_cols,
            self.no_data_value,
            self.gdal_type,
            &self.projection
        )
    }
}


impl RasterStats {

    pub fn read(dataset: &Dataset) -> Result<RasterStats> {
        let geotransform = dataset.geo_transform()?;

        let pixel_width = geotransform[1];
        let pixel_height = geotransform[5];
        let origin_x = geotransform[0];
        let origin_y = geotransform[3];

        let (num_cols, num_rows) = dataset.raster_size();

        let band = dataset.rasterband(1)?;
        let no_data_value = band.no_data_value();
        let gdal_type = band.band_type();

        let projection = dataset.projection();

        Ok(RasterStats {
            origin_y,
            origin_x,
            pixel_width,
            pixel_height,
            num_cols: num_cols as u32,
            num_rows: num_rows as u32,
            no_data_value,
            gdal_type,
            projection
        })
    }

    pub fn calc_center(&self, raster_xy: (i32, i32)) -> [f64;2] {
        [self.origin_x + self.pixel_width * (raster_xy.0 as f64 + 0.5),
        self.origin_y + self.pixel_height * (raster_xy.1 as f64 + 0.5) ]
    }

    /// Calculates the left side
    /// Calculates projected x coordinate from raster_x
    pub fn calc_x_coord(&self, raster_x: i32) -> f64 {
        self.origin_x + self.pixel_width * raster_x as f64
    }
    pub fn right_x_coord(&self) -> f64 {
        self.calc_x_coord(self.num_cols as i32)
    }
    ///calculates the top side
    /// Note pixel height is negative
    pub fn calc_y_coord(&self, raster_y: i32) -> f64 {
        self.origin_y + self.pixel_height * raster_y as f64
    }
    pub fn bottom_y_coord(&self) -> f64 {
        self.calc_y_coord(self.num_rows as i32)
    }

    //Converts projected coordinate to raster_x
    pub fn calc_x(&self, x_coord: f64) -> i32 {
        ((x_coord - self.origin_x) / self.pixel_width).floor() as _
    }
    pub fn calc_y(&self, y_coord: f64) -> i32 {
        ((y_coord - self.origin_y) / self.pixel_height).floor() as _
    }

    /// Stats of a sub window, same grid and projection
    pub fn window_stats(&self, raster_x: i32, raster_y: i32, num_cols: u32, num_rows: u32) -> RasterStats {
        RasterStats {
            origin_x: self.calc_x_coord(raster_x),
            origin_y: self.calc_y_coord(raster_y),
            pixel_width: self.pixel_width,
            pixel_height: self.pixel_height,
            num_rows,
            num_cols,
            no_data_value: self.no_data_value,
            gdal_type: self.gdal_type,
            projection: self.projection.clone(),
        }
    }

    pub fn is_aligned(&self, rhs: &Self) -> bool {

        if self.projection != rhs.projection {
            debug!("Not aligned, different projection");
            return false;
        }

        if !float_within_eps(self.pixel_height, rhs.pixel_height, MEDIUM_EPSILON) ||
            !float_within_eps(self.pixel_width, rhs.pixel_width, MEDIUM_EPSILON) {
            debug!("Not aligned, different pixel sizes");
            return false;
        }

        //check the origin x difference is an integer multiple of pixel_width
        let ox_diff = (self.origin_x - rhs.origin_x) / self.pixel_width;

        let oy_diff = (self.origin_y - rhs.origin_y) / self.pixel_height;

        if !(ox_diff.round() - ox_diff).approx_eq(0.0, F64Margin{epsilon: LARGE_EPSILON, ulps: 0 }) {
            debug!("Not aligned - X: Origin diff: {} div: {}",
                     (ox_diff.round() - ox_diff),
                     ox_diff);
            return false;
        }

        if !(oy_diff.round() - oy_diff).approx_eq(0.0, F64Margin{epsilon: LARGE_EPSILON, ulps: 0 }) {
            debug!("Not aligned - Y: Origin diff: {} div: {}",
                     (oy_diff.round() - oy_diff),
                     oy_diff);
            return false;
        }

        return true;

    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn test_stats() -> RasterStats {
        RasterStats {
            origin_x: 4.0,
            origin_y: 5.0,
            pixel_height: -2.0,
            pixel_width: 1.0,
            num_rows: 4,
            num_cols: 5,
            no_data_value: None,
            gdal_type: GdalDataType::Float32,
            projection: "".to_string()
        }
    }

    #[test]
    fn test_coords() {
        let r1 = test_stats();

        assert_eq!(r1.calc_x(4.0), 0);
        assert_eq!(r1.calc_x(4.999), 0);
        assert_eq!(r1.calc_x(5.0), 1);

        assert_eq!(r1.calc_y(5.0), 0);
        assert_eq!(r1.calc_y(3.5), 0);
        assert_eq!(r1.calc_y(3.0), 1);

        assert_eq!(r1.calc_x_coord(2), 6.0);
        assert_eq!(r1.calc_y_coord(2), 1.0);
        assert_eq!(r1.right_x_coord(), 9.0);
        assert_eq!(r1.bottom_y_coord(), -3.0);

        assert_eq!(r1.calc_center((0, 0)), [4.5, 4.0]);
    }

    #[test]
    fn test_window_stats() {
        let r1 = test_stats();

        let w = r1.window_stats(2, 1, 3, 2);

        assert_eq!(w.origin_x, 6.0);
        assert_eq!(w.origin_y, 3.0);
        assert_eq!(w.num_cols, 3);
        assert_eq!(w.num_rows, 2);
        assert_eq!(w.pixel_width, r1.pixel_width);
        assert_eq!(w.pixel_height, r1.pixel_height);

        //the window keeps the source grid
        assert!(r1.is_aligned(&w));
    }

    #[test]
    fn test_is_aligned() {

        let r1 = RasterStats {
            origin_x: -13.261527777777777,
            origin_y: 35.324305555555554,
            pixel_height: -0.000277777777778,
            pixel_width: 0.000277777777778,
            num_rows: 4,
            num_cols: 5,
            no_data_value: None,
            gdal_type: GdalDataType::Float32,
            projection: "".to_string()
        };

        let r2 = RasterStats {
            origin_x: 34.908472222222223,
            origin_y: 5.457361111111111,
            pixel_height: r1.pixel_height,
            pixel_width: r1.pixel_width,
            num_rows: 3,
            num_cols: 10,
            no_data_value: None,
            gdal_type: GdalDataType::Float64,
            projection: "".to_string()
        };

        assert!(r1.is_aligned(&r2));

        let r3 = RasterStats {
            origin_x: r2.origin_x,
            origin_y: r2.origin_y + 0.05 * r2.pixel_height,
            pixel_height: r2.pixel_height,
            pixel_width: r2.pixel_width,
            num_rows: 3,
            num_cols: 10,
            no_data_value: None,
            gdal_type: GdalDataType::Float64,
            projection: "".to_string()
        };

        assert!(!r1.is_aligned(&r3));
    }
}
