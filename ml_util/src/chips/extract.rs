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

use anyhow::{Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{Point, Polygon};
use log::debug;
use ndarray::{stack, Array2, Array3, Axis};

use crate::chips::fits_size_bounds;
use crate::features::{property_string, FeatureSet, PropertyMap, IMAGE_ID_PROPERTY};
use crate::raster::{Raster, RasterStats};

/// Pixel aligned read window, fully inside the raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelWindow {
    pub raster_x: i32,
    pub raster_y: i32,
    pub num_cols: usize,
    pub num_rows: usize,
}

/// One feature read out of a raster, pixels in band/row/col order
#[derive(Clone)]
pub struct RawChip {
    pub pixels: Array3<f64>,

    //true where the pixel center falls inside the polygon
    pub mask: Option<Array2<bool>>,
    pub window: PixelWindow,
    pub properties: PropertyMap,
}

impl RawChip {
    pub fn num_bands(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn num_rows(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn num_cols(&self) -> usize {
        self.pixels.shape()[2]
    }
}

#[derive(Debug, Clone)]
pub struct ExtractParams {
    //extra pixels on each side of the bounding box
    pub buffer_xy: (i32, i32),
    pub mask: bool,
}

impl Default for ExtractParams {
    fn default() -> Self {
        ExtractParams {
            buffer_xy: (0, 0),
            mask: true,
        }
    }
}

/// Pixel window covering the polygon bounding box plus the buffer.
/// None when the window would stick out of the raster, partial reads
/// would need fill values
pub fn chip_window(
    stats: &RasterStats,
    polygon: &Polygon<f64>,
    buffer_xy: (i32, i32),
) -> Option<PixelWindow> {
    let rect = polygon.bounding_rect()?;

    let (buffer_x, buffer_y) = buffer_xy;

    let x0 = stats.calc_x(rect.min().x) - buffer_x;
    let x1 = stats.calc_x(rect.max().x) + buffer_x;

    //max y is the top of the box, pixel height is negative
    let y0 = stats.calc_y(rect.max().y) - buffer_y;
    let y1 = stats.calc_y(rect.min().y) + buffer_y;

    if x1 < x0 || y1 < y0 {
        return None;
    }

    if x0 < 0 || y0 < 0 || x1 >= stats.num_cols as i32 || y1 >= stats.num_rows as i32 {
        return None;
    }

    Some(PixelWindow {
        raster_x: x0,
        raster_y: y0,
        num_cols: (x1 - x0 + 1) as usize,
        num_rows: (y1 - y0 + 1) as usize,
    })
}

/// Yields chips for one image, ending the stream on the first read error
pub trait ChipExtractor: Iterator<Item = Result<RawChip>> {
    /// How many remaining features would survive the window and size
    /// checks, from geometry alone, without touching pixels
    fn admissible_count(&self, min_chip_hw: usize, max_chip_hw: usize) -> usize;
}

/// Opens per image extractors by image id
pub trait ChipSource {
    type Extractor: ChipExtractor;

    fn open_extractor(&self, image_id: &str) -> Result<Self::Extractor>;
}

/// Reads chips from GeoTiffs named <image_dir>/<image_id>.tif
pub struct GdalChipSource<'a> {
    image_dir: PathBuf,
    features: &'a FeatureSet,
    params: ExtractParams,
}

impl<'a> GdalChipSource<'a> {
    pub fn new(image_dir: &Path, features: &'a FeatureSet, params: ExtractParams) -> GdalChipSource<'a> {
        GdalChipSource {
            image_dir: image_dir.to_path_buf(),
            features,
            params,
        }
    }

    pub fn image_path(&self, image_id: &str) -> PathBuf {
        self.image_dir.join(format!("{}.tif", image_id))
    }
}

impl<'a> ChipSource for GdalChipSource<'a> {
    type Extractor = GdalChipExtractor<'a>;

    fn open_extractor(&self, image_id: &str) -> Result<GdalChipExtractor<'a>> {
        GdalChipExtractor::open(
            &self.image_path(image_id),
            self.features,
            image_id,
            self.params.clone(),
        )
        .with_context(|| format!("Opening image {}", image_id))
    }
}

pub struct GdalChipExtractor<'a> {
    raster: Raster,
    image_id: String,
    features: &'a FeatureSet,

    //positions of the features digitized on this image
    feature_indexes: Vec<usize>,
    pos: usize,
    params: ExtractParams,
}

impl<'a> GdalChipExtractor<'a> {
    pub fn open(
        image_path: &Path,
        features: &'a FeatureSet,
        image_id: &str,
        params: ExtractParams,
    ) -> Result<GdalChipExtractor<'a>> {
        let raster = Raster::read(image_path)?;

        let feature_indexes = features
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                property_string(&record.properties, IMAGE_ID_PROPERTY).as_deref() == Some(image_id)
            })
            .map(|(index, _)| index)
            .collect();

        Ok(GdalChipExtractor {
            raster,
            image_id: image_id.to_string(),
            features,
            feature_indexes,
            pos: 0,
            params,
        })
    }

    pub fn stats(&self) -> &RasterStats {
        &self.raster.stats
    }

    pub fn num_features(&self) -> usize {
        self.feature_indexes.len()
    }

    fn read_window(&self, window: &PixelWindow) -> Result<Array3<f64>> {
        let num_bands = self.raster.num_bands();

        let mut band_pixels = Vec::with_capacity(num_bands as usize);

        for band_index in 1..=num_bands {
            let band = self.raster.band(band_index)?;

            let pixels = band.read_as_array::<f64>(
                (window.raster_x as isize, window.raster_y as isize),
                (window.num_cols, window.num_rows),
                (window.num_cols, window.num_rows),
                None,
            )?;

            band_pixels.push(pixels);
        }

        let views: Vec<_> = band_pixels.iter().map(|b| b.view()).collect();

        Ok(stack(Axis(0), &views)?)
    }

    fn window_mask(&self, window: &PixelWindow, polygon: &Polygon<f64>) -> Array2<bool> {
        let stats = &self.raster.stats;

        Array2::from_shape_fn((window.num_rows, window.num_cols), |(row, col)| {
            let center = stats.calc_center((
                window.raster_x + col as i32,
                window.raster_y + row as i32,
            ));
            polygon.contains(&Point::new(center[0], center[1]))
        })
    }
}

impl<'a> Iterator for GdalChipExtractor<'a> {
    type Item = Result<RawChip>;

    fn next(&mut self) -> Option<Self::Item> {
        let features = self.features;

        while self.pos < self.feature_indexes.len() {
            let record = &features.records[self.feature_indexes[self.pos]];
            self.pos += 1;

            let window = match chip_window(&self.raster.stats, &record.polygon, self.params.buffer_xy)
            {
                Some(w) => w,
                None => {
                    debug!(
                        "A feature does not fit inside image {}, skipping",
                        self.image_id
                    );
                    continue;
                }
            };

            let pixels = match self.read_window(&window) {
                Ok(p) => p,
                Err(e) => return Some(Err(e)),
            };

            let mask = if self.params.mask {
                Some(self.window_mask(&window, &record.polygon))
            } else {
                None
            };

            return Some(Ok(RawChip {
                pixels,
                mask,
                window,
                properties: record.properties.clone(),
            }));
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.feature_indexes.len() - self.pos))
    }
}

impl<'a> ChipExtractor for GdalChipExtractor<'a> {
    fn admissible_count(&self, min_chip_hw: usize, max_chip_hw: usize) -> usize {
        self.feature_indexes[self.pos..]
            .iter()
            .filter_map(|&index| {
                chip_window(
                    &self.raster.stats,
                    &self.features.records[index].polygon,
                    self.params.buffer_xy,
                )
            })
            .filter(|w| fits_size_bounds(w.num_rows, w.num_cols, min_chip_hw, max_chip_hw))
            .count()
    }
}

#[cfg(test)]
mod extract_tests {
    use super::*;
    use crate::features::FeatureRecord;
    use crate::raster::create_test_raster;
    use gdal::raster::GdalDataType;
    use geo::polygon;
    use serde_json::json;

    fn test_stats() -> RasterStats {
        RasterStats {
            origin_x: 0.0,
            origin_y: 10.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
            num_rows: 10,
            num_cols: 10,
            no_data_value: None,
            gdal_type: GdalDataType::UInt8,
            projection: "".to_string(),
        }
    }

    fn record(polygon: Polygon<f64>, feature_id: &str, image_id: &str) -> FeatureRecord {
        let mut properties = PropertyMap::new();
        properties.insert("feature_id".to_string(), json!(feature_id));
        properties.insert("image_id".to_string(), json!(image_id));
        FeatureRecord {
            polygon,
            properties,
        }
    }

    fn test_features() -> FeatureSet {
        FeatureSet {
            records: vec![
                //3 rows x 4 cols starting at raster 2,2
                record(
                    polygon![
                        (x: 2.0, y: 6.0),
                        (x: 5.0, y: 6.0),
                        (x: 5.0, y: 8.0),
                        (x: 2.0, y: 8.0),
                    ],
                    "f1",
                    "img_a",
                ),
                //sticks out of the left edge
                record(
                    polygon![
                        (x: -3.0, y: 1.0),
                        (x: 1.0, y: 1.0),
                        (x: 1.0, y: 3.0),
                        (x: -3.0, y: 3.0),
                    ],
                    "f2",
                    "img_a",
                ),
                //a different image
                record(
                    polygon![
                        (x: 1.0, y: 1.0),
                        (x: 2.0, y: 1.0),
                        (x: 2.0, y: 2.0),
                        (x: 1.0, y: 2.0),
                    ],
                    "f3",
                    "img_b",
                ),
            ],
        }
    }

    #[test]
    fn test_chip_window() {
        let stats = test_stats();

        let poly = polygon![
            (x: 2.0, y: 6.0),
            (x: 5.0, y: 6.0),
            (x: 5.0, y: 8.0),
            (x: 2.0, y: 8.0),
        ];

        let w = chip_window(&stats, &poly, (0, 0)).unwrap();
        assert_eq!(
            w,
            PixelWindow {
                raster_x: 2,
                raster_y: 2,
                num_cols: 4,
                num_rows: 3
            }
        );

        let w = chip_window(&stats, &poly, (1, 2)).unwrap();
        assert_eq!(
            w,
            PixelWindow {
                raster_x: 1,
                raster_y: 0,
                num_cols: 6,
                num_rows: 7
            }
        );

        //buffered past the top edge
        assert_eq!(None, chip_window(&stats, &poly, (1, 3)));

        //outside the left edge
        let outside = polygon![
            (x: -3.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 3.0),
            (x: -3.0, y: 3.0),
        ];
        assert_eq!(None, chip_window(&stats, &outside, (0, 0)));
    }

    #[test]
    fn test_extract_chips() {
        //band 1 encodes the pixel position, band 2 is constant
        let band_1: Vec<u8> = (0..100).map(|i| i as u8).collect();
        let band_2: Vec<u8> = vec![7; 100];

        let raster_path =
            create_test_raster("extract_chips.tif", &test_stats(), &[band_1, band_2]).unwrap();

        let features = test_features();
        let source = GdalChipSource::new(
            raster_path.parent().unwrap(),
            &features,
            ExtractParams::default(),
        );

        //the raster file name drives the image id
        assert!(source.image_path("img_a").ends_with("img_a.tif"));

        let mut extractor = GdalChipExtractor::open(
            &raster_path,
            &features,
            "img_a",
            ExtractParams::default(),
        )
        .unwrap();

        assert_eq!(2, extractor.num_features());

        //f2 never fits, f1 is the only readable chip
        assert_eq!(1, extractor.admissible_count(0, 125));
        assert_eq!(0, extractor.admissible_count(0, 2));
        assert_eq!(0, extractor.admissible_count(4, 125));

        let chip = extractor.next().unwrap().unwrap();

        assert_eq!(2, chip.num_bands());
        assert_eq!(3, chip.num_rows());
        assert_eq!(4, chip.num_cols());
        assert_eq!(
            chip.window,
            PixelWindow {
                raster_x: 2,
                raster_y: 2,
                num_cols: 4,
                num_rows: 3
            }
        );

        //band 1 value is raster_row * 10 + raster_col
        assert_eq!(22.0, chip.pixels[[0, 0, 0]]);
        assert_eq!(25.0, chip.pixels[[0, 0, 3]]);
        assert_eq!(42.0, chip.pixels[[0, 2, 0]]);
        assert_eq!(7.0, chip.pixels[[1, 1, 1]]);

        //pixel centers along the right column and bottom row fall outside
        let mask = chip.mask.as_ref().unwrap();
        assert_eq!(6, mask.iter().filter(|&&m| m).count());
        assert!(mask[[0, 0]]);
        assert!(mask[[1, 2]]);
        assert!(!mask[[0, 3]]);
        assert!(!mask[[2, 0]]);

        assert_eq!(
            Some("f1"),
            property_string(&chip.properties, "feature_id").as_deref()
        );

        //f2 is skipped, the stream ends
        assert!(extractor.next().is_none());
    }

    #[test]
    fn test_extract_without_mask() {
        let band_1: Vec<u8> = vec![3; 100];

        let raster_path =
            create_test_raster("extract_no_mask.tif", &test_stats(), &[band_1]).unwrap();

        let features = test_features();

        let mut extractor = GdalChipExtractor::open(
            &raster_path,
            &features,
            "img_a",
            ExtractParams {
                buffer_xy: (0, 0),
                mask: false,
            },
        )
        .unwrap();

        let chip = extractor.next().unwrap().unwrap();
        assert!(chip.mask.is_none());
        assert_eq!(3.0, chip.pixels[[0, 0, 0]]);
    }
}
