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
use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use geo::polygon;
use ndarray::Array3;
use serde_json::json;

use crate::chips::{fits_size_bounds, ChipExtractor, ChipSource, PixelWindow, RawChip};
use crate::features::{
    FeatureRecord, FeatureSet, PropertyMap, CLASS_NAME_PROPERTY, FEATURE_ID_PROPERTY,
    IMAGE_ID_PROPERTY,
};

/// In memory chip source for tests, no rasters involved
pub struct MemoryChipSource {
    pub chips_by_image: BTreeMap<String, Vec<RawChip>>,
}

impl MemoryChipSource {
    pub fn new() -> MemoryChipSource {
        MemoryChipSource {
            chips_by_image: BTreeMap::new(),
        }
    }

    pub fn add_chip(&mut self, image_id: &str, chip: RawChip) {
        self.chips_by_image
            .entry(image_id.to_string())
            .or_insert_with(Vec::new)
            .push(chip);
    }
}

impl Default for MemoryChipSource {
    fn default() -> Self {
        MemoryChipSource::new()
    }
}

impl ChipSource for MemoryChipSource {
    type Extractor = MemoryExtractor;

    fn open_extractor(&self, image_id: &str) -> Result<MemoryExtractor> {
        let chips = self
            .chips_by_image
            .get(image_id)
            .ok_or_else(|| anyhow!("No chips staged for image {}", image_id))?
            .clone();

        Ok(MemoryExtractor { chips, pos: 0 })
    }
}

pub struct MemoryExtractor {
    chips: Vec<RawChip>,
    pos: usize,
}

impl Iterator for MemoryExtractor {
    type Item = Result<RawChip>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.chips.len() {
            return None;
        }

        let chip = self.chips[self.pos].clone();
        self.pos += 1;

        Some(Ok(chip))
    }
}

impl ChipExtractor for MemoryExtractor {
    fn admissible_count(&self, min_chip_hw: usize, max_chip_hw: usize) -> usize {
        self.chips[self.pos..]
            .iter()
            .filter(|c| fits_size_bounds(c.num_rows(), c.num_cols(), min_chip_hw, max_chip_hw))
            .count()
    }
}

/// A chip with the class and id properties set, pixels a constant fill
pub fn test_chip(
    feature_id: &str,
    class_name: &str,
    num_bands: usize,
    num_rows: usize,
    num_cols: usize,
    fill: f64,
) -> RawChip {
    let mut properties = PropertyMap::new();
    properties.insert(FEATURE_ID_PROPERTY.to_string(), json!(feature_id));
    properties.insert(CLASS_NAME_PROPERTY.to_string(), json!(class_name));

    RawChip {
        pixels: Array3::from_elem((num_bands, num_rows, num_cols), fill),
        mask: None,
        window: PixelWindow {
            raster_x: 0,
            raster_y: 0,
            num_cols,
            num_rows,
        },
        properties,
    }
}

/// A feature set with the given number of unit squares per image, ids
/// <image_id>_<n>
pub fn test_feature_set(image_chip_counts: &[(&str, usize)]) -> FeatureSet {
    let mut records = Vec::new();

    for (image_id, count) in image_chip_counts {
        for i in 0..*count {
            let mut properties = PropertyMap::new();
            properties.insert(
                FEATURE_ID_PROPERTY.to_string(),
                json!(format!("{}_{}", image_id, i)),
            );
            properties.insert(IMAGE_ID_PROPERTY.to_string(), json!(image_id));

            records.push(FeatureRecord {
                polygon: polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 1.0),
                ],
                properties,
            });
        }
    }

    FeatureSet { records }
}
