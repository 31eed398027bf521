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
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geo::Polygon;
use geojson::{FeatureCollection, GeoJson};
use log::debug;
use serde_json::{Map, Value};

pub type PropertyMap = Map<String, Value>;

/// Property naming the class of a digitized polygon
pub const CLASS_NAME_PROPERTY: &str = "class_name";
/// Property carrying the unique feature id
pub const FEATURE_ID_PROPERTY: &str = "feature_id";
/// Property naming the image a polygon was digitized on.
/// The raster itself is expected at <image_dir>/<image_id>.tif
pub const IMAGE_ID_PROPERTY: &str = "image_id";

/// One digitized polygon and its properties
pub struct FeatureRecord {
    pub polygon: Polygon<f64>,
    pub properties: PropertyMap,
}

/// An in memory GeoJSON feature collection, polygons only
pub struct FeatureSet {
    pub records: Vec<FeatureRecord>,
}

impl FeatureSet {
    pub fn from_geojson_file(path: &Path) -> Result<FeatureSet> {
        let raw = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        FeatureSet::from_geojson_str(&raw).with_context(|| format!("Parsing {:?}", path))
    }

    pub fn from_geojson_str(raw: &str) -> Result<FeatureSet> {
        let geojson: GeoJson = raw.parse()?;
        let collection = FeatureCollection::try_from(geojson)?;

        let mut records = Vec::with_capacity(collection.features.len());

        for (feature_index, feature) in collection.features.into_iter().enumerate() {
            let geometry = match feature.geometry {
                Some(g) => g,
                None => {
                    debug!("Feature {} has no geometry, skipping", feature_index);
                    continue;
                }
            };

            let polygon = match Polygon::<f64>::try_from(geometry.value) {
                Ok(p) => p,
                Err(_) => {
                    debug!("Feature {} is not a polygon, skipping", feature_index);
                    continue;
                }
            };

            records.push(FeatureRecord {
                polygon,
                properties: feature.properties.unwrap_or_default(),
            });
        }

        Ok(FeatureSet { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// String view of a json property.  Strings come back as is, numbers and
/// bools are rendered, everything else (null, missing, arrays, objects)
/// is None so callers skip in an explicit branch.
pub fn property_string(properties: &PropertyMap, key: &str) -> Option<String> {
    match properties.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}
