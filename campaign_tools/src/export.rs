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

use anyhow::Result;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use log::debug;
use postgis::ewkb;
use serde_json::{json, Map};

use ml_util::features::{CLASS_NAME_PROPERTY, FEATURE_ID_PROPERTY, IMAGE_ID_PROPERTY};

/// GeoJSON feature carrying the property keys the chip extractor
/// reads.  Only the exterior ring survives, holes do not change the
/// chip window anyway
pub fn campaign_feature(
    polygon: &ewkb::Polygon,
    feature_id: &str,
    class_name: &str,
    image_id: &str,
) -> Option<Feature> {
    let ring = polygon.rings.first()?;

    let coords: Vec<Vec<f64>> = ring.points.iter().map(|p| vec![p.x, p.y]).collect();

    //a closed ring has at least 4 positions
    if coords.len() < 4 {
        debug!("Feature {} has a degenerate ring, skipping", feature_id);
        return None;
    }

    let mut properties = Map::new();
    properties.insert(FEATURE_ID_PROPERTY.to_string(), json!(feature_id));
    properties.insert(CLASS_NAME_PROPERTY.to_string(), json!(class_name));
    properties.insert(IMAGE_ID_PROPERTY.to_string(), json!(image_id));

    Some(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![coords]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

pub fn write_feature_collection(path: &Path, features: Vec<Feature>) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    fs::write(path, GeoJson::FeatureCollection(collection).to_string())?;

    Ok(())
}

#[cfg(test)]
mod export_tests {
    use super::*;
    use postgis::ewkb::{LineString, Point, Polygon};

    fn ewkb_point(x: f64, y: f64) -> Point {
        Point {
            x,
            y,
            srid: Some(4326),
        }
    }

    fn square() -> Polygon {
        Polygon {
            rings: vec![LineString {
                points: vec![
                    ewkb_point(0.0, 0.0),
                    ewkb_point(1.0, 0.0),
                    ewkb_point(1.0, 1.0),
                    ewkb_point(0.0, 0.0),
                ],
                srid: Some(4326),
            }],
            srid: Some(4326),
        }
    }

    #[test]
    fn test_campaign_feature_properties() {
        let feature = campaign_feature(&square(), "f1", "Swimming pool", "cat_1").unwrap();

        let properties = feature.properties.unwrap();
        assert_eq!("f1", properties["feature_id"]);
        assert_eq!("Swimming pool", properties["class_name"]);
        assert_eq!("cat_1", properties["image_id"]);

        match feature.geometry.unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(1, rings.len());
                assert_eq!(4, rings[0].len());
                assert_eq!(vec![1.0, 0.0], rings[0][1]);
            }
            other => panic!("Expected a polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_rings_are_dropped() {
        let empty = Polygon {
            rings: vec![],
            srid: Some(4326),
        };
        assert!(campaign_feature(&empty, "f1", "c", "i").is_none());

        let too_short = Polygon {
            rings: vec![LineString {
                points: vec![ewkb_point(0.0, 0.0), ewkb_point(1.0, 1.0)],
                srid: Some(4326),
            }],
            srid: Some(4326),
        };
        assert!(campaign_feature(&too_short, "f1", "c", "i").is_none());
    }
}
