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
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;
use structopt::StructOpt;

use ml_util::chips::{apply_chip_mask, ChipSource, ExtractParams, GdalChipSource};
use ml_util::features::{
    property_string, FeatureSet, PropertyIndex, CLASS_NAME_PROPERTY, FEATURE_ID_PROPERTY,
    IMAGE_ID_PROPERTY,
};
use ml_util::raster::write_chip_raster;
use ml_util::util::{format_duration, print_remaining_time};

#[derive(StructOpt)]
pub struct ExtractArgs {
    #[structopt(long, parse(from_os_str), help="GeoJSON collection with feature_id, class_name and image_id properties")]
    pub(crate) geojson: PathBuf,

    #[structopt(long, parse(from_os_str), help="Directory holding <image_id>.tif rasters")]
    pub(crate) image_dir: PathBuf,

    #[structopt(long, parse(from_os_str), help="Chips and manifest.csv land here")]
    pub(crate) out_dir: PathBuf,

    #[structopt(long, default_value = "0", help="Extra pixels left and right of the bounding box")]
    pub(crate) buffer_x: i32,

    #[structopt(long, default_value = "0", help="Extra pixels above and below the bounding box")]
    pub(crate) buffer_y: i32,

    #[structopt(long, help="Skip features without a class name")]
    pub(crate) require_class: bool,

    #[structopt(long, help="Zero the pixels outside the polygon")]
    pub(crate) mask: bool,
}

#[derive(Serialize)]
struct ManifestRow {
    chip: String,
    feature_id: String,
    class_name: String,
    image_id: String,
    num_rows: usize,
    num_cols: usize,
}

/// Cuts one GeoTIFF per polygon, raw pixels, no size filter and no
/// padding.  The manifest csv links each chip back to its feature
pub fn extract_chips(args: &ExtractArgs) -> Result<()> {
    let now = Instant::now();
    let mut last_output = Instant::now();

    let features = FeatureSet::from_geojson_file(&args.geojson)?;
    let image_index = PropertyIndex::build(&features, IMAGE_ID_PROPERTY);

    info!(
        "Loaded {} features over {} images",
        features.len(),
        image_index.num_values()
    );

    //features without an image never produce a chip
    let num_total: u32 = image_index
        .distinct_values()
        .map(|v| image_index.count(v) as u32)
        .sum();

    let params = ExtractParams {
        buffer_xy: (args.buffer_x, args.buffer_y),
        mask: args.mask,
    };

    let source = GdalChipSource::new(&args.image_dir, &features, params);

    create_dir_all(&args.out_dir)?;
    let mut manifest = csv::Writer::from_path(args.out_dir.join("manifest.csv"))?;

    let mut num_processed = 0u32;
    let mut num_written = 0u32;

    for image_id in image_index.distinct_values() {
        info!("Extracting chips from image {}", image_id);

        let mut extractor = source.open_extractor(image_id)?;
        let image_features = extractor.num_features() as u32;
        let image_stats = extractor.stats().clone();

        while let Some(chip_result) = extractor.next() {
            let mut chip = chip_result?;

            let class_name = property_string(&chip.properties, CLASS_NAME_PROPERTY);

            if args.require_class && class_name.is_none() {
                debug!("Skipping a chip of {} without a class", image_id);
                continue;
            }

            if let Some(mask) = &chip.mask {
                apply_chip_mask(chip.pixels.view_mut(), mask);
            }

            let chip_stats = image_stats.window_stats(
                chip.window.raster_x,
                chip.window.raster_y,
                chip.window.num_cols as u32,
                chip.window.num_rows as u32,
            );

            let chip_file = format!("{:06}.tif", num_written);
            write_chip_raster(&args.out_dir.join(&chip_file), &chip_stats, &chip.pixels)?;

            manifest.serialize(ManifestRow {
                chip: chip_file,
                feature_id: property_string(&chip.properties, FEATURE_ID_PROPERTY)
                    .unwrap_or_default(),
                class_name: class_name.unwrap_or_default(),
                image_id: image_id.to_string(),
                num_rows: chip.num_rows(),
                num_cols: chip.num_cols(),
            })?;

            num_written += 1;

            if last_output.elapsed().as_secs() >= 3 {
                last_output = Instant::now();

                let consumed = image_features - extractor.size_hint().1.unwrap_or(0) as u32;
                print_remaining_time(&now, num_processed + consumed, num_total);
            }
        }

        num_processed += image_features;
    }

    manifest.flush()?;

    println!(
        "Wrote {} chips from {} images in {}",
        num_written,
        image_index.num_values(),
        format_duration(now.elapsed())
    );

    Ok(())
}
