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
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Result};
use itertools::Itertools;
use log::{debug, info};
use num::Integer;
use structopt::StructOpt;

use ml_util::chips::{
    batch_stream, write_batch_file, Batch, BatchParams, ExtractParams, GdalChipSource,
    StratifiedSampler,
};
use ml_util::features::FeatureSet;
use ml_util::util::format_duration;

#[derive(StructOpt)]
pub struct BatchesArgs {
    #[structopt(long, parse(from_os_str), help="GeoJSON collection with feature_id, class_name and image_id properties")]
    pub(crate) geojson: PathBuf,

    #[structopt(long, parse(from_os_str), help="Directory holding <image_id>.tif rasters")]
    pub(crate) image_dir: PathBuf,

    #[structopt(long, parse(from_os_str), help="Batch files land here")]
    pub(crate) out_dir: PathBuf,

    #[structopt(long, default_value = "10000")]
    pub(crate) batch_size: usize,

    #[structopt(long, default_value = "0", help="Chips with a side under this are dropped")]
    pub(crate) min_chip_hw: usize,

    #[structopt(long, default_value = "125", help="Chips with a side over this are dropped, also the padded side length")]
    pub(crate) max_chip_hw: usize,

    #[structopt(long, use_delimiter = true, default_value = "No swimming pool,Swimming pool", help="Class names in label order")]
    pub(crate) classes: Vec<String>,

    #[structopt(long, help="Leave the one hot labels out of the batches")]
    pub(crate) skip_labels: bool,

    #[structopt(long, help="Record the feature id of every chip")]
    pub(crate) with_ids: bool,

    #[structopt(long, help="Keep the pixels outside the polygon instead of zeroing them")]
    pub(crate) no_mask: bool,

    #[structopt(long, help="Keep raw pixel values instead of dividing by 255")]
    pub(crate) no_normalize: bool,

    #[structopt(long, help="Walk the images one after the other instead of stratified sampling")]
    pub(crate) sequential: bool,

    #[structopt(long, default_value = "0", help="Stop after this many batches, 0 writes everything")]
    pub(crate) num_batches: usize,

    #[structopt(long, default_value = "0", help="Extra pixels left and right of the bounding box")]
    pub(crate) buffer_x: i32,

    #[structopt(long, default_value = "0", help="Extra pixels above and below the bounding box")]
    pub(crate) buffer_y: i32,

    #[structopt(long = "prop", parse(try_from_str = parse_image_prop), help="Image weight as <image_id>=<weight>, repeatable.  Without any, weights follow the feature counts")]
    pub(crate) image_props: Vec<(String, f64)>,
}

fn parse_image_prop(raw: &str) -> Result<(String, f64)> {
    let (image_id, weight) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected <image_id>=<weight>, got {}", raw))?;

    Ok((image_id.to_string(), weight.parse()?))
}

/// Streams training batches to bincode files, stratified over the
/// images unless --sequential is passed
pub fn write_batches(args: &BatchesArgs) -> Result<()> {
    let now = Instant::now();

    let features = FeatureSet::from_geojson_file(&args.geojson)?;

    info!("Loaded {} features from {:?}", features.len(), &args.geojson);

    let params = BatchParams {
        batch_size: args.batch_size,
        min_chip_hw: args.min_chip_hw,
        max_chip_hw: args.max_chip_hw,
        classes: args.classes.clone(),
        return_labels: !args.skip_labels,
        return_ids: args.with_ids,
        normalize: !args.no_normalize,
    };

    info!("Classes in label order: {}", params.classes.iter().join(", "));

    let extract_params = ExtractParams {
        buffer_xy: (args.buffer_x, args.buffer_y),
        mask: !args.no_mask,
    };

    let source = GdalChipSource::new(&args.image_dir, &features, extract_params);

    let num_written = if args.sequential {
        //upper bound, the size filter only makes it less
        let est_batches = Integer::div_ceil(&features.len(), &args.batch_size.max(1));
        info!("Sequential stream, at most {} batches", est_batches);

        write_stream(
            batch_stream(source, &features, &params),
            &args.out_dir,
            args.num_batches,
        )?
    } else {
        let image_props = if args.image_props.is_empty() {
            None
        } else {
            Some(args.image_props.iter().cloned().collect::<BTreeMap<_, _>>())
        };

        let sampler = StratifiedSampler::new(&source, &features, &params, image_props.as_ref())?;

        write_stream(sampler, &args.out_dir, args.num_batches)?
    };

    println!(
        "Wrote {} batch files to {:?} in {}",
        num_written,
        &args.out_dir,
        format_duration(now.elapsed())
    );

    Ok(())
}

fn write_stream<I: Iterator<Item = Result<Batch>>>(
    stream: I,
    out_dir: &Path,
    num_batches: usize,
) -> Result<u32> {
    let mut num_written = 0u32;

    for batch in stream {
        let batch = batch?;

        let path = out_dir.join(format!("batch_{:04}.bin", num_written));
        write_batch_file(&path, &batch)?;

        debug!("Wrote {} chips to {:?}", batch.num_chips(), &path);

        num_written += 1;

        if num_batches > 0 && num_written as usize >= num_batches {
            break;
        }
    }

    Ok(num_written)
}
