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

use anyhow::{bail, Result};
use log::{debug, info};
use ndarray::{concatenate, Axis};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use crate::chips::{Batch, BatchParams, ChipExtractor, ChipPipeline, ChipSource};
use crate::features::{FeatureSet, PropertyIndex, IMAGE_ID_PROPERTY};

/// Every batch takes a fixed quota of chips from every image, merged
/// and shuffled.  The stream ends for good as soon as one image cannot
/// fill its quota
pub struct StratifiedSampler<E: ChipExtractor> {
    pipelines: Vec<ImagePipeline<E>>,
    want_ids: bool,
    want_labels: bool,
    finished: bool,
}

struct ImagePipeline<E> {
    image_id: String,
    pipeline: ChipPipeline<E>,
}

impl<E: ChipExtractor> StratifiedSampler<E> {
    /// Quotas come from image_props weights when given, otherwise from
    /// the share of features digitized on each image.  Images that
    /// cannot produce a single usable chip are dropped up front, the
    /// unassigned rest of the batch goes to one random remaining image
    pub fn new<S: ChipSource<Extractor = E>>(
        source: &S,
        features: &FeatureSet,
        params: &BatchParams,
        image_props: Option<&BTreeMap<String, f64>>,
    ) -> Result<StratifiedSampler<E>> {
        let quotas = match image_props {
            Some(props) => user_quotas(props, params.batch_size)?,
            None => empirical_quotas(features, params.batch_size)?,
        };

        let mut extractors = Vec::with_capacity(quotas.len());

        for (image_id, quota) in quotas {
            let extractor = source.open_extractor(&image_id)?;

            let supply = extractor.admissible_count(params.min_chip_hw, params.max_chip_hw);

            if supply == 0 {
                debug!("Image {} has no usable chips, dropping it", image_id);
                continue;
            }

            extractors.push((image_id, quota, extractor));
        }

        if extractors.is_empty() {
            bail!("No image can contribute chips, check the collection and the size bounds");
        }

        let assigned: usize = extractors.iter().map(|(_, quota, _)| quota).sum();

        if assigned < params.batch_size {
            let shortfall = params.batch_size - assigned;
            let lucky = thread_rng().gen_range(0..extractors.len());
            extractors[lucky].1 += shortfall;

            debug!(
                "Assigning {} leftover batch slots to image {}",
                shortfall, extractors[lucky].0
            );
        }

        let pipelines = extractors
            .into_iter()
            .map(|(image_id, quota, extractor)| {
                info!("Image {} contributes {} chips per batch", image_id, quota);

                ImagePipeline {
                    image_id,
                    pipeline: ChipPipeline::new(extractor, quota, params, false),
                }
            })
            .collect();

        Ok(StratifiedSampler {
            pipelines,
            want_ids: params.return_ids,
            want_labels: params.return_labels,
            finished: false,
        })
    }
}

impl<E: ChipExtractor> Iterator for StratifiedSampler<E> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut parts = Vec::with_capacity(self.pipelines.len());

        for entry in &mut self.pipelines {
            match entry.pipeline.next() {
                Some(Ok(batch)) => parts.push(batch),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    debug!("Image {} is exhausted, ending the stream", entry.image_id);
                    self.finished = true;
                    return None;
                }
            }
        }

        Some(merge_and_shuffle(parts, self.want_ids, self.want_labels))
    }
}

fn user_quotas(
    image_props: &BTreeMap<String, f64>,
    batch_size: usize,
) -> Result<Vec<(String, usize)>> {
    let total: f64 = image_props.values().sum();

    if total <= 0.0 {
        bail!("Image proportions must sum to a positive value");
    }

    Ok(image_props
        .iter()
        .map(|(image_id, weight)| {
            let quota = ((weight / total) * batch_size as f64) as usize;
            (image_id.clone(), quota)
        })
        .filter(|(_, quota)| *quota > 0)
        .collect())
}

fn empirical_quotas(features: &FeatureSet, batch_size: usize) -> Result<Vec<(String, usize)>> {
    let index = PropertyIndex::build(features, IMAGE_ID_PROPERTY);

    let mut quotas = Vec::with_capacity(index.num_values());

    for image_id in index.distinct_values() {
        let quota = (index.proportion(image_id)? * batch_size as f64) as usize;

        if quota > 0 {
            quotas.push((image_id.to_string(), quota));
        }
    }

    Ok(quotas)
}

/// One training batch out of the per image parts, rows shuffled so the
/// images are interleaved
fn merge_and_shuffle(parts: Vec<Batch>, want_ids: bool, want_labels: bool) -> Result<Batch> {
    let pixel_views: Vec<_> = parts.iter().map(|b| b.pixels.view()).collect();
    let merged_pixels = concatenate(Axis(0), &pixel_views)?;

    let num_chips = merged_pixels.shape()[0];

    let mut order: Vec<usize> = (0..num_chips).collect();
    order.shuffle(&mut thread_rng());

    let pixels = merged_pixels.select(Axis(0), &order);

    let feature_ids = if want_ids {
        let merged: Vec<String> = parts
            .iter()
            .flat_map(|b| b.feature_ids.as_deref().unwrap_or(&[]).iter().cloned())
            .collect();

        Some(order.iter().map(|&i| merged[i].clone()).collect())
    } else {
        None
    };

    let labels = if want_labels {
        let label_views: Vec<_> = parts
            .iter()
            .filter_map(|b| b.labels.as_ref().map(|l| l.view()))
            .collect();

        let merged_labels = concatenate(Axis(0), &label_views)?;

        Some(merged_labels.select(Axis(0), &order))
    } else {
        None
    };

    Ok(Batch {
        pixels,
        feature_ids,
        labels,
    })
}
