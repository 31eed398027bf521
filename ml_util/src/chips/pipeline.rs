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
use std::vec;

use anyhow::Result;
use log::{debug, info};

use crate::chips::{
    filter_and_pad, Batch, BatchAccumulator, ChipSource, PadParams, RawChip,
};
use crate::features::{
    property_string, ClassDict, FeatureSet, PropertyIndex, CLASS_NAME_PROPERTY,
    FEATURE_ID_PROPERTY, IMAGE_ID_PROPERTY,
};

/// Knobs shared by the sequential stream and the stratified sampler
#[derive(Debug, Clone)]
pub struct BatchParams {
    pub batch_size: usize,
    pub min_chip_hw: usize,
    pub max_chip_hw: usize,
    pub classes: Vec<String>,
    pub return_labels: bool,
    pub return_ids: bool,
    pub normalize: bool,
}

impl Default for BatchParams {
    fn default() -> Self {
        BatchParams {
            batch_size: 10_000,
            min_chip_hw: 0,
            max_chip_hw: 125,
            classes: vec!["No swimming pool".to_string(), "Swimming pool".to_string()],
            return_labels: true,
            return_ids: false,
            normalize: true,
        }
    }
}

impl BatchParams {
    pub fn pad_params(&self) -> PadParams {
        PadParams {
            min_chip_hw: self.min_chip_hw,
            max_chip_hw: self.max_chip_hw,
            normalize: self.normalize,
        }
    }

    pub fn class_dict(&self) -> ClassDict {
        ClassDict::new(&self.classes)
    }
}

/// Runs raw chips through the size filter, the padder and the
/// accumulator, yielding batches of target_size.  The final partial
/// batch only comes out when emit_final_partial is set, the stratified
/// sampler wants quota sized batches or nothing
pub struct ChipPipeline<E> {
    chips: E,
    pad: PadParams,
    class_dict: Option<ClassDict>,
    want_ids: bool,
    acc: BatchAccumulator,
    emit_final_partial: bool,
    finished: bool,
}

impl<E: Iterator<Item = Result<RawChip>>> ChipPipeline<E> {
    pub fn new(
        chips: E,
        target_size: usize,
        params: &BatchParams,
        emit_final_partial: bool,
    ) -> ChipPipeline<E> {
        let class_dict = if params.return_labels {
            Some(params.class_dict())
        } else {
            None
        };

        let num_classes = class_dict.as_ref().map(|d| d.num_classes()).unwrap_or(0);

        ChipPipeline {
            chips,
            pad: params.pad_params(),
            want_ids: params.return_ids,
            acc: BatchAccumulator::new(
                target_size,
                num_classes,
                params.return_ids,
                params.return_labels,
            ),
            class_dict,
            emit_final_partial,
            finished: false,
        }
    }

    /// Label index and id for a chip, None skips the whole chip so the
    /// pixels, ids and labels never come apart
    fn resolve(&self, chip: &RawChip) -> Option<(Option<String>, Option<usize>)> {
        let label_index = if let Some(dict) = &self.class_dict {
            match property_string(&chip.properties, CLASS_NAME_PROPERTY) {
                Some(class_name) => match dict.index_of(&class_name) {
                    Some(index) => Some(index),
                    None => {
                        debug!("Class {} is not in the class list, skipping chip", class_name);
                        return None;
                    }
                },
                None => {
                    debug!("Chip has no {} property, skipping", CLASS_NAME_PROPERTY);
                    return None;
                }
            }
        } else {
            None
        };

        let feature_id = if self.want_ids {
            match property_string(&chip.properties, FEATURE_ID_PROPERTY) {
                Some(id) => Some(id),
                None => {
                    debug!("Chip has no {} property, skipping", FEATURE_ID_PROPERTY);
                    return None;
                }
            }
        } else {
            None
        };

        Some((feature_id, label_index))
    }
}

impl<E: Iterator<Item = Result<RawChip>>> Iterator for ChipPipeline<E> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let chip = match self.chips.next() {
                Some(Ok(chip)) => chip,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;

                    if self.emit_final_partial {
                        return match self.acc.flush() {
                            Ok(Some(batch)) => Some(Ok(batch)),
                            Ok(None) => None,
                            Err(e) => Some(Err(e)),
                        };
                    }

                    return None;
                }
            };

            let (feature_id, label_index) = match self.resolve(&chip) {
                Some(r) => r,
                None => continue,
            };

            let padded = match filter_and_pad(&chip.pixels, chip.mask.as_ref(), &self.pad) {
                Some(p) => p,
                None => continue,
            };

            match self.acc.push(padded, feature_id, label_index) {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Chains the per image extractors of a source, opening each image
/// when the previous one runs dry
pub struct MultiImageExtractor<S: ChipSource> {
    source: S,
    image_ids: vec::IntoIter<String>,
    current: Option<S::Extractor>,
    failed: bool,
}

impl<S: ChipSource> MultiImageExtractor<S> {
    pub fn new(source: S, image_ids: Vec<String>) -> MultiImageExtractor<S> {
        MultiImageExtractor {
            source,
            image_ids: image_ids.into_iter(),
            current: None,
            failed: false,
        }
    }
}

impl<S: ChipSource> Iterator for MultiImageExtractor<S> {
    type Item = Result<RawChip>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(extractor) = &mut self.current {
                match extractor.next() {
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }

            let image_id = self.image_ids.next()?;

            debug!("Extracting chips from image {}", image_id);

            match self.source.open_extractor(&image_id) {
                Ok(extractor) => self.current = Some(extractor),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Sequential batches over every image in the collection, in image id
/// order, ending with the leftover partial batch
pub fn batch_stream<S: ChipSource>(
    source: S,
    features: &FeatureSet,
    params: &BatchParams,
) -> ChipPipeline<MultiImageExtractor<S>> {
    let image_index = PropertyIndex::build(features, IMAGE_ID_PROPERTY);

    let image_ids: Vec<String> = image_index
        .distinct_values()
        .map(|v| v.to_string())
        .collect();

    info!("Streaming chips from {} images", image_ids.len());

    ChipPipeline::new(
        MultiImageExtractor::new(source, image_ids),
        params.batch_size,
        params,
        true,
    )
}
