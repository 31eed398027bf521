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
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::mem;
use std::path::Path;

use anyhow::{anyhow, Result};
use ndarray::{stack, Array2, Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

/// A stack of same sized chips, chip/band/row/col order
pub struct Batch {
    pub pixels: Array4<f64>,
    pub feature_ids: Option<Vec<String>>,

    //one row per chip, one hot over the class list
    pub labels: Option<Array2<f64>>,
}

impl Batch {
    pub fn num_chips(&self) -> usize {
        self.pixels.shape()[0]
    }
}

/// Collects chips until target_size is reached, then emits a Batch.
/// Labels stay as class indexes until emission, the one hot rows are
/// built for the whole batch at once
pub struct BatchAccumulator {
    target_size: usize,
    num_classes: usize,
    want_ids: bool,
    want_labels: bool,
    chips: Vec<Array3<f64>>,
    feature_ids: Vec<String>,
    label_indexes: Vec<usize>,
}

impl BatchAccumulator {
    pub fn new(
        target_size: usize,
        num_classes: usize,
        want_ids: bool,
        want_labels: bool,
    ) -> BatchAccumulator {
        BatchAccumulator {
            target_size,
            num_classes,
            want_ids,
            want_labels,
            chips: Vec::new(),
            feature_ids: Vec::new(),
            label_indexes: Vec::new(),
        }
    }

    pub fn num_buffered(&self) -> usize {
        self.chips.len()
    }

    pub fn push(
        &mut self,
        chip: Array3<f64>,
        feature_id: Option<String>,
        label_index: Option<usize>,
    ) -> Result<Option<Batch>> {
        //callers resolve ids and classes before pushing
        let feature_id = if self.want_ids {
            Some(feature_id.ok_or_else(|| anyhow!("Chip is missing its feature id"))?)
        } else {
            None
        };

        let label_index = if self.want_labels {
            Some(label_index.ok_or_else(|| anyhow!("Chip is missing its class index"))?)
        } else {
            None
        };

        if let Some(id) = feature_id {
            self.feature_ids.push(id);
        }

        if let Some(index) = label_index {
            self.label_indexes.push(index);
        }

        self.chips.push(chip);

        if self.target_size > 0 && self.chips.len() >= self.target_size {
            return Ok(Some(self.emit()?));
        }

        Ok(None)
    }

    /// Emits whatever is buffered, the final partial batch
    pub fn flush(&mut self) -> Result<Option<Batch>> {
        if self.chips.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.emit()?))
    }

    fn emit(&mut self) -> Result<Batch> {
        let chips = mem::take(&mut self.chips);
        let feature_ids = mem::take(&mut self.feature_ids);
        let label_indexes = mem::take(&mut self.label_indexes);

        let views: Vec<_> = chips.iter().map(|c| c.view()).collect();
        let pixels = stack(Axis(0), &views)?;

        let feature_ids = if self.want_ids {
            assert_eq!(feature_ids.len(), chips.len());
            Some(feature_ids)
        } else {
            None
        };

        let labels = if self.want_labels {
            assert_eq!(label_indexes.len(), chips.len());

            let mut labels = Array2::zeros((chips.len(), self.num_classes));

            for (row, &class_index) in label_indexes.iter().enumerate() {
                labels[[row, class_index]] = 1.0;
            }

            Some(labels)
        } else {
            None
        };

        Ok(Batch {
            pixels,
            feature_ids,
            labels,
        })
    }
}

/// On disk form of a Batch, flat vectors plus shapes
#[derive(Serialize, Deserialize)]
pub struct BatchFile {
    pixels_shape: (usize, usize, usize, usize),
    pixels: Vec<f64>,
    feature_ids: Option<Vec<String>>,
    num_classes: usize,
    labels: Option<Vec<f64>>,
}

impl BatchFile {
    pub fn from_batch(batch: &Batch) -> BatchFile {
        let shape = batch.pixels.shape();

        BatchFile {
            pixels_shape: (shape[0], shape[1], shape[2], shape[3]),
            pixels: batch.pixels.iter().copied().collect(),
            feature_ids: batch.feature_ids.clone(),
            num_classes: batch.labels.as_ref().map(|l| l.shape()[1]).unwrap_or(0),
            labels: batch.labels.as_ref().map(|l| l.iter().copied().collect()),
        }
    }

    pub fn into_batch(self) -> Result<Batch> {
        let (num_chips, num_bands, num_rows, num_cols) = self.pixels_shape;

        let pixels =
            Array4::from_shape_vec((num_chips, num_bands, num_rows, num_cols), self.pixels)?;

        let labels = match self.labels {
            Some(values) => Some(Array2::from_shape_vec(
                (num_chips, self.num_classes),
                values,
            )?),
            None => None,
        };

        Ok(Batch {
            pixels,
            feature_ids: self.feature_ids,
            labels,
        })
    }
}

pub fn write_batch_file(path: &Path, batch: &Batch) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &BatchFile::from_batch(batch))?;

    Ok(())
}

pub fn read_batch_file(path: &Path) -> Result<Batch> {
    let mut reader = BufReader::new(File::open(path)?);
    let batch_file: BatchFile = bincode::deserialize_from(&mut reader)?;

    batch_file.into_batch()
}

#[cfg(test)]
mod batch_tests {
    use super::*;
    use crate::raster::get_temp_filename;

    fn chip(fill: f64) -> Array3<f64> {
        Array3::from_elem((1, 2, 2), fill)
    }

    #[test]
    fn test_emits_when_full() {
        let mut acc = BatchAccumulator::new(2, 2, true, true);

        assert!(acc
            .push(chip(1.0), Some("f1".to_string()), Some(0))
            .unwrap()
            .is_none());
        assert_eq!(1, acc.num_buffered());

        let batch = acc
            .push(chip(2.0), Some("f2".to_string()), Some(1))
            .unwrap()
            .unwrap();

        assert_eq!(0, acc.num_buffered());
        assert_eq!(2, batch.num_chips());
        assert_eq!(batch.pixels.shape(), &[2, 1, 2, 2]);
        assert_eq!(1.0, batch.pixels[[0, 0, 0, 0]]);
        assert_eq!(2.0, batch.pixels[[1, 0, 1, 1]]);

        assert_eq!(
            &vec!["f1".to_string(), "f2".to_string()],
            batch.feature_ids.as_ref().unwrap()
        );

        let labels = batch.labels.as_ref().unwrap();
        assert_eq!(labels.shape(), &[2, 2]);
        assert_eq!(1.0, labels[[0, 0]]);
        assert_eq!(0.0, labels[[0, 1]]);
        assert_eq!(0.0, labels[[1, 0]]);
        assert_eq!(1.0, labels[[1, 1]]);

        //every label row is one hot
        for row in 0..2 {
            let row_sum: f64 = labels.index_axis(Axis(0), row).sum();
            assert_eq!(1.0, row_sum);
        }
    }

    #[test]
    fn test_flush_emits_the_partial_rest() {
        let mut acc = BatchAccumulator::new(2, 2, false, true);

        acc.push(chip(1.0), None, Some(0)).unwrap();
        acc.push(chip(2.0), None, Some(0)).unwrap().unwrap();
        acc.push(chip(3.0), None, Some(1)).unwrap();

        let rest = acc.flush().unwrap().unwrap();
        assert_eq!(1, rest.num_chips());
        assert!(rest.feature_ids.is_none());
        assert_eq!(1.0, rest.labels.as_ref().unwrap()[[0, 1]]);

        assert!(acc.flush().unwrap().is_none());
    }

    #[test]
    fn test_target_size_zero_buffers_everything() {
        let mut acc = BatchAccumulator::new(0, 0, false, false);

        for i in 0..3 {
            assert!(acc.push(chip(i as f64), None, None).unwrap().is_none());
        }

        let batch = acc.flush().unwrap().unwrap();
        assert_eq!(3, batch.num_chips());
        assert!(batch.labels.is_none());
        assert!(batch.feature_ids.is_none());
    }

    #[test]
    fn test_push_rejects_missing_id() {
        let mut acc = BatchAccumulator::new(2, 2, true, true);

        assert!(acc.push(chip(1.0), None, Some(0)).is_err());

        //the failed push buffered nothing
        assert_eq!(0, acc.num_buffered());
    }

    #[test]
    fn test_batch_file_round_trip() {
        let mut acc = BatchAccumulator::new(2, 3, true, true);

        acc.push(chip(1.0), Some("f1".to_string()), Some(2)).unwrap();
        let batch = acc
            .push(chip(2.0), Some("f2".to_string()), Some(0))
            .unwrap()
            .unwrap();

        let path = get_temp_filename("batch_0000.bin");
        write_batch_file(&path, &batch).unwrap();

        let read_back = read_batch_file(&path).unwrap();

        assert_eq!(batch.pixels, read_back.pixels);
        assert_eq!(batch.feature_ids, read_back.feature_ids);
        assert_eq!(batch.labels, read_back.labels);
    }
}
