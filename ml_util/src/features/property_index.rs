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

use crate::features::{property_string, FeatureSet};

/// Counts the distinct values of one property across a feature set.
/// Values iterate in sorted order so downstream quota math is stable.
pub struct PropertyIndex {
    property_name: String,
    counts: BTreeMap<String, usize>,
    num_features: usize,
}

impl PropertyIndex {
    pub fn build(features: &FeatureSet, property_name: &str) -> PropertyIndex {
        let mut counts = BTreeMap::new();

        for record in &features.records {
            if let Some(value) = property_string(&record.properties, property_name) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }

        PropertyIndex {
            property_name: property_name.to_string(),
            counts,
            num_features: features.len(),
        }
    }

    pub fn distinct_values(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(|k| k.as_str())
    }

    pub fn num_values(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, value: &str) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Share of the whole feature set carrying this value.  Features missing
    /// the property still count in the denominator.
    pub fn proportion(&self, value: &str) -> Result<f64> {
        if self.num_features == 0 {
            bail!(
                "Cannot compute proportion of {}, the feature collection is empty",
                self.property_name
            );
        }

        Ok(self.count(value) as f64 / self.num_features as f64)
    }
}
