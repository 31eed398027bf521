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
use std::collections::HashMap;

/// Maps class names to one hot label indexes, in the order given
pub struct ClassDict {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
}

impl ClassDict {
    pub fn new(names: &[String]) -> ClassDict {
        let index_by_name = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();

        ClassDict {
            names: names.to_vec(),
            index_by_name,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }
}
