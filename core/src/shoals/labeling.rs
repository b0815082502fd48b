//! Connected-component labeling of the shoal mask.

use crate::prelude::{ProcessingError, ProcessingResult};
use crate::volume::AcousticVolume;
use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MASK_SHOAL: &str = "mask_shoal";

/// Which cells count as touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Cells sharing a face: 4-connected in 2-D, 6-connected in 3-D.
    #[default]
    Face,
    /// Cells sharing a face, edge or corner: 8-connected in 2-D, 26 in 3-D.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelScope {
    /// One labeling over channel × ping_time × range_sample; a region that
    /// spans channels gets a single label.
    #[default]
    Volume,
    /// Each channel labeled on its own; labels stay unique across channels.
    PerChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOptions {
    pub connectivity: Connectivity,
    pub scope: LabelScope,
}

/// One connected region: true only at its own cells, over the full grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ShoalMask {
    pub label: u32,
    pub data: Array3<bool>,
}

impl ShoalMask {
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&cell| cell).count()
    }
}

fn neighbour_offsets(connectivity: Connectivity, across_channels: bool) -> Vec<[isize; 3]> {
    let channel_steps: &[isize] = if across_channels { &[-1, 0, 1] } else { &[0] };
    let mut offsets = Vec::new();
    for &dc in channel_steps {
        for dp in -1isize..=1 {
            for dr in -1isize..=1 {
                let moved = [dc, dp, dr].iter().filter(|step| **step != 0).count();
                let keep = match connectivity {
                    Connectivity::Face => moved == 1,
                    Connectivity::Full => moved > 0,
                };
                if keep {
                    offsets.push([dc, dp, dr]);
                }
            }
        }
    }
    offsets
}

/// Labels true regions 1..=n in raster-scan order of their first cell;
/// background is 0. Returns the label grid and n.
pub fn label_components(mask: ArrayView3<'_, bool>, options: LabelOptions) -> (Array3<u32>, u32) {
    let shape = mask.dim();
    let mut labels = Array3::<u32>::zeros(shape);
    let offsets = neighbour_offsets(
        options.connectivity,
        options.scope == LabelScope::Volume,
    );
    let bounds = [shape.0 as isize, shape.1 as isize, shape.2 as isize];
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for ((c, p, r), &set) in mask.indexed_iter() {
        if !set || labels[[c, p, r]] != 0 {
            continue;
        }
        next += 1;
        labels[[c, p, r]] = next;
        queue.push_back([c, p, r]);
        while let Some(cell) = queue.pop_front() {
            for offset in &offsets {
                let mut neighbour = [0usize; 3];
                let mut inside = true;
                for axis in 0..3 {
                    let moved = cell[axis] as isize + offset[axis];
                    if moved < 0 || moved >= bounds[axis] {
                        inside = false;
                        break;
                    }
                    neighbour[axis] = moved as usize;
                }
                if inside && mask[neighbour] && labels[neighbour] == 0 {
                    labels[neighbour] = next;
                    queue.push_back(neighbour);
                }
            }
        }
    }
    (labels, next)
}

/// One [`ShoalMask`] per connected region of `mask_shoal`.
pub fn split_shoal_mask(volume: &AcousticVolume) -> ProcessingResult<Vec<ShoalMask>> {
    split_shoal_mask_with(volume, LabelOptions::default())
}

pub fn split_shoal_mask_with(
    volume: &AcousticVolume,
    options: LabelOptions,
) -> ProcessingResult<Vec<ShoalMask>> {
    let mask = volume.grid_mask(MASK_SHOAL).map_err(|err| match err {
        ProcessingError::MissingVariable(_) => err,
        other => ProcessingError::integrity(format!("{} is malformed: {}", MASK_SHOAL, other)),
    })?;
    let (labels, count) = label_components(mask, options);
    Ok((1..=count)
        .map(|label| ShoalMask {
            label,
            data: labels.mapv(|value| value == label),
        })
        .collect())
}

/// True-cell count per channel of one region.
pub fn channel_areas(shoal: &ShoalMask) -> Vec<usize> {
    shoal
        .data
        .axis_iter(Axis(0))
        .map(|channel| channel.iter().filter(|&&cell| cell).count())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VolumeBuilder;
    use ndarray::s;

    #[test]
    fn two_disjoint_rectangles_get_two_labels() {
        let mut keep = Array3::from_elem((1, 10, 10), false);
        keep.slice_mut(s![0, 1..3, 1..4]).fill(true);
        keep.slice_mut(s![0, 6..9, 5..7]).fill(true);
        let volume = VolumeBuilder::new(1, 10, 10)
            .with_mask(MASK_SHOAL, keep.clone())
            .build();

        let shoals = split_shoal_mask(&volume).unwrap();
        assert_eq!(shoals.len(), 2);
        assert_ne!(shoals[0].label, shoals[1].label);

        let mut first = Array3::from_elem((1, 10, 10), false);
        first.slice_mut(s![0, 1..3, 1..4]).fill(true);
        let mut second = Array3::from_elem((1, 10, 10), false);
        second.slice_mut(s![0, 6..9, 5..7]).fill(true);
        assert_eq!(shoals[0].data, first);
        assert_eq!(shoals[1].data, second);
    }

    #[test]
    fn diagonal_cells_join_only_with_full_connectivity() {
        let mut keep = Array3::from_elem((1, 3, 3), false);
        keep[[0, 0, 0]] = true;
        keep[[0, 1, 1]] = true;
        let (_, face) = label_components(keep.view(), LabelOptions::default());
        assert_eq!(face, 2);
        let full = LabelOptions {
            connectivity: Connectivity::Full,
            ..Default::default()
        };
        let (_, joined) = label_components(keep.view(), full);
        assert_eq!(joined, 1);
    }

    #[test]
    fn channel_scope_controls_cross_channel_joins() {
        let mut keep = Array3::from_elem((2, 2, 2), false);
        keep[[0, 0, 0]] = true;
        keep[[1, 0, 0]] = true;
        let (labels, count) = label_components(keep.view(), LabelOptions::default());
        assert_eq!(count, 1);
        assert_eq!(labels[[1, 0, 0]], 1);

        let per_channel = LabelOptions {
            scope: LabelScope::PerChannel,
            ..Default::default()
        };
        let (labels, count) = label_components(keep.view(), per_channel);
        assert_eq!(count, 2);
        assert_eq!(labels[[1, 0, 0]], 2);
    }

    #[test]
    fn empty_mask_has_no_components() {
        let keep = Array3::from_elem((2, 4, 4), false);
        let (labels, count) = label_components(keep.view(), LabelOptions::default());
        assert_eq!(count, 0);
        assert!(labels.iter().all(|&label| label == 0));
    }

    #[test]
    fn missing_shoal_mask_is_reported() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        assert!(matches!(
            split_shoal_mask(&volume),
            Err(ProcessingError::MissingVariable(_))
        ));
    }
}
