use crate::prelude::ProcessingResult;
use crate::volume::{AcousticVolume, Mask};
use log::debug;

/// Returns a copy of `volume` with `mask` stored as `mask_<type>`, its
/// provenance carried as variable attributes.
pub fn attach_mask_to_dataset(volume: &AcousticVolume, mask: Mask) -> ProcessingResult<AcousticVolume> {
    let name = mask.variable_name();
    debug!("attaching {} ({} samples kept)", name, mask.count_true());
    volume.with_variable(name, mask.into_variable())
}

/// Attaches every mask in turn. A later mask of the same type replaces an
/// earlier one.
pub fn attach_masks_to_dataset<I>(volume: &AcousticVolume, masks: I) -> ProcessingResult<AcousticVolume>
where
    I: IntoIterator<Item = Mask>,
{
    let mut out = volume.clone();
    for mask in masks {
        let name = mask.variable_name();
        out.insert_variable(name, mask.into_variable())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::ProcessingError;
    use crate::volume::mask::MASK_TYPE_ATTR;
    use crate::volume::{AttrValue, MaskMetadata};
    use crate::testing::VolumeBuilder;
    use ndarray::Array3;

    #[test]
    fn attached_mask_keeps_its_provenance() {
        let volume = VolumeBuilder::new(1, 3, 2).build();
        let mask = Mask::multichannel(
            Array3::from_elem((1, 3, 2), true),
            MaskMetadata::new("seabed").with_method("ariza"),
        );
        let out = attach_mask_to_dataset(&volume, mask).unwrap();
        let variable = out.variable("mask_seabed").unwrap();
        assert_eq!(variable.attrs.get(MASK_TYPE_ATTR), Some(&AttrValue::from("seabed")));
        assert!(!volume.contains("mask_seabed"));
    }

    #[test]
    fn later_mask_of_same_type_wins() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let first = Mask::multichannel(Array3::from_elem((1, 2, 2), true), MaskMetadata::new("impulse"));
        let second = Mask::multichannel(Array3::from_elem((1, 2, 2), false), MaskMetadata::new("impulse"));
        let out = attach_masks_to_dataset(&volume, vec![first, second]).unwrap();
        assert!(out.grid_mask("mask_impulse").unwrap().iter().all(|&keep| !keep));
    }

    #[test]
    fn misaligned_mask_is_rejected() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let mask = Mask::multichannel(Array3::from_elem((1, 3, 2), true), MaskMetadata::new("transient"));
        assert!(matches!(
            attach_mask_to_dataset(&volume, mask),
            Err(ProcessingError::CoordinateMismatch(_))
        ));
    }
}
