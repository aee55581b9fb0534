//! Queue family selection
//!
//! Decides which queue families the logical device gets queues from. The
//! mapper only sees plain family properties and a present-support table so it
//! can be exercised without a driver.

use crate::error::{BoilerError, BoilerResult};
use ash::vk;
use std::collections::{BTreeMap, BTreeSet};

/// Name of the video encode queue extension
pub const VIDEO_ENCODE_QUEUE_EXTENSION: &str = "VK_KHR_video_encode_queue";
/// Name of the video decode queue extension
pub const VIDEO_DECODE_QUEUE_EXTENSION: &str = "VK_KHR_video_decode_queue";

const VIDEO_DECODE_BIT: vk::QueueFlags = vk::QueueFlags::from_raw(0x0000_0020);
const VIDEO_ENCODE_BIT: vk::QueueFlags = vk::QueueFlags::from_raw(0x0000_0040);

/// Queues to create from one family
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFamilyAllocation {
    /// Queue family index
    pub index: u32,
    /// One priority per queue
    pub priorities: Vec<f32>,
}

impl QueueFamilyAllocation {
    /// One queue with priority 1.0
    pub fn single(index: u32) -> Self {
        Self {
            index,
            priorities: vec![1.0],
        }
    }

    /// Number of queues
    pub fn queue_count(&self) -> usize {
        self.priorities.len()
    }
}

/// Which family serves which role
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFamilyMapping {
    /// Graphics queues
    pub graphics: QueueFamilyAllocation,
    /// Compute queues
    pub compute: QueueFamilyAllocation,
    /// Transfer queues
    pub transfer: QueueFamilyAllocation,
    /// Video encode queues, when the extension is enabled and supported
    pub video_encode: Option<QueueFamilyAllocation>,
    /// Video decode queues, when the extension is enabled and supported
    pub video_decode: Option<QueueFamilyAllocation>,
    /// Family used for presentation, when there is a window
    pub present_family: Option<u32>,
}

impl QueueFamilyMapping {
    /// Allocations merged per family, ordered by family index.
    ///
    /// Roles sharing a family share queues, so each family gets as many queues
    /// as its largest allocation asks for.
    pub fn unique_families(&self) -> Vec<QueueFamilyAllocation> {
        let mut merged: BTreeMap<u32, Vec<f32>> = BTreeMap::new();
        let allocations = [Some(&self.graphics), Some(&self.compute), Some(&self.transfer)]
            .into_iter()
            .chain([self.video_encode.as_ref(), self.video_decode.as_ref()])
            .flatten();

        for allocation in allocations {
            let entry = merged.entry(allocation.index).or_default();
            if allocation.priorities.len() > entry.len() {
                entry.clone_from(&allocation.priorities);
            }
        }

        if let Some(present) = self.present_family {
            merged.entry(present).or_insert_with(|| vec![1.0]);
        }

        merged
            .into_iter()
            .map(|(index, priorities)| QueueFamilyAllocation { index, priorities })
            .collect()
    }
}

/// Strategy for mapping queue families to roles
pub trait QueueFamilyMapper {
    /// Map the families of one physical device.
    ///
    /// `present_support[i]` tells whether family `i` can present to every
    /// window surface; it is all `false` when there are no windows.
    fn map_queue_families(
        &self,
        queue_families: &[vk::QueueFamilyProperties],
        device_extensions: &BTreeSet<String>,
        present_support: &[bool],
    ) -> BoilerResult<QueueFamilyMapping>;
}

/// Uses as few families as possible, with one queue per role
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalQueueFamilyMapper;

impl MinimalQueueFamilyMapper {
    fn map_video(
        queue_families: &[vk::QueueFamilyProperties],
        device_extensions: &BTreeSet<String>,
    ) -> (Option<u32>, Option<u32>) {
        let try_encode = device_extensions.contains(VIDEO_ENCODE_QUEUE_EXTENSION);
        let try_decode = device_extensions.contains(VIDEO_DECODE_QUEUE_EXTENSION);

        let mut encode = None;
        let mut decode = None;
        for (index, family) in (0u32..).zip(queue_families) {
            let has_encode = try_encode && family.queue_flags.contains(VIDEO_ENCODE_BIT);
            let has_decode = try_decode && family.queue_flags.contains(VIDEO_DECODE_BIT);
            if has_encode && has_decode {
                return (Some(index), Some(index));
            }

            if encode.is_none() && has_encode {
                encode = Some(index);
            }
            if decode.is_none() && has_decode {
                decode = Some(index);
            }
        }
        (encode, decode)
    }
}

impl QueueFamilyMapper for MinimalQueueFamilyMapper {
    fn map_queue_families(
        &self,
        queue_families: &[vk::QueueFamilyProperties],
        device_extensions: &BTreeSet<String>,
        present_support: &[bool],
    ) -> BoilerResult<QueueFamilyMapping> {
        let (encode, decode) = Self::map_video(queue_families, device_extensions);
        let video_encode = encode.map(QueueFamilyAllocation::single);
        let video_decode = decode.map(QueueFamilyAllocation::single);

        let mut graphics = None;
        let mut compute = None;
        let mut present = None;

        for (index, family) in (0u32..).zip(queue_families) {
            let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let has_compute = family.queue_flags.contains(vk::QueueFlags::COMPUTE);
            let has_present = present_support.get(index as usize).copied().unwrap_or(false);

            if has_graphics && has_compute && has_present {
                let allocation = QueueFamilyAllocation::single(index);
                return Ok(QueueFamilyMapping {
                    graphics: allocation.clone(),
                    compute: allocation.clone(),
                    transfer: allocation,
                    video_encode,
                    video_decode,
                    present_family: Some(index),
                });
            }

            if graphics.is_none() && has_graphics {
                graphics = Some(index);
            }
            if compute.is_none() && has_compute {
                compute = Some(index);
            }
            if has_graphics && has_compute {
                graphics = Some(index);
                compute = Some(index);
            }

            if present.is_none() && has_present {
                present = Some(index);
            }
            if (has_graphics || has_compute) && has_present {
                present = Some(index);
            }
        }

        let graphics = graphics.ok_or(BoilerError::MissingQueueFamily("graphics"))?;
        let compute = compute.ok_or(BoilerError::MissingQueueFamily("compute"))?;

        Ok(QueueFamilyMapping {
            graphics: QueueFamilyAllocation::single(graphics),
            compute: QueueFamilyAllocation::single(compute),
            transfer: QueueFamilyAllocation::single(graphics),
            video_encode,
            video_decode,
            present_family: present,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn no_extensions() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_single_universal_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[true])
            .unwrap();

        assert_eq!(mapping.graphics.index, 0);
        assert_eq!(mapping.compute.index, 0);
        assert_eq!(mapping.transfer.index, 0);
        assert_eq!(mapping.present_family, Some(0));
        assert_eq!(mapping.unique_families(), vec![QueueFamilyAllocation::single(0)]);
    }

    #[test]
    fn test_prefers_family_with_graphics_compute_and_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[false, true, true])
            .unwrap();

        assert_eq!(mapping.graphics.index, 2);
        assert_eq!(mapping.present_family, Some(2));
    }

    #[test]
    fn test_split_graphics_and_compute() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::GRAPHICS)];
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[false, false])
            .unwrap();

        assert_eq!(mapping.graphics.index, 1);
        assert_eq!(mapping.compute.index, 0);
        assert_eq!(mapping.transfer.index, 1);
        assert_eq!(mapping.present_family, None);
        assert_eq!(mapping.unique_families().len(), 2);
    }

    #[test]
    fn test_combined_family_wins_over_earlier_partial_ones() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[false; 3])
            .unwrap();

        assert_eq!(mapping.graphics.index, 2);
        assert_eq!(mapping.compute.index, 2);
    }

    #[test]
    fn test_present_prefers_family_with_graphics_or_compute() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[false, true, true])
            .unwrap();

        assert_eq!(mapping.present_family, Some(2));

        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[false, true, false])
            .unwrap();
        assert_eq!(mapping.present_family, Some(1));
    }

    #[test]
    fn test_video_queues_need_extensions() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(VIDEO_DECODE_BIT),
            family(VIDEO_ENCODE_BIT | VIDEO_DECODE_BIT),
        ];

        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &no_extensions(), &[true, false, false])
            .unwrap();
        assert_eq!(mapping.video_encode, None);
        assert_eq!(mapping.video_decode, None);

        let decode_only: BTreeSet<String> = [VIDEO_DECODE_QUEUE_EXTENSION.to_string()].into();
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &decode_only, &[true, false, false])
            .unwrap();
        assert_eq!(mapping.video_encode, None);
        assert_eq!(mapping.video_decode.as_ref().map(|a| a.index), Some(1));

        let both: BTreeSet<String> = [
            VIDEO_DECODE_QUEUE_EXTENSION.to_string(),
            VIDEO_ENCODE_QUEUE_EXTENSION.to_string(),
        ]
        .into();
        let mapping = MinimalQueueFamilyMapper
            .map_queue_families(&families, &both, &[true, false, false])
            .unwrap();
        assert_eq!(mapping.video_encode.as_ref().map(|a| a.index), Some(2));
        assert_eq!(mapping.video_decode.as_ref().map(|a| a.index), Some(2));
        assert_eq!(mapping.unique_families().len(), 2);
    }

    #[test]
    fn test_missing_graphics_is_an_error() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let result = MinimalQueueFamilyMapper.map_queue_families(&families, &no_extensions(), &[false]);
        assert!(matches!(result, Err(BoilerError::MissingQueueFamily("graphics"))));
    }

    #[test]
    fn test_unique_families_keeps_largest_allocation() {
        let mapping = QueueFamilyMapping {
            graphics: QueueFamilyAllocation::single(0),
            compute: QueueFamilyAllocation {
                index: 0,
                priorities: vec![1.0, 0.5],
            },
            transfer: QueueFamilyAllocation::single(1),
            video_encode: None,
            video_decode: None,
            present_family: Some(3),
        };

        let unique = mapping.unique_families();
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].queue_count(), 2);
        assert_eq!(unique[1].index, 1);
        assert_eq!(unique[2].index, 3);
    }
}
