//! Shadow mapping configuration.

use crate::config::{HISTOGRAM_GRANULARITY, InstrumentConfig, DEFAULT_MEM_GRANULARITY};

/// This struct defines the shadow mapping using the rule:
///   `shadow = ((mem & mask) >> scale) + dynamic_shadow_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapping {
    pub scale: u32,
    pub granularity: u64,
    /// Computed as `!(granularity - 1)`.
    pub mask: u64,
}

impl ShadowMapping {
    /// Panics when histogram mode is combined with a non-default
    /// granularity; the 8-byte histogram bucketing only supports the default
    /// mapping.
    pub fn new(config: &InstrumentConfig) -> Self {
        assert!(
            !config.histogram || config.mapping_granularity == DEFAULT_MEM_GRANULARITY,
            "histogram mode only supports the default mapping granularity"
        );

        let granularity = if config.histogram {
            HISTOGRAM_GRANULARITY
        } else {
            config.mapping_granularity
        };
        debug_assert!(granularity.is_power_of_two());

        Self {
            scale: config.mapping_scale,
            granularity,
            mask: !(granularity - 1),
        }
    }

    /// The pure address transform, usable without IR for checks and tests.
    pub fn mem_to_shadow(&self, addr: u64, dynamic_offset: u64) -> u64 {
        ((addr & self.mask) >> self.scale).wrapping_add(dynamic_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping() {
        let mapping = ShadowMapping::new(&InstrumentConfig::default());
        assert_eq!(mapping.granularity, 64);
        assert_eq!(mapping.mask, !63u64);

        for addr in [0u64, 1, 63, 64, 65, 4096, u64::MAX] {
            assert_eq!(
                mapping.mem_to_shadow(addr, 0x7000),
                ((addr & !63) >> 3).wrapping_add(0x7000)
            );
        }
    }

    #[test]
    fn histogram_mapping_uses_bucket_granularity() {
        let config = InstrumentConfig {
            histogram: true,
            ..InstrumentConfig::default()
        };
        let mapping = ShadowMapping::new(&config);
        assert_eq!(mapping.granularity, 8);
        assert_eq!(mapping.mask, !7u64);
    }

    #[test]
    #[should_panic(expected = "histogram mode only supports")]
    fn histogram_with_custom_granularity_is_fatal() {
        let config = InstrumentConfig {
            histogram: true,
            mapping_granularity: 128,
            ..InstrumentConfig::default()
        };
        ShadowMapping::new(&config);
    }
}
