//! Surface/depth format and present-mode ranked preference lists (spec §6)

use ash::vk;

/// Presented color formats, most preferred first.
pub const SURFACE_FORMAT_PREFERENCE: &[vk::SurfaceFormatKHR] = &[
    vk::SurfaceFormatKHR {
        format: vk::Format::A2B10G10R10_UNORM_PACK32,
        color_space: vk::ColorSpaceKHR::HDR10_HLG_EXT,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::A2B10G10R10_UNORM_PACK32,
        color_space: vk::ColorSpaceKHR::HDR10_ST2084_EXT,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R16G16B16A16_SFLOAT,
        color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R16G16B16A16_SFLOAT,
        color_space: vk::ColorSpaceKHR::BT709_LINEAR_EXT,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
];

/// Depth formats, most preferred first.
pub const DEPTH_FORMAT_PREFERENCE: &[vk::Format] = &[
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Off-screen HDR intermediate format, used before tone-mapping.
pub const HDR_INTERMEDIATE_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

/// Present modes, most preferred first.
pub const PRESENT_MODE_PREFERENCE: &[vk::PresentModeKHR] = &[
    vk::PresentModeKHR::IMMEDIATE,
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::FIFO,
];

/// Pick the highest-ranked surface format present in `available`, falling
/// back to the first reported format if none of the preferred ones are.
#[must_use]
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    SURFACE_FORMAT_PREFERENCE
        .iter()
        .find(|preferred| available.contains(preferred))
        .copied()
        .unwrap_or(available[0])
}

/// Pick the highest-ranked present mode present in `available`. `FIFO` is
/// always supported so this never falls through to a default.
#[must_use]
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    PRESENT_MODE_PREFERENCE
        .iter()
        .find(|preferred| available.contains(preferred))
        .copied()
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Pick the highest-ranked depth format the physical device supports with
/// optimal-tiling depth/stencil attachment usage.
pub fn select_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Option<vk::Format> {
    DEPTH_FORMAT_PREFERENCE.iter().copied().find(|&format| {
        let props =
            unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_highest_ranked_available_surface_format() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::BT709_LINEAR_EXT,
            },
        ];
        let selected = select_surface_format(&available);
        assert_eq!(selected.format, vk::Format::R16G16B16A16_SFLOAT);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::BT709_LINEAR_EXT);
    }

    #[test]
    fn falls_back_to_first_available_surface_format() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let selected = select_surface_format(&available);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn prefers_immediate_then_mailbox_then_fifo() {
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }
}
