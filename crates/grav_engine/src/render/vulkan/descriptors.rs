//! Descriptor set layouts, pools and writers
//!
//! Layouts are declared with plain [`DescriptorBinding`] values rather than
//! a builder chain; the full binding table is visible at the call site and
//! the layout validates it once at construction. [`DescriptorWriter`]
//! batches writes for a single set and checks each write against the
//! declared layout, so a binding mismatch fails loudly at write time
//! instead of as a validation-layer message later.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Declaration of one binding in a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index, matching the shader's `binding =` qualifier.
    pub binding: u32,
    /// Descriptor type at this binding.
    pub descriptor_type: vk::DescriptorType,
    /// Number of descriptors in the binding's array. Almost always 1.
    pub count: u32,
    /// Shader stages that access the binding.
    pub stage_flags: vk::ShaderStageFlags,
}

pub(crate) fn find_binding(
    bindings: &[DescriptorBinding],
    binding: u32,
) -> Option<&DescriptorBinding> {
    bindings.iter().find(|b| b.binding == binding)
}

fn validate_bindings(bindings: &[DescriptorBinding]) -> VulkanResult<()> {
    if bindings.is_empty() {
        return Err(VulkanError::InitializationFailed(
            "descriptor set layout needs at least one binding".to_string(),
        ));
    }
    for (i, a) in bindings.iter().enumerate() {
        if a.count == 0 {
            return Err(VulkanError::InitializationFailed(format!(
                "binding {} has descriptor count 0",
                a.binding
            )));
        }
        if bindings[..i].iter().any(|b| b.binding == a.binding) {
            return Err(VulkanError::InitializationFailed(format!(
                "binding index {} declared twice",
                a.binding
            )));
        }
    }
    Ok(())
}

/// Descriptor set layout with its binding table retained for write-time
/// checks.
pub struct DescriptorSetLayout {
    device: Device,
    handle: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout {
    /// Create a layout from a binding table. Duplicate or empty bindings are
    /// rejected.
    pub fn new(device: &Device, bindings: &[DescriptorBinding]) -> VulkanResult<Self> {
        validate_bindings(bindings)?;

        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stage_flags)
                    .build()
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&vk_bindings);
        let handle = unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            handle,
            bindings: bindings.to_vec(),
        })
    }

    /// Get the raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    /// The declared binding table.
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}

/// Fixed-capacity descriptor pool.
pub struct DescriptorPool {
    device: Device,
    handle: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool with room for `max_sets` sets drawing from `pool_sizes`.
    pub fn new(
        device: &Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let handle = unsafe {
            device
                .create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// Allocate one set with the given layout. Pool exhaustion is reported
    /// as [`VulkanError::DescriptorPoolExhausted`].
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.handle)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                        VulkanError::DescriptorPoolExhausted
                    }
                    other => VulkanError::Api(other),
                })?
        };
        Ok(sets[0])
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.handle, None);
        }
    }
}

/// Batches descriptor writes for one set against a declared layout.
///
/// Buffer infos are stored inline so the `vk::WriteDescriptorSet` pointers
/// stay valid until [`DescriptorWriter::build`] or
/// [`DescriptorWriter::overwrite`] runs.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    // (binding, index into buffer_infos)
    writes: Vec<(u32, usize)>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start a write batch for a set using `layout`, allocated from `pool`.
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            buffer_infos: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Queue a buffer write for `binding`.
    ///
    /// # Panics
    ///
    /// Panics if the layout does not declare `binding`, or declares it with
    /// a descriptor count other than 1. Both are caller bugs.
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        let declared = find_binding(self.layout.bindings(), binding)
            .unwrap_or_else(|| panic!("layout does not declare binding {binding}"));
        assert!(
            declared.count == 1,
            "binding {binding} declares {} descriptors; single-buffer writes need exactly 1",
            declared.count
        );

        self.buffer_infos.push(info);
        self.writes.push((binding, self.buffer_infos.len() - 1));
        self
    }

    /// Allocate a set from the pool and apply the queued writes.
    pub fn build(self, device: &Device) -> VulkanResult<vk::DescriptorSet> {
        let set = self.pool.allocate(self.layout)?;
        self.overwrite(device, set);
        Ok(set)
    }

    /// Apply the queued writes to an existing set.
    pub fn overwrite(self, device: &Device, set: vk::DescriptorSet) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|&(binding, info_index)| {
                // Declared presence was checked in write_buffer.
                let declared = find_binding(self.layout.bindings(), binding)
                    .unwrap_or_else(|| panic!("layout does not declare binding {binding}"));
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(declared.descriptor_type)
                    .buffer_info(std::slice::from_ref(&self.buffer_infos[info_index]))
                    .build()
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_binding(index: u32) -> DescriptorBinding {
        DescriptorBinding {
            binding: index,
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            count: 1,
            stage_flags: vk::ShaderStageFlags::COMPUTE,
        }
    }

    #[test]
    fn finds_declared_binding() {
        let bindings = [storage_binding(0), storage_binding(1)];
        assert!(find_binding(&bindings, 0).is_some());
        assert!(find_binding(&bindings, 1).is_some());
        assert!(find_binding(&bindings, 2).is_none());
    }

    #[test]
    fn rejects_duplicate_binding_indices() {
        let bindings = [storage_binding(0), storage_binding(0)];
        assert!(validate_bindings(&bindings).is_err());
    }

    #[test]
    fn rejects_empty_binding_table() {
        assert!(validate_bindings(&[]).is_err());
    }

    #[test]
    fn rejects_zero_descriptor_count() {
        let mut binding = storage_binding(0);
        binding.count = 0;
        assert!(validate_bindings(&[binding]).is_err());
    }

    #[test]
    fn accepts_compute_particle_layout() {
        let bindings = [
            DescriptorBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
            },
            DescriptorBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
            },
        ];
        assert!(validate_bindings(&bindings).is_ok());
    }
}
