//! GPU buffer management
//!
//! [`Buffer`] allocates, binds and optionally maps device memory for an
//! array of fixed-size instances. Per-instance alignment is padded up front
//! so a single buffer can back dynamically-offset descriptors; buffers with
//! no alignment requirement pass `1`.

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};

/// Round `instance_size` up to the next multiple of `min_offset_alignment`.
///
/// An alignment of zero or one leaves the size unchanged.
pub fn aligned_instance_size(
    instance_size: vk::DeviceSize,
    min_offset_alignment: vk::DeviceSize,
) -> vk::DeviceSize {
    if min_offset_alignment > 1 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Find a memory type satisfying both the resource's type bits and the
/// requested property flags.
pub(crate) fn find_memory_type(
    context: &VulkanContext,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let memory_properties = unsafe {
        context
            .instance()
            .get_physical_device_memory_properties(context.physical_device.device)
    };

    for i in 0..memory_properties.memory_type_count {
        let type_matches = type_bits & (1 << i) != 0;
        let properties_match = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        if type_matches && properties_match {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// Vulkan buffer with owned device memory and optional persistent mapping.
pub struct Buffer {
    device: Device,
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: Option<*mut std::ffi::c_void>,

    instance_size: vk::DeviceSize,
    aligned_size: vk::DeviceSize,
    instance_count: vk::DeviceSize,
    buffer_size: vk::DeviceSize,
}

impl Buffer {
    /// Allocate a buffer holding `instance_count` instances of
    /// `instance_size` bytes each, padding each instance to
    /// `min_offset_alignment`.
    pub fn new(
        context: &VulkanContext,
        instance_size: vk::DeviceSize,
        instance_count: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let aligned_size = aligned_instance_size(instance_size, min_offset_alignment);
        let buffer_size = aligned_size * instance_count;

        let create_info = vk::BufferCreateInfo::builder()
            .size(buffer_size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let handle = unsafe {
            device
                .create_buffer(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(handle) };
        let memory_type = find_memory_type(context, requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = unsafe {
            device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            device
                .bind_buffer_memory(handle, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device,
            handle,
            memory,
            mapped: None,
            instance_size,
            aligned_size,
            instance_count,
            buffer_size,
        })
    }

    /// Map the whole buffer into host address space. Requires host-visible
    /// memory. Mapping twice is harmless.
    pub fn map(&mut self) -> VulkanResult<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, self.buffer_size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };
        self.mapped = Some(ptr);
        Ok(())
    }

    /// Unmap the buffer if mapped.
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe {
                self.device.unmap_memory(self.memory);
            }
        }
    }

    /// Copy `data` into the mapped region at the aligned offset for
    /// `instance_index`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not mapped, the index is out of range, or
    /// `data` does not fit in one instance.
    pub fn write_to_index<T: Pod>(&mut self, data: &T, instance_index: vk::DeviceSize) {
        let mapped = self.mapped.unwrap_or_else(|| panic!("buffer is not mapped"));
        assert!(
            instance_index < self.instance_count,
            "instance index {instance_index} out of range ({})",
            self.instance_count
        );
        let bytes = bytemuck::bytes_of(data);
        assert!(
            bytes.len() as vk::DeviceSize <= self.instance_size,
            "write of {} bytes exceeds instance size {}",
            bytes.len(),
            self.instance_size
        );

        unsafe {
            let dst = (mapped as *mut u8).add((instance_index * self.aligned_size) as usize);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
    }

    /// Copy a slice of instances into the mapped region starting at
    /// instance zero. Instances are written at their aligned offsets.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not mapped or the slice is longer than the
    /// buffer's instance count.
    pub fn write_slice<T: Pod>(&mut self, data: &[T]) {
        assert!(
            data.len() as vk::DeviceSize <= self.instance_count,
            "slice of {} instances exceeds buffer capacity {}",
            data.len(),
            self.instance_count
        );
        if self.aligned_size == self.instance_size {
            // Tightly packed, single copy.
            let mapped = self.mapped.unwrap_or_else(|| panic!("buffer is not mapped"));
            let bytes = bytemuck::cast_slice(data);
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped as *mut u8, bytes.len());
            }
        } else {
            for (i, instance) in data.iter().enumerate() {
                self.write_to_index(instance, i as vk::DeviceSize);
            }
        }
    }

    /// Flush the entire buffer so device reads see host writes. Needed for
    /// host-visible memory without HOST_COHERENT.
    pub fn flush(&self) -> VulkanResult<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();
        unsafe {
            self.device
                .flush_mapped_memory_ranges(&[range])
                .map_err(VulkanError::Api)
        }
    }

    /// Descriptor info covering the whole buffer.
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: 0,
            range: self.buffer_size,
        }
    }

    /// Get the raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    /// Total buffer size in bytes, including alignment padding.
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.destroy_buffer(self.handle, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_of_one_is_identity() {
        assert_eq!(aligned_instance_size(13, 1), 13);
        assert_eq!(aligned_instance_size(13, 0), 13);
    }

    #[test]
    fn aligns_up_to_power_of_two() {
        assert_eq!(aligned_instance_size(13, 16), 16);
        assert_eq!(aligned_instance_size(16, 16), 16);
        assert_eq!(aligned_instance_size(17, 16), 32);
        assert_eq!(aligned_instance_size(1, 256), 256);
        assert_eq!(aligned_instance_size(256, 256), 256);
        assert_eq!(aligned_instance_size(257, 256), 512);
    }

    #[test]
    fn aligned_size_never_shrinks() {
        for size in [1u64, 7, 16, 63, 64, 65, 4096] {
            for align in [1u64, 4, 16, 64, 256] {
                let aligned = aligned_instance_size(size, align);
                assert!(aligned >= size);
                if align > 1 {
                    assert_eq!(aligned % align, 0);
                }
            }
        }
    }
}
