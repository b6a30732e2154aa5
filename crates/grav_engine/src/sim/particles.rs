//! Particle state and initial distributions
//!
//! A [`Particle`] is the unit of both vertex input and compute shader
//! state: one device-local buffer serves as vertex buffer for the draw and
//! storage buffer for the integration dispatch. Initial placement runs on
//! the host with a seeded generator, so a given seed always produces the
//! same starting field.

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::DistributionKind;
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::pipeline::VertexInput;

/// One particle, as laid out in the shared vertex/storage buffer.
///
/// Field order and packing must match both the vertex attribute offsets and
/// the shader's std430 `Particle` struct: 32 bytes, no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position in normalized device coordinates.
    pub position: [f32; 2],
    /// Velocity in NDC units per second.
    pub velocity: [f32; 2],
    /// RGBA point color.
    pub color: [f32; 4],
}

impl Particle {
    /// Vertex input description for the particle buffer.
    pub fn vertex_input() -> VertexInput {
        VertexInput {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<Particle>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: 0,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: 8,
                },
                vk::VertexInputAttributeDescription {
                    location: 2,
                    binding: 0,
                    format: vk::Format::R32G32B32A32_SFLOAT,
                    offset: 16,
                },
            ],
        }
    }
}

const DISK_RADIUS: f32 = 0.5;
const DISK_VELOCITY_MULTIPLIER: f32 = 2.5;

const CLUSTER_CENTER_1: Vector2<f32> = Vector2::new(-0.3, -0.3);
const CLUSTER_CENTER_2: Vector2<f32> = Vector2::new(0.3, 0.3);
const CLUSTER_HALF_EXTENT: f32 = 0.2;
const CLUSTER_VELOCITY_DAMPING: f32 = 0.5;

fn perpendicular(v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(-v.y, v.x)
}

/// Generate the initial particle field for `kind`, deterministically from
/// `seed`.
pub fn initial_particles(count: u32, kind: DistributionKind, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    match kind {
        DistributionKind::SpinningDisk => spinning_disk(count, &mut rng),
        DistributionKind::TwinClusters => twin_clusters(count, &mut rng),
    }
}

/// Uniform disk around the origin with a tangential velocity field that
/// strengthens quadratically with distance from center.
fn spinning_disk(count: u32, rng: &mut StdRng) -> Vec<Particle> {
    (0..count)
        .map(|_| {
            // sqrt keeps the area density uniform.
            let r = DISK_RADIUS * rng.gen::<f32>().sqrt();
            let theta = rng.gen::<f32>() * std::f32::consts::TAU;
            let position = Vector2::new(r * theta.cos(), r * theta.sin());

            let distance_sq = position.dot(&position);
            let velocity = perpendicular(position) * distance_sq * DISK_VELOCITY_MULTIPLIER;

            let t = r / DISK_RADIUS;
            Particle {
                position: position.into(),
                velocity: velocity.into(),
                color: [1.0, 1.0 - 0.6 * t, 0.3, 1.0],
            }
        })
        .collect()
}

/// Two square clusters on opposite sides of the origin, each with a damped
/// swirl. The first half of the particles belongs to the first cluster, the
/// second half to the second.
fn twin_clusters(count: u32, rng: &mut StdRng) -> Vec<Particle> {
    let cluster = |center: Vector2<f32>, color: [f32; 4], rng: &mut StdRng| {
        let x = center.x + (rng.gen::<f32>() * 2.0 - 1.0) * CLUSTER_HALF_EXTENT;
        let y = center.y + (rng.gen::<f32>() * 2.0 - 1.0) * CLUSTER_HALF_EXTENT;
        let position = Vector2::new(x, y);

        let offset = center - position;
        let velocity =
            perpendicular(position) * offset.dot(&offset) * CLUSTER_VELOCITY_DAMPING;

        Particle {
            position: position.into(),
            velocity: velocity.into(),
            color,
        }
    };

    let first_half = count / 2;
    (0..count)
        .map(|i| {
            if i < first_half {
                cluster(CLUSTER_CENTER_1, [1.0, 0.4, 0.2, 1.0], rng)
            } else {
                cluster(CLUSTER_CENTER_2, [0.2, 0.6, 1.0, 1.0], rng)
            }
        })
        .collect()
}

/// Particle buffer on the GPU: device-local, usable as vertex input, as a
/// compute storage buffer and as a transfer destination.
pub struct ParticleModel {
    device: Device,
    buffer: Buffer,
    particle_count: u32,
}

impl ParticleModel {
    /// Upload `particles` through a staging buffer into device-local
    /// memory.
    pub fn new(context: &VulkanContext, particles: &[Particle]) -> VulkanResult<Self> {
        let instance_size = std::mem::size_of::<Particle>() as vk::DeviceSize;
        let count = particles.len() as vk::DeviceSize;

        let mut staging = Buffer::new(
            context,
            instance_size,
            count,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            1,
        )?;
        staging.map()?;
        staging.write_slice(particles);

        let buffer = Buffer::new(
            context,
            instance_size,
            count,
            vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            1,
        )?;

        context.copy_buffer(staging.handle(), buffer.handle(), buffer.size())?;

        log::info!("Uploaded {} particles to device-local memory", count);

        Ok(Self {
            device: context.raw_device(),
            buffer,
            particle_count: particles.len() as u32,
        })
    }

    /// Bind the particle buffer as vertex input.
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        let buffers = [self.buffer.handle()];
        let offsets = [0];
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(command_buffer, 0, &buffers, &offsets);
        }
    }

    /// Draw every particle as a point primitive.
    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .cmd_draw(command_buffer, self.particle_count, 1, 0, 0);
        }
    }

    /// Descriptor info for binding the buffer as a compute storage buffer.
    pub fn storage_descriptor_info(&self) -> vk::DescriptorBufferInfo {
        self.buffer.descriptor_info()
    }

    /// Raw buffer handle, for pipeline barriers.
    pub fn buffer_handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Total buffer size in bytes.
    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }

    /// Number of particles in the buffer.
    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::mem::{offset_of, size_of};

    #[test]
    fn particle_is_tightly_packed() {
        assert_eq!(size_of::<Particle>(), 32);
        assert_eq!(offset_of!(Particle, position), 0);
        assert_eq!(offset_of!(Particle, velocity), 8);
        assert_eq!(offset_of!(Particle, color), 16);
    }

    #[test]
    fn vertex_input_matches_particle_layout() {
        let input = Particle::vertex_input();
        assert_eq!(input.bindings.len(), 1);
        assert_eq!(input.bindings[0].stride, 32);
        assert_eq!(input.attributes.len(), 3);
        assert_eq!(input.attributes[0].offset, 0);
        assert_eq!(input.attributes[1].offset, 8);
        assert_eq!(input.attributes[2].offset, 16);
        assert_eq!(input.attributes[2].format, vk::Format::R32G32B32A32_SFLOAT);
    }

    #[test]
    fn same_seed_reproduces_the_field() {
        let a = initial_particles(512, DistributionKind::SpinningDisk, 42);
        let b = initial_particles(512, DistributionKind::SpinningDisk, 42);
        assert_eq!(a, b);

        let c = initial_particles(512, DistributionKind::SpinningDisk, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn disk_stays_within_radius() {
        let particles = initial_particles(2048, DistributionKind::SpinningDisk, 7);
        assert_eq!(particles.len(), 2048);
        for p in &particles {
            let r = (p.position[0] * p.position[0] + p.position[1] * p.position[1]).sqrt();
            assert!(r <= DISK_RADIUS + 1e-5, "particle at radius {r}");
        }
    }

    #[test]
    fn disk_velocity_is_tangential_and_quadratic() {
        let particles = initial_particles(256, DistributionKind::SpinningDisk, 11);
        for p in &particles {
            let position = Vector2::new(p.position[0], p.position[1]);
            let velocity = Vector2::new(p.velocity[0], p.velocity[1]);
            let expected =
                perpendicular(position) * position.dot(&position) * DISK_VELOCITY_MULTIPLIER;
            assert_relative_eq!(velocity.x, expected.x, max_relative = 1e-5);
            assert_relative_eq!(velocity.y, expected.y, max_relative = 1e-5);
            // Tangential: no radial component.
            assert_relative_eq!(velocity.dot(&position), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn clusters_split_evenly_around_their_centers() {
        let count = 1024;
        let particles = initial_particles(count, DistributionKind::TwinClusters, 3);
        assert_eq!(particles.len(), count as usize);

        let half = (count / 2) as usize;
        for p in &particles[..half] {
            assert!((p.position[0] - CLUSTER_CENTER_1.x).abs() <= CLUSTER_HALF_EXTENT + 1e-5);
            assert!((p.position[1] - CLUSTER_CENTER_1.y).abs() <= CLUSTER_HALF_EXTENT + 1e-5);
        }
        for p in &particles[half..] {
            assert!((p.position[0] - CLUSTER_CENTER_2.x).abs() <= CLUSTER_HALF_EXTENT + 1e-5);
            assert!((p.position[1] - CLUSTER_CENTER_2.y).abs() <= CLUSTER_HALF_EXTENT + 1e-5);
        }

        // The two clusters carry distinct colors.
        assert_ne!(particles[0].color, particles[half].color);
    }
}
