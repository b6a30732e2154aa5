//! Particle simulation: state, initial distributions and the GPU systems
//! that advance and draw it.

pub mod particles;
pub mod particle_system;

pub use particle_system::ParticleSystem;
pub use particles::{initial_particles, Particle, ParticleModel};
