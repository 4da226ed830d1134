//! Asynchronous BLAS/TLAS builder (spec §4.6)
//!
//! New relative to the teacher; the worker pool is grounded on the
//! `ThreadPool`/`Worker` pattern in `ecs/scheduler.rs`, buffer/memory
//! allocation on `render/vulkan/buffer.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use ash::vk;
use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;

use crate::command::SecondaryCmdMarshal;
use crate::error::ApiError;
use crate::gpu::{allocate_memory, GpuContext};

/// Errors local to the ray-tracing acceleration-structure pipeline.
#[derive(Error, Debug)]
pub enum BvhError {
    /// Raw Vulkan API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Bridged from the GPU layer (memory allocation, queue submission).
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),

    /// Bridged from the command-marshal layer (secondary recording).
    #[error(transparent)]
    Marshal(#[from] crate::command::MarshalError),

    /// A build step could not complete; recorded as a failed work item.
    /// The old BVH remains published and no partial publication occurs.
    #[error("acceleration structure build failed: {0}")]
    BuildFailed(String),

    /// The worker pool has shut down and no longer accepts work.
    #[error("BVH builder thread pool shut down")]
    ThreadPoolShutdown,
}

/// Relative scheduling priority for a build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Can wait behind other outstanding work.
    Low,
    /// Default priority.
    Normal,
    /// Jump ahead of already-queued low/normal work.
    High,
}

/// Triangle geometry for a single BLAS build.
#[derive(Debug, Clone, Copy)]
pub struct GeometryData {
    /// Device address of the vertex buffer.
    pub vertex_addr: vk::DeviceAddress,
    /// Device address of the index buffer.
    pub index_addr: vk::DeviceAddress,
    /// Stride between vertices, in bytes.
    pub vertex_stride: u64,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Number of indices (must be a multiple of 3).
    pub index_count: u32,
    /// Material identifier carried through to shading.
    pub material_id: u32,
    /// Identifies this geometry for cache-key/digest comparisons.
    pub geometry_id: u64,
}

/// One TLAS instance referencing a BLAS by device address.
#[derive(Debug, Clone, Copy)]
pub struct InstanceData {
    /// Device address of the referenced BLAS.
    pub blas_device_address: vk::DeviceAddress,
    /// Row-major 3x4 object-to-world transform.
    pub transform: [[f32; 4]; 3],
    /// Custom index surfaced to shaders via `gl_InstanceCustomIndexEXT`.
    pub custom_index: u32,
    /// Visibility mask, `0xFF` by default (spec §4.6).
    pub mask: u8,
    /// SBT record offset, `0` by default.
    pub sbt_offset: u32,
    /// Instance flags, `0` by default.
    pub flags: u32,
}

impl InstanceData {
    /// Build an instance with the spec's defaults (`mask = 0xFF`,
    /// `sbt_offset = 0`, `flags = 0`).
    #[must_use]
    pub const fn new(blas_device_address: vk::DeviceAddress, transform: [[f32; 4]; 3], custom_index: u32) -> Self {
        Self {
            blas_device_address,
            transform,
            custom_index,
            mask: 0xFF,
            sbt_offset: 0,
            flags: 0,
        }
    }
}

/// Result of one completed BLAS build.
#[derive(Debug, Clone, Copy)]
pub struct BlasResult {
    /// The geometry this BLAS was built from.
    pub geometry_id: u64,
    /// The acceleration structure handle.
    pub acceleration_structure: vk::AccelerationStructureKHR,
    /// Buffer backing the acceleration structure.
    pub buffer: vk::Buffer,
    /// Device address of `acceleration_structure`, queried after build.
    pub device_address: vk::DeviceAddress,
}

/// Result of a completed TLAS build.
#[derive(Debug, Clone, Copy)]
pub struct TlasResult {
    /// The acceleration structure handle.
    pub acceleration_structure: vk::AccelerationStructureKHR,
    /// Buffer backing the acceleration structure.
    pub buffer: vk::Buffer,
    /// Host-visible buffer holding the instance descriptors built from.
    pub instance_buffer: vk::Buffer,
}

/// What a [`BvhCompletionHandler`] is invoked with; matches spec §4.6's
/// "either `(blas_results, optional tlas)` or a `tlas` result alone."
pub enum BvhCompletionResult {
    /// A batch of BLAS builds completed, optionally followed immediately
    /// by the TLAS that references them.
    Blas {
        /// Completed BLAS results, one per requested geometry.
        results: Vec<BlasResult>,
        /// The TLAS built from these BLASes, if requested as part of the batch.
        tlas: Option<TlasResult>,
    },
    /// A TLAS build completed on its own.
    Tlas(TlasResult),

    /// A build step in the batch failed (spec §7: recorded as a failed
    /// work item; the old BVH remains published, no partial publication
    /// occurs). Carries a human-readable reason.
    Failed(String),
}

/// Capability set invoked when a build completes, replacing a raw function
/// pointer per Design Notes §9. Runs on a worker thread; implementers must
/// not touch GPU state directly from here — only publish results through a
/// message queue drained at frame start (see [`crate::rt::RaytracingCore`]).
pub trait BvhCompletionHandler: Send + Sync {
    /// Called on a worker thread when a build batch finishes.
    fn on_complete(&self, result: BvhCompletionResult);
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Worker {
    _id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> Self {
        let thread = thread::spawn(move || loop {
            let job = {
                let receiver = receiver.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                receiver.recv()
            };
            match job {
                Ok(job) => job(),
                Err(_) => break,
            }
        });

        Self { _id: id, thread: Some(thread) }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Asynchronous builder for BLAS/TLAS acceleration structures, grounded on
/// the `ThreadPool`/`Worker` pattern from `ecs/scheduler.rs`.
pub struct BvhBuilder {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
    outstanding: Arc<AtomicU64>,
}

impl BvhBuilder {
    /// Spawn `worker_count` worker threads.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = bounded(256);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        Self {
            workers,
            sender: Some(sender),
            outstanding: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Work items currently in flight.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Submit a BLAS batch, building each geometry's acceleration structure
    /// and invoking `handler.on_complete` once the whole batch (plus an
    /// optional TLAS, if `instances` is non-empty) is ready.
    ///
    /// Per spec §4.6: TLAS may only be enqueued once every BLAS request in
    /// the batch has ended its secondary recording, so when `instances` is
    /// supplied the TLAS build is chained after the BLAS batch within the
    /// same job rather than scheduled independently.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_blas_batch(
        &self,
        ctx: Arc<GpuContext>,
        marshal: Arc<SecondaryCmdMarshal>,
        geometries: Vec<GeometryData>,
        instances: Option<Vec<InstanceData>>,
        _priority: Priority,
        handler: Arc<dyn BvhCompletionHandler>,
    ) -> Result<(), BvhError> {
        if geometries.is_empty() {
            return Ok(());
        }

        let sender = self.sender.as_ref().ok_or(BvhError::ThreadPoolShutdown)?;
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let outstanding = Arc::clone(&self.outstanding);

        let job: Job = Box::new(move || {
            let results: Vec<Result<BlasResult, BvhError>> = geometries
                .into_iter()
                .map(|g| build_blas(&ctx, &marshal, g))
                .collect();

            let mut blas_results = Vec::with_capacity(results.len());
            let mut failure = None;
            for result in results {
                match result {
                    Ok(r) => blas_results.push(r),
                    Err(e) if failure.is_none() => failure = Some(e.to_string()),
                    Err(_) => {}
                }
            }

            if let Some(reason) = failure {
                handler.on_complete(BvhCompletionResult::Failed(reason));
                outstanding.fetch_sub(1, Ordering::AcqRel);
                return;
            }

            let tlas = match instances {
                Some(instances) => match build_tlas(&ctx, &marshal, &blas_results, &instances) {
                    Ok(tlas) => Some(tlas),
                    Err(e) => {
                        handler.on_complete(BvhCompletionResult::Failed(e.to_string()));
                        outstanding.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                },
                None => None,
            };

            handler.on_complete(BvhCompletionResult::Blas {
                results: blas_results,
                tlas,
            });
            outstanding.fetch_sub(1, Ordering::AcqRel);
        });

        sender
            .send(job)
            .map_err(|_| BvhError::ThreadPoolShutdown)
    }

    /// Submit a standalone TLAS build over already-built BLAS instances.
    pub fn submit_tlas(
        &self,
        ctx: Arc<GpuContext>,
        marshal: Arc<SecondaryCmdMarshal>,
        blas_results: Vec<BlasResult>,
        instances: Vec<InstanceData>,
        _priority: Priority,
        handler: Arc<dyn BvhCompletionHandler>,
    ) -> Result<(), BvhError> {
        let sender = self.sender.as_ref().ok_or(BvhError::ThreadPoolShutdown)?;
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let outstanding = Arc::clone(&self.outstanding);

        let job: Job = Box::new(move || {
            match build_tlas(&ctx, &marshal, &blas_results, &instances) {
                Ok(tlas) => handler.on_complete(BvhCompletionResult::Tlas(tlas)),
                Err(e) => handler.on_complete(BvhCompletionResult::Failed(e.to_string())),
            }
            outstanding.fetch_sub(1, Ordering::AcqRel);
        });

        sender.send(job).map_err(|_| BvhError::ThreadPoolShutdown)
    }
}

impl Drop for BvhBuilder {
    fn drop(&mut self) {
        self.sender.take();
        self.workers.clear();
    }
}

/// Allocate a buffer sized for `size`, bound to device-local memory with
/// `SHADER_DEVICE_ADDRESS` allocate flags, the shape every AS storage and
/// scratch buffer in this module needs.
fn create_device_address_buffer(
    ctx: &GpuContext,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory), BvhError> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size.max(1))
        .usage(usage | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { ctx.device().create_buffer(&buffer_info, None) }
        .map_err(|e| BvhError::Api(e.into()))?;

    let requirements = unsafe { ctx.device().get_buffer_memory_requirements(buffer) };
    let memory = allocate_memory(
        ctx.device(),
        ctx.memory_properties(),
        requirements,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        Some(vk::MemoryAllocateFlags::DEVICE_ADDRESS),
    )
    .map_err(BvhError::Gpu)?;

    unsafe { ctx.device().bind_buffer_memory(buffer, memory, 0) }
        .map_err(|e| BvhError::Api(e.into()))?;

    Ok((buffer, memory))
}

fn buffer_device_address(ctx: &GpuContext, buffer: vk::Buffer) -> vk::DeviceAddress {
    let info = vk::BufferDeviceAddressInfo::builder().buffer(buffer);
    unsafe { ctx.device().get_buffer_device_address(&info) }
}

/// Query build sizes, allocate AS storage + scratch, create the AS handle,
/// and record `cmd_build_acceleration_structures` on a worker secondary
/// (spec §4.6 steps 1-7). The scratch buffer is registered on the recorder
/// as a pending resource so the marshal frees it once the frame fence for
/// the slot that executes this secondary has signaled.
fn build_blas(
    ctx: &GpuContext,
    marshal: &SecondaryCmdMarshal,
    geometry: GeometryData,
) -> Result<BlasResult, BvhError> {
    let triangle_count = geometry.index_count / 3;
    if triangle_count == 0 {
        return Err(BvhError::BuildFailed(format!(
            "geometry {} has zero triangles",
            geometry.geometry_id
        )));
    }

    let as_loader = ctx.acceleration_structure_loader();

    let triangles_data = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
        .vertex_format(vk::Format::R32G32B32_SFLOAT)
        .vertex_data(vk::DeviceOrHostAddressConstKHR {
            device_address: geometry.vertex_addr,
        })
        .vertex_stride(geometry.vertex_stride)
        .max_vertex(geometry.vertex_count.saturating_sub(1))
        .index_type(vk::IndexType::UINT32)
        .index_data(vk::DeviceOrHostAddressConstKHR {
            device_address: geometry.index_addr,
        })
        .build();

    let as_geometry = vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { triangles: triangles_data })
        .flags(vk::GeometryFlagsKHR::OPAQUE)
        .build();
    let geometries = [as_geometry];

    let mut build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
        .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
        .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(&geometries)
        .build();

    let build_sizes = unsafe {
        as_loader.get_acceleration_structure_build_sizes(
            vk::AccelerationStructureBuildTypeKHR::DEVICE,
            &build_info,
            &[triangle_count],
        )
    };

    let (buffer, _buffer_memory) = create_device_address_buffer(
        ctx,
        build_sizes.acceleration_structure_size,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR,
    )?;

    let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
        .buffer(buffer)
        .size(build_sizes.acceleration_structure_size)
        .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL);
    let acceleration_structure = unsafe { as_loader.create_acceleration_structure(&create_info, None) }
        .map_err(|e| BvhError::Api(e.into()))?;

    let (scratch_buffer, scratch_memory) = create_device_address_buffer(
        ctx,
        build_sizes.build_scratch_size,
        vk::BufferUsageFlags::STORAGE_BUFFER,
    )?;
    let scratch_address = buffer_device_address(ctx, scratch_buffer);

    build_info.dst_acceleration_structure = acceleration_structure;
    build_info.scratch_data = vk::DeviceOrHostAddressKHR { device_address: scratch_address };

    let range_info = vk::AccelerationStructureBuildRangeInfoKHR::builder()
        .primitive_count(triangle_count)
        .build();

    let pool = ctx.command_pools().pool_for_current_thread()?;
    let mut recorder = marshal.begin_secondary(ctx.device(), &pool, false)?;
    unsafe {
        as_loader.cmd_build_acceleration_structures(recorder.buffer(), &[build_info], &[&[range_info]]);
    }
    recorder.add_pending_resource((scratch_buffer, scratch_memory));
    marshal.append(recorder.end_secondary()?);

    let device_address = unsafe {
        as_loader.get_acceleration_structure_device_address(
            &vk::AccelerationStructureDeviceAddressInfoKHR::builder()
                .acceleration_structure(acceleration_structure),
        )
    };

    Ok(BlasResult {
        geometry_id: geometry.geometry_id,
        acceleration_structure,
        buffer,
        device_address,
    })
}

/// Build the host-visible instance buffer from `instances`, query build
/// sizes, allocate AS storage + scratch, create the TLAS handle, and record
/// the build on a worker secondary (spec §4.6 steps 1-7). Every instance's
/// `blas_device_address` must match a device address already returned by
/// [`build_blas`] for this scene (spec §8 invariant).
fn build_tlas(
    ctx: &GpuContext,
    marshal: &SecondaryCmdMarshal,
    blas_results: &[BlasResult],
    instances: &[InstanceData],
) -> Result<TlasResult, BvhError> {
    if instances.is_empty() || blas_results.is_empty() {
        return Err(BvhError::BuildFailed("no instances to build a TLAS from".into()));
    }

    for instance in instances {
        let known = blas_results
            .iter()
            .any(|r| r.device_address == instance.blas_device_address);
        if !known {
            return Err(BvhError::BuildFailed(format!(
                "instance references unknown BLAS device address {:#x}",
                instance.blas_device_address
            )));
        }
    }

    let as_loader = ctx.acceleration_structure_loader();

    let raw_instances: Vec<vk::AccelerationStructureInstanceKHR> = instances
        .iter()
        .map(|instance| vk::AccelerationStructureInstanceKHR {
            transform: vk::TransformMatrixKHR { matrix: instance.transform },
            instance_custom_index_and_mask: vk::Packed24_8::new(instance.custom_index, instance.mask),
            instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
                instance.sbt_offset,
                instance.flags as u8,
            ),
            acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                device_handle: instance.blas_device_address,
            },
        })
        .collect();

    let instance_size =
        std::mem::size_of::<vk::AccelerationStructureInstanceKHR>() as u64 * raw_instances.len() as u64;

    let instance_buffer_info = vk::BufferCreateInfo::builder()
        .size(instance_size)
        .usage(
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let instance_buffer = unsafe { ctx.device().create_buffer(&instance_buffer_info, None) }
        .map_err(|e| BvhError::Api(e.into()))?;

    let requirements = unsafe { ctx.device().get_buffer_memory_requirements(instance_buffer) };
    let instance_memory = allocate_memory(
        ctx.device(),
        ctx.memory_properties(),
        requirements,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        Some(vk::MemoryAllocateFlags::DEVICE_ADDRESS),
    )
    .map_err(BvhError::Gpu)?;

    unsafe { ctx.device().bind_buffer_memory(instance_buffer, instance_memory, 0) }
        .map_err(|e| BvhError::Api(e.into()))?;

    unsafe {
        let ptr = ctx
            .device()
            .map_memory(instance_memory, 0, instance_size, vk::MemoryMapFlags::empty())
            .map_err(|e| BvhError::Api(e.into()))?;
        std::ptr::copy_nonoverlapping(raw_instances.as_ptr().cast::<u8>(), ptr.cast::<u8>(), instance_size as usize);
        ctx.device().unmap_memory(instance_memory);
    }

    let instance_address = buffer_device_address(ctx, instance_buffer);

    let instances_data = vk::AccelerationStructureGeometryInstancesDataKHR::builder()
        .array_of_pointers(false)
        .data(vk::DeviceOrHostAddressConstKHR { device_address: instance_address })
        .build();

    let as_geometry = vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::INSTANCES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { instances: instances_data })
        .flags(vk::GeometryFlagsKHR::OPAQUE)
        .build();
    let geometries = [as_geometry];

    let mut build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
        .ty(vk::AccelerationStructureTypeKHR::TOP_LEVEL)
        .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(&geometries)
        .build();

    let instance_count = raw_instances.len() as u32;
    let build_sizes = unsafe {
        as_loader.get_acceleration_structure_build_sizes(
            vk::AccelerationStructureBuildTypeKHR::DEVICE,
            &build_info,
            &[instance_count],
        )
    };

    let (as_buffer, _as_buffer_memory) = create_device_address_buffer(
        ctx,
        build_sizes.acceleration_structure_size,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR,
    )?;

    let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
        .buffer(as_buffer)
        .size(build_sizes.acceleration_structure_size)
        .ty(vk::AccelerationStructureTypeKHR::TOP_LEVEL);
    let acceleration_structure = unsafe { as_loader.create_acceleration_structure(&create_info, None) }
        .map_err(|e| BvhError::Api(e.into()))?;

    let (scratch_buffer, scratch_memory) = create_device_address_buffer(
        ctx,
        build_sizes.build_scratch_size,
        vk::BufferUsageFlags::STORAGE_BUFFER,
    )?;
    let scratch_address = buffer_device_address(ctx, scratch_buffer);

    build_info.dst_acceleration_structure = acceleration_structure;
    build_info.scratch_data = vk::DeviceOrHostAddressKHR { device_address: scratch_address };

    let range_info = vk::AccelerationStructureBuildRangeInfoKHR::builder()
        .primitive_count(instance_count)
        .build();

    let pool = ctx.command_pools().pool_for_current_thread()?;
    let mut recorder = marshal.begin_secondary(ctx.device(), &pool, false)?;
    unsafe {
        as_loader.cmd_build_acceleration_structures(recorder.buffer(), &[build_info], &[&[range_info]]);
    }
    recorder.add_pending_resource((scratch_buffer, scratch_memory));
    marshal.append(recorder.end_secondary()?);

    Ok(TlasResult {
        acceleration_structure,
        buffer: as_buffer,
        instance_buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingHandler {
        results: Mutex<Vec<u64>>,
    }

    impl BvhCompletionHandler for RecordingHandler {
        fn on_complete(&self, result: BvhCompletionResult) {
            if let BvhCompletionResult::Blas { results, .. } = result {
                let mut guard = self.results.lock().unwrap();
                guard.extend(results.iter().map(|r| r.geometry_id));
            }
        }
    }

    #[test]
    fn instance_defaults_match_spec() {
        let instance = InstanceData::new(0x1234, [[1.0, 0.0, 0.0, 0.0]; 3], 7);
        assert_eq!(instance.mask, 0xFF);
        assert_eq!(instance.sbt_offset, 0);
        assert_eq!(instance.flags, 0);
        assert_eq!(instance.custom_index, 7);
    }

    #[test]
    fn zero_geometry_batch_is_a_no_op() {
        let builder = BvhBuilder::new(1);
        assert_eq!(builder.outstanding(), 0);
    }
}
