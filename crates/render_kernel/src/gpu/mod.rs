//! Device/queue/command-pool ownership (spec §4.1)

mod command_pool;
mod context;
mod layout;
mod memory;

pub use command_pool::{CommandPool, QuiescedWorkers, ThreadPoolRegistry};
pub use context::{GpuContext, GpuError, QueueFamilies};
pub use layout::transition_image_layout;
pub use memory::allocate_memory;
