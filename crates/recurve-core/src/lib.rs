pub mod activations;
mod executor;
pub mod gemm;
pub mod kernels;
pub mod random_provider;
pub mod thread_pool;
mod tile;

pub use activations::{CellOutput, GateActivationFn};
pub use executor::Executor;
pub use gemm::{gemm, gemm_into_tile};
pub use thread_pool::{JobHandle, ThreadPool, WaitGroup};
pub use tile::{SharedSlice, SharedTile};
