#[cfg(feature = "dx12")]
pub(crate) use gfx_backend_dx12 as backend;
#[cfg(feature = "metal")]
pub(crate) use gfx_backend_metal as backend;
#[cfg(feature = "vulkan")]
pub(crate) use gfx_backend_vulkan as backend;
