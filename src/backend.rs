//! Backend selection
//!
//! NdArray (CPU) by default, Wgpu when built with `--features wgpu`.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray;

/// Backend the trainer runs on
pub type TrainingBackend = Autodiff<DefaultBackend>;

pub fn default_device() -> <DefaultBackend as Backend>::Device {
    <DefaultBackend as Backend>::Device::default()
}

pub fn backend_name() -> &'static str {
    #[cfg(feature = "wgpu")]
    {
        "Wgpu (GPU)"
    }

    #[cfg(not(feature = "wgpu"))]
    {
        "NdArray (CPU)"
    }
}
