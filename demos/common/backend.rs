use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

#[cfg(feature = "dev-f16")]
pub type Element = burn::tensor::f16;
#[cfg(not(feature = "dev-f16"))]
pub type Element = f32;

#[cfg(any(feature = "dev-tch-cpu", feature = "dev-tch-gpu"))]
pub type MainBackend = burn::backend::libtorch::LibTorch<Element, i32>;
#[cfg(feature = "dev-wgpu")]
pub type MainBackend = burn::backend::wgpu::Wgpu<Element, i32>;
#[cfg(feature = "dev-cuda")]
pub type MainBackend = burn::backend::Cuda<Element, i32>;
// ndarray is also the fallback when no other backend is selected
#[cfg(not(any(
    feature = "dev-tch-cpu",
    feature = "dev-tch-gpu",
    feature = "dev-wgpu",
    feature = "dev-cuda"
)))]
pub type MainBackend = burn::backend::NdArray<Element, i32>;

pub trait MainDevice: Backend {
    fn main_device() -> <Self as Backend>::Device {
        Default::default()
    }
}

#[cfg(not(feature = "dev-tch-gpu"))]
impl MainDevice for MainBackend {}
#[cfg(all(feature = "dev-tch-gpu", not(target_os = "macos")))]
impl MainDevice for MainBackend {
    fn main_device() -> <Self as Backend>::Device {
        burn::backend::libtorch::LibTorchDevice::Cuda(0)
    }
}
#[cfg(all(feature = "dev-tch-gpu", target_os = "macos"))]
impl MainDevice for MainBackend {
    fn main_device() -> <Self as Backend>::Device {
        burn::backend::libtorch::LibTorchDevice::Mps
    }
}

pub type MainAutoBackend = burn::backend::Autodiff<MainBackend>;
impl MainDevice for MainAutoBackend {
    fn main_device() -> <Self as Backend>::Device {
        <<Self as AutodiffBackend>::InnerBackend as MainDevice>::main_device()
    }
}
