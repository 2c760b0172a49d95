// ============================================================
// Layer 5 — Execution Context
// ============================================================
// Picks the compute device once, at start-up, and runs the
// whole pipeline generically over the matching Burn backend:
//
//   DeviceKind::Gpu  → Autodiff<Wgpu>     (cargo feature "wgpu")
//   DeviceKind::Cpu  → Autodiff<NdArray>
//   DeviceKind::Auto → GPU when compiled in and an adapter
//                      answers, otherwise CPU (with a warning)
//
// Code that needs a backend implements BackendTask instead of
// naming a concrete backend type.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    tensor::backend::AutodiffBackend,
};
#[cfg(feature = "wgpu")]
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use serde::{Deserialize, Serialize};

/// Which device the user asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Auto,
    Gpu,
    Cpu,
}

/// Work that runs on whichever autodiff backend was resolved.
pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<Self::Output>;
}

#[derive(Debug, Clone)]
pub enum ExecutionContext {
    #[cfg(feature = "wgpu")]
    Gpu(WgpuDevice),
    Cpu(NdArrayDevice),
}

impl ExecutionContext {
    pub fn resolve(kind: DeviceKind) -> Result<Self> {
        Self::resolve_with(kind, gpu_available)
    }

    /// `gpu_check` is only consulted when a GPU could be used.
    fn resolve_with(kind: DeviceKind, gpu_check: impl FnOnce() -> bool) -> Result<Self> {
        let ctx = match kind {
            DeviceKind::Cpu => Self::Cpu(NdArrayDevice::Cpu),
            DeviceKind::Gpu => {
                anyhow::ensure!(
                    gpu_check(),
                    "GPU execution requested but no wgpu adapter is available"
                );
                Self::gpu()?
            }
            DeviceKind::Auto if gpu_check() => Self::gpu()?,
            DeviceKind::Auto => {
                tracing::warn!("No usable GPU adapter found, falling back to CPU");
                Self::Cpu(NdArrayDevice::Cpu)
            }
        };
        tracing::info!("Using device: {}", ctx.name());
        Ok(ctx)
    }

    #[cfg(feature = "wgpu")]
    fn gpu() -> Result<Self> {
        Ok(Self::Gpu(WgpuDevice::default()))
    }

    #[cfg(not(feature = "wgpu"))]
    fn gpu() -> Result<Self> {
        anyhow::bail!("GPU execution requested but this binary was built without the 'wgpu' feature")
    }

    pub fn name(&self) -> String {
        match self {
            #[cfg(feature = "wgpu")]
            Self::Gpu(device) => format!("wgpu ({device:?})"),
            Self::Cpu(_) => "ndarray (cpu)".to_string(),
        }
    }

    /// Run `task` on this context's backend.
    pub fn run<T: BackendTask>(self, task: T) -> Result<T::Output> {
        match self {
            #[cfg(feature = "wgpu")]
            Self::Gpu(device) => task.run::<Autodiff<Wgpu>>(device),
            Self::Cpu(device) => task.run::<Autodiff<NdArray>>(device),
        }
    }
}

/// Runs one tiny op on the default wgpu device. Adapter selection
/// panics inside burn when no adapter exists, so the panic is caught
/// and its message silenced.
#[cfg(feature = "wgpu")]
fn gpu_available() -> bool {
    use burn::tensor::Tensor;

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let ok = std::panic::catch_unwind(|| {
        let device = WgpuDevice::default();
        Tensor::<Wgpu, 1>::from_floats([1.0], &device).into_data();
    })
    .is_ok();
    std::panic::set_hook(hook);

    if !ok {
        tracing::debug!("wgpu adapter check failed");
    }
    ok
}

#[cfg(not(feature = "wgpu"))]
fn gpu_available() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::prelude::*;

    /// Sums a small tensor on the resolved backend
    struct SumTask;

    impl BackendTask for SumTask {
        type Output = usize;

        fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<usize> {
            let t = Tensor::<B, 1>::from_floats([1.0, 2.0, 3.0], &device);
            Ok(t.sum().into_scalar().elem::<f64>() as usize)
        }
    }

    #[test]
    fn test_cpu_context_runs_task() {
        let ctx = ExecutionContext::resolve(DeviceKind::Cpu).unwrap();
        assert_eq!(ctx.name(), "ndarray (cpu)");
        assert_eq!(ctx.run(SumTask).unwrap(), 6);
    }

    #[test]
    fn test_device_kind_serde_is_lowercase() {
        let json = serde_json::to_string(&DeviceKind::Gpu).unwrap();
        assert_eq!(json, "\"gpu\"");
        let kind: DeviceKind = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(kind, DeviceKind::Auto);
    }

    #[test]
    fn test_auto_falls_back_to_cpu_without_adapter() {
        let ctx = ExecutionContext::resolve_with(DeviceKind::Auto, || false).unwrap();
        assert!(matches!(ctx, ExecutionContext::Cpu(_)));
        assert_eq!(ctx.run(SumTask).unwrap(), 6);
    }

    #[test]
    fn test_explicit_gpu_without_adapter_is_an_error() {
        let err = ExecutionContext::resolve_with(DeviceKind::Gpu, || false).unwrap_err();
        assert!(err.to_string().contains("no wgpu adapter"));
    }

    #[test]
    fn test_cpu_never_checks_for_an_adapter() {
        let ctx = ExecutionContext::resolve_with(DeviceKind::Cpu, || panic!("adapter check must not run"))
            .unwrap();
        assert!(matches!(ctx, ExecutionContext::Cpu(_)));
    }

    #[cfg(feature = "wgpu")]
    #[test]
    fn test_auto_uses_gpu_when_adapter_answers() {
        let ctx = ExecutionContext::resolve_with(DeviceKind::Auto, || true).unwrap();
        assert!(matches!(ctx, ExecutionContext::Gpu(_)));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_gpu_without_feature_is_an_error() {
        assert!(ExecutionContext::resolve_with(DeviceKind::Gpu, || true).is_err());
        let ctx = ExecutionContext::resolve(DeviceKind::Auto).unwrap();
        assert!(matches!(ctx, ExecutionContext::Cpu(_)));
    }
}
