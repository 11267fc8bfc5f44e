use std::fmt;
use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Where inference runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeContext {
    Cpu,
    Accelerator { device_id: u32 },
}

impl ComputeContext {
    /// Negative ids select the CPU; `n >= 0` selects accelerator device `n`.
    pub fn from_ctx_id(ctx_id: i32) -> Self {
        if ctx_id < 0 {
            ComputeContext::Cpu
        } else {
            ComputeContext::Accelerator {
                device_id: ctx_id as u32,
            }
        }
    }
}

impl fmt::Display for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeContext::Cpu => write!(f, "cpu"),
            ComputeContext::Accelerator { device_id } => write!(f, "accelerator:{device_id}"),
        }
    }
}

/// Execution providers for `ctx` on the current platform.
///
/// ONNX Runtime falls back to CPU if the accelerator provider is unavailable.
pub fn execution_providers(ctx: ComputeContext) -> Vec<ExecutionProviderDispatch> {
    let ComputeContext::Accelerator { device_id } = ctx else {
        return vec![];
    };
    #[cfg(target_os = "macos")]
    {
        let _ = device_id;
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![ort::execution_providers::CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build()]
    }
}

/// Build an inference session for `model_path` on `ctx`.
pub fn build_session(
    model_path: &Path,
    ctx: ComputeContext,
) -> Result<Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(execution_providers(ctx))?
        .commit_from_file(model_path)?;
    Ok(session)
}
