use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerated providers for this platform, in preference order.
///
/// ort silently falls back to the CPU provider when none of them can be
/// registered, so an empty list simply means CPU inference.
pub fn platform_execution_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());
    providers
}
