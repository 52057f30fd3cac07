//! Probing of the compiled-in backends.
//!
//! `Backend::Auto` takes the first ready entry of [`probe_backends`]; the
//! `backends` command prints the same list.

use std::fmt;

use super::Backend;

/// Outcome of probing one backend.
#[derive(Debug, Clone)]
pub struct BackendProbe {
    /// Probed backend.
    pub backend: Backend,
    /// Device the backend would run on, or why it cannot run.
    pub device: Result<String, String>,
}

impl BackendProbe {
    /// True when a pipeline can be created on this backend.
    pub fn is_ready(&self) -> bool {
        self.device.is_ok()
    }

    fn cpu() -> Self {
        Self {
            backend: Backend::Cpu,
            device: Ok(format!("{} rayon threads", rayon::current_num_threads())),
        }
    }

    #[cfg(feature = "wgpu")]
    fn wgpu() -> Self {
        let device = super::WgpuPrimitives::probe_adapter()
            .map(|info| format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend))
            .ok_or_else(|| "no compatible adapter".to_string());
        Self { backend: Backend::Wgpu, device }
    }

    #[cfg(not(feature = "wgpu"))]
    fn wgpu() -> Self {
        Self {
            backend: Backend::Wgpu,
            device: Err("not compiled in (enable the `gpu` feature)".to_string()),
        }
    }
}

impl fmt::Display for BackendProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.backend {
            Backend::Wgpu => "wgpu",
            _ => "CPU",
        };
        match &self.device {
            Ok(device) => write!(f, "[+] {label}: {device}"),
            Err(reason) => write!(f, "[-] {label}: {reason}"),
        }
    }
}

/// Probes every backend in preference order (GPU first).
pub fn probe_backends() -> Vec<BackendProbe> {
    vec![BackendProbe::wgpu(), BackendProbe::cpu()]
}

/// Best ready backend; the CPU is always ready.
pub fn select_best_backend() -> Backend {
    probe_backends()
        .into_iter()
        .find(BackendProbe::is_ready)
        .map_or(Backend::Cpu, |p| p.backend)
}

/// One line per backend, as printed by `normproc backends`.
pub fn describe_backends() -> String {
    probe_backends()
        .iter()
        .map(|p| format!("{p}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_ready() {
        let probes = probe_backends();
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].backend, Backend::Wgpu);
        assert!(probes.iter().any(|p| p.backend == Backend::Cpu && p.is_ready()));
        assert!(describe_backends().contains("[+] CPU"));
        assert!(select_best_backend().is_available());
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_wgpu_reported_missing_without_feature() {
        let probe = BackendProbe::wgpu();
        assert!(!probe.is_ready());
        assert!(probe.to_string().starts_with("[-] wgpu"));
        assert_eq!(select_best_backend(), Backend::Cpu);
    }
}
