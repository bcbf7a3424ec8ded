/// Number of CUDA devices visible to this process.
///
/// Always 0 when built without the `cuda` feature or when the driver cannot be
/// initialised.
#[cfg(feature = "cuda")]
pub fn cuda_device_count() -> usize {
    match cudarc::driver::CudaDevice::count() {
        Ok(count) => usize::try_from(count).unwrap_or(0),
        Err(e) => {
            tracing::debug!(error = %e, "CUDA driver unavailable");
            0
        }
    }
}

#[cfg(not(feature = "cuda"))]
pub fn cuda_device_count() -> usize {
    0
}

pub fn cuda_available() -> bool {
    cuda_device_count() > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_matches_count() {
        assert_eq!(cuda_available(), cuda_device_count() > 0);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cpu_build_reports_no_devices() {
        assert_eq!(cuda_device_count(), 0);
        assert!(!cuda_available());
    }
}
