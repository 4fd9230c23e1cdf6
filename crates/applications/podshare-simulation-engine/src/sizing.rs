//! Percentile-based request/limit sizing
//!
//! Mirrors how CPU requests are usually picked in practice: take a percentile
//! of the observed usage, scale it, and optionally derive a limit from the
//! request.

use podshare_core::{PodshareError, Result, SimulationObserver, SizingDecision, SizingParams};

use crate::model::Workload;

/// Sets `request` and `limit` on every workload from its own history
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSizer {
    params: SizingParams,
}

impl WorkloadSizer {
    /// Create a sizer, rejecting out-of-range parameters up front
    pub fn new(params: SizingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SizingParams {
        &self.params
    }

    /// Compute the sizing of one workload without applying it
    ///
    /// `request = round(percentile * request_factor)` and, when a limit factor
    /// is set, `limit = round(request * limit_factor)`.
    pub fn decide(&self, workload: &Workload) -> Result<SizingDecision> {
        let percentile_value = workload
            .percentile(self.params.percentile)
            .ok_or(PodshareError::EmptySeries)?;

        let request = scale(percentile_value, self.params.request_factor);
        let limit = self.params.limit_factor.map(|factor| scale(request, factor));

        Ok(SizingDecision {
            workload: workload.id(),
            percentile_value,
            request,
            limit,
        })
    }

    /// Size every workload. Nothing is written unless all of them can be sized.
    pub fn size(&self, workloads: &mut [Workload], observer: &dyn SimulationObserver) -> Result<()> {
        let decisions = workloads
            .iter()
            .map(|w| self.decide(w))
            .collect::<Result<Vec<_>>>()?;

        for (workload, decision) in workloads.iter_mut().zip(&decisions) {
            workload.apply_sizing(decision.request, decision.limit);
            observer.on_sized(decision);
        }

        Ok(())
    }
}

/// Multiply and round half away from zero; saturates at `u32::MAX`
fn scale(value: u32, factor: f64) -> u32 {
    (value as f64 * factor).round() as u32
}
