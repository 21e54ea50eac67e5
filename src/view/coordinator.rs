//! Region request deduplication.
//!
//! The coordinator decides, on every view change, whether the region already
//! served covers the new view or a fresh `region_read` must go out. Panning
//! inside an already-served superset is free; zooming to a finer mip, or
//! changing band or compression, always refetches.

use crate::codec::wire::{RegionReadAck, RegionReadRequest};

use super::state::{calculate_mip, Bounds};

/// The region most recently applied to the view, in full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentRegion {
    pub band: i32,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub mip: i32,
    pub compression: i32,
}

impl CurrentRegion {
    /// Build from a served acknowledgement.
    ///
    /// Ack extents count decimated samples; the covered image rectangle
    /// scales back up by the served mip.
    pub fn from_ack(ack: &RegionReadAck) -> Self {
        let mip = ack.mip.max(1) as i64;
        Self {
            band: ack.band,
            x: ack.x,
            y: ack.y,
            w: ack.w * mip,
            h: ack.h * mip,
            mip: ack.mip,
            compression: ack.compression,
        }
    }

    fn rect(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }
}

/// Decides when a new region fetch is required.
///
/// Superseded in-flight requests are not cancelled; whichever response is
/// applied last wins, so [`RegionRequestCoordinator::apply_response`] simply
/// overwrites the current region.
#[derive(Debug, Default)]
pub struct RegionRequestCoordinator {
    current: Option<CurrentRegion>,
}

impl RegionRequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the request for `bounds` at `zoom` and report whether it must
    /// be sent. Returns `None` for degenerate bounds, or when the current
    /// region already covers the request.
    pub fn evaluate(
        &self,
        bounds: &Bounds,
        zoom: f64,
        band: i32,
        compression: i32,
    ) -> Option<RegionReadRequest> {
        let mip = calculate_mip(zoom);
        let mip64 = mip as i64;

        // Snap extents down so tiles align with whole source pixels
        let w = bounds.w / mip64 * mip64;
        let h = bounds.h / mip64 * mip64;
        if w <= 0 || h <= 0 {
            return None;
        }

        let request = RegionReadRequest {
            band,
            x: bounds.x,
            y: bounds.y,
            w,
            h,
            mip,
            compression,
        };

        if self.requires_update(&request) {
            Some(request)
        } else {
            None
        }
    }

    fn requires_update(&self, request: &RegionReadRequest) -> bool {
        let current = match &self.current {
            None => return true,
            Some(c) => c,
        };

        if request.compression != current.compression
            || request.band != current.band
            || request.mip < current.mip
        {
            return true;
        }

        let requested = Bounds {
            x: request.x,
            y: request.y,
            w: request.w,
            h: request.h,
        };
        !current.rect().contains(&requested)
    }

    /// Record a served region. Last writer wins.
    pub fn apply_response(&mut self, region: CurrentRegion) {
        self.current = Some(region);
    }

    /// Forget the served region, e.g. when the file closes.
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&CurrentRegion> {
        self.current.as_ref()
    }
}
