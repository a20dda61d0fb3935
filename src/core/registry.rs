// Display enumeration anchored to unified space

use crate::models::capture::{
    CaptureError, CaptureResult, DisplayDescriptor, DisplayId, DisplayInfo, Point, RawDisplay,
};

/// Ordered set of displays for one session.
///
/// Index 0 is always the primary display and its top-left corner is the
/// origin of unified space. The set is captured once; topology changes after
/// construction are not observed.
#[derive(Debug, Clone)]
pub struct DisplayRegistry {
    displays: Vec<DisplayDescriptor>,
    desktop_origin: Point,
}

impl DisplayRegistry {
    /// Build the registry from what a backend reported.
    ///
    /// The first display flagged primary moves to the front; the rest keep
    /// their enumeration order. When none is flagged, the first one is
    /// treated as primary.
    pub fn from_raw(raw: Vec<RawDisplay>) -> CaptureResult<Self> {
        if raw.is_empty() {
            return Err(CaptureError::NoDisplaysFound);
        }

        let primary_index = raw.iter().position(|d| d.is_primary).unwrap_or(0);
        let primary = raw[primary_index];
        let origin = primary.bounds.min();

        let mut displays = Vec::with_capacity(raw.len());
        displays.push(anchor(&primary, origin));
        displays.extend(
            raw.iter()
                .enumerate()
                .filter(|(i, _)| *i != primary_index)
                .map(|(_, d)| anchor(d, origin)),
        );

        tracing::debug!(count = displays.len(), ?origin, "display registry built");
        Ok(Self {
            displays,
            desktop_origin: origin,
        })
    }

    pub fn displays(&self) -> &[DisplayDescriptor] {
        &self.displays
    }

    pub fn primary(&self) -> &DisplayDescriptor {
        &self.displays[0]
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    /// Display at `index`, primary first.
    pub fn get(&self, index: usize) -> CaptureResult<&DisplayDescriptor> {
        self.displays
            .get(index)
            .ok_or(CaptureError::DisplayNotFound(index))
    }

    pub fn find(&self, id: DisplayId) -> CaptureResult<&DisplayDescriptor> {
        self.displays
            .iter()
            .find(|d| d.id == id)
            .ok_or(CaptureError::UnknownDisplay(id))
    }

    /// Where the primary display's top-left corner sits in the platform's
    /// global desktop coordinates.
    pub fn desktop_origin(&self) -> Point {
        self.desktop_origin
    }

    pub fn list(&self) -> Vec<DisplayInfo> {
        self.displays
            .iter()
            .enumerate()
            .map(|(index, d)| DisplayInfo {
                index,
                bounds: d.bounds,
            })
            .collect()
    }
}

fn anchor(raw: &RawDisplay, origin: Point) -> DisplayDescriptor {
    DisplayDescriptor {
        id: raw.id,
        bounds: raw.bounds.translate(-origin.x, -origin.y),
    }
}
