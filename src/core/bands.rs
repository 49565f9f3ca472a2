//! Band catalog classification
//!
//! Engines name their output bands freely (`Beta0_VV`, `coh_IW2_VV_20JUL2024_01AUG2024`, ...).
//! Semantic roles are recovered with case-insensitive substring tests on the
//! name only; no structured band metadata is consulted.

use crate::types::{PipelineError, PipelineResult, Polarization};

/// Radiometric quantity a band carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnitudeClass {
    Beta0,
    Intensity,
}

/// A band name with its derived semantic tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandCatalogEntry {
    pub name: String,
    /// VV or VH, VV winning when a name mentions both
    pub polarization: Option<Polarization>,
    pub magnitude: Option<MagnitudeClass>,
    pub coherence: bool,
}

impl BandCatalogEntry {
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();

        let polarization = if lower.contains("vv") {
            Some(Polarization::VV)
        } else if lower.contains("vh") {
            Some(Polarization::VH)
        } else {
            None
        };

        let magnitude = if lower.contains("beta0") {
            Some(MagnitudeClass::Beta0)
        } else if lower.contains("intensity") {
            Some(MagnitudeClass::Intensity)
        } else {
            None
        };

        Self {
            name: name.to_string(),
            polarization,
            magnitude,
            coherence: lower.contains("coh"),
        }
    }

    pub fn is_intensity_band(&self, pol: Polarization) -> bool {
        self.polarization == Some(pol) && self.magnitude.is_some()
    }
}

/// Selected VV and VH intensity bands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityBands {
    pub vv: String,
    pub vh: String,
}

/// Selected coherence band, plus any further candidates that were passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoherenceBand {
    pub name: String,
    pub ignored: Vec<String>,
}

/// Maps a band catalog to the semantic roles a pipeline needs
pub trait BandResolver {
    fn resolve_intensity(&self, catalog: &[String]) -> PipelineResult<IntensityBands>;

    fn resolve_coherence(&self, catalog: &[String]) -> PipelineResult<CoherenceBand>;
}

/// Substring heuristic, first match in catalog order
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBandResolver;

impl HeuristicBandResolver {
    fn first_intensity(entries: &[BandCatalogEntry], pol: Polarization) -> Option<String> {
        entries
            .iter()
            .find(|entry| entry.is_intensity_band(pol))
            .map(|entry| entry.name.clone())
    }
}

impl BandResolver for HeuristicBandResolver {
    fn resolve_intensity(&self, catalog: &[String]) -> PipelineResult<IntensityBands> {
        let entries: Vec<BandCatalogEntry> =
            catalog.iter().map(|name| BandCatalogEntry::classify(name)).collect();

        let vv = Self::first_intensity(&entries, Polarization::VV);
        let vh = Self::first_intensity(&entries, Polarization::VH);

        match (vv, vh) {
            (Some(vv), Some(vh)) => Ok(IntensityBands { vv, vh }),
            (vv, vh) => {
                let missing: Vec<&str> = [("VV", vv.is_none()), ("VH", vh.is_none())]
                    .iter()
                    .filter(|(_, absent)| *absent)
                    .map(|(pol, _)| *pol)
                    .collect();
                Err(PipelineError::BandResolution(format!(
                    "Could not find {} intensity band(s). Available bands: {:?}",
                    missing.join(" and "),
                    catalog
                )))
            }
        }
    }

    fn resolve_coherence(&self, catalog: &[String]) -> PipelineResult<CoherenceBand> {
        let mut candidates = catalog
            .iter()
            .filter(|name| BandCatalogEntry::classify(name).coherence)
            .cloned();

        let name = candidates.next().ok_or_else(|| {
            PipelineError::BandResolution(format!(
                "No coherence band found. Available bands: {:?}",
                catalog
            ))
        })?;

        Ok(CoherenceBand {
            name,
            ignored: candidates.collect(),
        })
    }
}
