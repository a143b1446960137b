//! Directional wave spectrum analysis.
//!
//! Separates multi-swell sea states by partitioning the 2-D energy field
//! (frequency × direction) around local maxima. For each peak the
//! significant height of the partition is recovered from the energy
//! integral (`Hs = 4·√E`) and a confidence is assigned from the peak's
//! fractional share of total energy.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("Failed to read spectrum file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed spectrum: {0}")]
    Malformed(String),
}

/// A directional spectrum: energy density over frequency × direction bins.
#[derive(Debug, Clone)]
pub struct DirectionalSpectrum {
    /// Frequency bin centers (Hz), ascending
    pub frequencies: Vec<f64>,
    /// Direction bin centers (degrees), ascending
    pub directions: Vec<f64>,
    /// Energy density, `energy[freq_idx][dir_idx]` (m²/Hz/deg)
    pub energy: Vec<Vec<f64>>,
}

impl DirectionalSpectrum {
    /// Parse an NDBC-style directional spectrum text file.
    ///
    /// Layout: an optional `#` comment header, one line of direction bin
    /// centers, then one row per frequency: the frequency followed by the
    /// energy density per direction bin.
    pub fn parse_file(path: &Path) -> Result<Self, SpectrumError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_str(&contents)
    }

    pub fn parse_str(contents: &str) -> Result<Self, SpectrumError> {
        let mut lines = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let directions: Vec<f64> = lines
            .next()
            .ok_or_else(|| SpectrumError::Malformed("empty file".into()))?
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| SpectrumError::Malformed(format!("bad direction bin '{t}'")))
            })
            .collect::<Result<_, _>>()?;
        if directions.is_empty() {
            return Err(SpectrumError::Malformed("no direction bins".into()));
        }

        let mut frequencies = Vec::new();
        let mut energy = Vec::new();
        for line in lines {
            let mut tokens = line.split_whitespace();
            let freq: f64 = tokens
                .next()
                .ok_or_else(|| SpectrumError::Malformed("empty frequency row".into()))?
                .parse()
                .map_err(|_| SpectrumError::Malformed(format!("bad frequency row '{line}'")))?;
            let row: Vec<f64> = tokens
                .map(|t| {
                    t.parse::<f64>()
                        .map_err(|_| SpectrumError::Malformed(format!("bad energy value '{t}'")))
                })
                .collect::<Result<_, _>>()?;
            if row.len() != directions.len() {
                return Err(SpectrumError::Malformed(format!(
                    "row for {freq} Hz has {} bins, expected {}",
                    row.len(),
                    directions.len()
                )));
            }
            frequencies.push(freq);
            energy.push(row);
        }

        if frequencies.is_empty() {
            return Err(SpectrumError::Malformed("no frequency rows".into()));
        }
        Ok(Self {
            frequencies,
            directions,
            energy,
        })
    }

    fn total_energy(&self) -> f64 {
        self.energy.iter().flatten().sum()
    }
}

/// One detected swell partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Significant height of the partition (meters)
    pub height_meters: f64,
    /// Period at the peak frequency (seconds)
    pub period_seconds: f64,
    /// Direction at the peak bin (degrees)
    pub direction_degrees: f64,
    /// Fractional share of total spectral energy, 0-1
    pub confidence: f64,
    /// Raw peak energy density
    pub energy_density: f64,
}

/// Result of analyzing one spectrum.
#[derive(Debug, Clone, Default)]
pub struct SpectralAnalysis {
    /// Peaks ordered by height descending
    pub peaks: Vec<SpectralPeak>,
}

/// Spectral analyzer with a configurable integration neighbourhood.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    /// Half-width (in bins) of the energy integration window around a peak.
    neighborhood_bins: usize,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self {
            neighborhood_bins: 2,
        }
    }
}

impl SpectralAnalyzer {
    pub fn new(neighborhood_bins: usize) -> Self {
        Self { neighborhood_bins }
    }

    /// Parse and analyze a spectrum file.
    pub fn analyze_file(&self, path: &Path) -> Result<SpectralAnalysis, SpectrumError> {
        let spectrum = DirectionalSpectrum::parse_file(path)?;
        Ok(self.analyze(&spectrum))
    }

    /// Detect swell partitions in a directional spectrum.
    pub fn analyze(&self, spectrum: &DirectionalSpectrum) -> SpectralAnalysis {
        let total = spectrum.total_energy();
        if total <= 0.0 {
            return SpectralAnalysis::default();
        }

        let nf = spectrum.frequencies.len();
        let nd = spectrum.directions.len();
        let mut peaks = Vec::new();

        for fi in 0..nf {
            for di in 0..nd {
                let e = spectrum.energy[fi][di];
                if e <= 0.0 || !self.is_local_maximum(spectrum, fi, di) {
                    continue;
                }

                // Integrate energy over the ±N-bin neighbourhood to recover
                // the partition's significant height: Hs = 4·√E.
                let mut partition_energy = 0.0;
                let f_lo = fi.saturating_sub(self.neighborhood_bins);
                let f_hi = (fi + self.neighborhood_bins).min(nf - 1);
                for f in f_lo..=f_hi {
                    for offset in -(self.neighborhood_bins as isize)..=(self.neighborhood_bins as isize) {
                        // Direction bins wrap around the compass
                        let d = (di as isize + offset).rem_euclid(nd as isize) as usize;
                        let df = if nf > 1 {
                            let lo = if f == 0 { 0 } else { f - 1 };
                            let hi = (f + 1).min(nf - 1);
                            (spectrum.frequencies[hi] - spectrum.frequencies[lo]) / (hi - lo) as f64
                        } else {
                            1.0
                        };
                        partition_energy += spectrum.energy[f][d] * df;
                    }
                }

                let height = 4.0 * partition_energy.max(0.0).sqrt();
                let frequency = spectrum.frequencies[fi];
                if frequency <= 0.0 {
                    continue;
                }

                peaks.push(SpectralPeak {
                    height_meters: height,
                    period_seconds: 1.0 / frequency,
                    direction_degrees: spectrum.directions[di],
                    confidence: (e / total).min(1.0),
                    energy_density: e,
                });
            }
        }

        peaks.sort_by(|a, b| {
            b.height_meters
                .partial_cmp(&a.height_meters)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Collapse near-duplicate partitions: a lower peak within the
        // integration neighbourhood of a taller one is the same swell.
        let mut distinct: Vec<SpectralPeak> = Vec::new();
        for peak in peaks {
            let duplicate = distinct.iter().any(|kept| {
                let dir_diff = {
                    let d = (kept.direction_degrees - peak.direction_degrees).abs();
                    if d > 180.0 {
                        360.0 - d
                    } else {
                        d
                    }
                };
                let period_ratio = (kept.period_seconds / peak.period_seconds).max(peak.period_seconds / kept.period_seconds);
                dir_diff <= 30.0 && period_ratio <= 1.25
            });
            if !duplicate {
                distinct.push(peak);
            }
        }

        debug!(peaks = distinct.len(), "Spectral partitioning complete");
        SpectralAnalysis { peaks: distinct }
    }

    fn is_local_maximum(&self, spectrum: &DirectionalSpectrum, fi: usize, di: usize) -> bool {
        let nf = spectrum.frequencies.len();
        let nd = spectrum.directions.len();
        let center = spectrum.energy[fi][di];

        for df in -1isize..=1 {
            for dd in -1isize..=1 {
                if df == 0 && dd == 0 {
                    continue;
                }
                let f = fi as isize + df;
                if f < 0 || f >= nf as isize {
                    continue;
                }
                let d = (di as isize + dd).rem_euclid(nd as isize) as usize;
                if spectrum.energy[f as usize][d] > center {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A spectrum with a long-period NW peak and a short-period E peak.
    fn two_swell_spectrum() -> DirectionalSpectrum {
        let directions: Vec<f64> = (0..36).map(|i| i as f64 * 10.0).collect();
        let frequencies: Vec<f64> = (1..=25).map(|i| 0.02 * i as f64).collect();
        let mut energy = vec![vec![0.0; directions.len()]; frequencies.len()];

        // NW groundswell: 0.066 Hz (~15 s) at 310°
        let (f1, d1) = (2usize, 31usize);
        energy[f1][d1] = 8.0;
        energy[f1][d1 - 1] = 4.0;
        energy[f1 + 1][d1] = 4.0;

        // E windswell: 0.2 Hz (5 s) at 90°
        let (f2, d2) = (9usize, 9usize);
        energy[f2][d2] = 3.0;
        energy[f2][d2 + 1] = 1.5;

        DirectionalSpectrum {
            frequencies,
            directions,
            energy,
        }
    }

    #[test]
    fn detects_two_partitions_ordered_by_height() {
        let analysis = SpectralAnalyzer::default().analyze(&two_swell_spectrum());
        assert!(analysis.peaks.len() >= 2, "expected 2 peaks, got {}", analysis.peaks.len());

        let primary = &analysis.peaks[0];
        let secondary = &analysis.peaks[1];
        assert!(primary.height_meters >= secondary.height_meters);
        assert!((primary.direction_degrees - 310.0).abs() < 15.0);
        assert!(primary.period_seconds > 12.0, "primary should be groundswell");
        assert!(secondary.period_seconds < 8.0, "secondary should be windswell");
        assert!(primary.confidence > secondary.confidence);
    }

    #[test]
    fn empty_spectrum_yields_no_peaks() {
        let spectrum = DirectionalSpectrum {
            frequencies: vec![0.05, 0.1],
            directions: vec![0.0, 90.0, 180.0, 270.0],
            energy: vec![vec![0.0; 4]; 2],
        };
        assert!(SpectralAnalyzer::default().analyze(&spectrum).peaks.is_empty());
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let text = "0 90 180 270\n0.05 1.0 2.0 1.0\n";
        let err = DirectionalSpectrum::parse_str(text).unwrap_err();
        assert!(matches!(err, SpectrumError::Malformed(_)));
    }

    #[test]
    fn parse_round_trip() {
        let text = "# station 51201\n0 90 180 270\n0.05 0.0 1.0 2.0 1.0\n0.10 0.5 0.0 0.0 0.0\n";
        let spectrum = DirectionalSpectrum::parse_str(text).unwrap();
        assert_eq!(spectrum.frequencies, vec![0.05, 0.10]);
        assert_eq!(spectrum.directions.len(), 4);
        assert_eq!(spectrum.energy[0][2], 2.0);
    }
}
