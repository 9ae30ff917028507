//! Volume profile: last volume against its rolling average

use super::{require, IndicatorError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    /// Ratio above 2.0
    Surge,
    /// Ratio below 0.5
    Dry,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfile {
    /// Last volume / rolling average volume
    pub ratio: f64,
    pub trend: VolumeTrend,
}

pub fn volume_profile(volumes: &[f64], period: usize) -> Result<VolumeProfile, IndicatorError> {
    require(volumes.len(), period)?;

    let current = *volumes.last().expect("non-empty input");
    let window = &volumes[volumes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let ratio = if mean > 0.0 { current / mean } else { 1.0 };

    let trend = if ratio > 2.0 {
        VolumeTrend::Surge
    } else if ratio < 0.5 {
        VolumeTrend::Dry
    } else {
        VolumeTrend::Normal
    };

    Ok(VolumeProfile { ratio, trend })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surge_and_dry() {
        let mut vols = vec![100.0; 19];
        vols.push(500.0);
        assert_eq!(volume_profile(&vols, 20).unwrap().trend, VolumeTrend::Surge);

        let mut vols = vec![100.0; 19];
        vols.push(10.0);
        assert_eq!(volume_profile(&vols, 20).unwrap().trend, VolumeTrend::Dry);

        let vols = vec![100.0; 20];
        assert_eq!(
            volume_profile(&vols, 20).unwrap().trend,
            VolumeTrend::Normal
        );
    }

    #[test]
    fn test_warmup_fails() {
        assert!(volume_profile(&[1.0; 5], 20).is_err());
    }
}
