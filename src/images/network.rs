//! Network condition classification.
//!
//! The host reports whatever it knows about the connection as a
//! [`ConnectionInfo`]; [`NetworkPolicy::classify`] turns that (or the absence
//! of any signal) into the preload/quality decisions the rest of the engine
//! consumes through [`NetworkConditions`].

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const FAST_DOWNLINK_MBPS: f64 = 5.0;
const SLOW_DOWNLINK_MBPS: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "slow-2g")]
    SlowTwoG,
    #[default]
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "4g" => EffectiveType::FourG,
            "3g" => EffectiveType::ThreeG,
            "2g" => EffectiveType::TwoG,
            "slow-2g" => EffectiveType::SlowTwoG,
            _ => EffectiveType::Unknown,
        }
    }

    fn is_slow(self) -> bool {
        matches!(self, EffectiveType::TwoG | EffectiveType::SlowTwoG)
    }
}

/// What the platform reports about the current connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(default)]
    pub effective_type: EffectiveType,
    #[serde(default)]
    pub downlink_mbps: Option<f64>,
    #[serde(default)]
    pub rtt_ms: Option<u32>,
    #[serde(default)]
    pub save_data: bool,
}

impl ConnectionInfo {
    /// Build from `STORYREEL_*` variables. `None` when none of them is set.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let effective_type = lookup("STORYREEL_EFFECTIVE_TYPE");
        let downlink = lookup("STORYREEL_DOWNLINK_MBPS");
        let rtt = lookup("STORYREEL_RTT_MS");
        let save_data = lookup("STORYREEL_SAVE_DATA");

        if effective_type.is_none() && downlink.is_none() && rtt.is_none() && save_data.is_none() {
            return None;
        }

        let downlink_mbps = downlink.and_then(|raw| match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
            _ => {
                log_warn!("Ignoring invalid STORYREEL_DOWNLINK_MBPS: {}", raw);
                None
            }
        });
        let rtt_ms = rtt.and_then(|raw| match raw.trim().parse::<u32>() {
            Ok(value) => Some(value),
            Err(_) => {
                log_warn!("Ignoring invalid STORYREEL_RTT_MS: {}", raw);
                None
            }
        });

        Some(Self {
            effective_type: effective_type
                .as_deref()
                .map(EffectiveType::parse)
                .unwrap_or_default(),
            downlink_mbps,
            rtt_ms,
            save_data: save_data
                .map(|raw| {
                    matches!(
                        raw.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "on" | "yes"
                    )
                })
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    Medium,
    High,
}

/// Read-only view of the network classification.
pub trait NetworkConditions {
    fn preload_distance(&self) -> usize;
    fn image_quality(&self) -> ImageQuality;
    fn should_use_progressive_loading(&self) -> bool;
    fn is_slow_connection(&self) -> bool;
    fn is_fast_connection(&self) -> bool;
}

/// One classification result; recomputed whenever the connection changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    pub preload_distance: usize,
    pub image_quality: ImageQuality,
    pub progressive_loading: bool,
    pub slow: bool,
    pub fast: bool,
}

impl NetworkPolicy {
    /// `None` means the platform gives no signal: assume a fast connection
    /// but keep a moderate preload window.
    pub fn classify(info: Option<&ConnectionInfo>) -> Self {
        let Some(info) = info else {
            return Self {
                preload_distance: 3,
                image_quality: ImageQuality::High,
                progressive_loading: true,
                slow: false,
                fast: true,
            };
        };

        Self {
            preload_distance: preload_distance(info),
            image_quality: image_quality(info),
            progressive_loading: info.effective_type != EffectiveType::FourG || info.save_data,
            slow: is_slow(info),
            fast: is_fast(info),
        }
    }
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::classify(None)
    }
}

impl NetworkConditions for NetworkPolicy {
    fn preload_distance(&self) -> usize {
        self.preload_distance
    }

    fn image_quality(&self) -> ImageQuality {
        self.image_quality
    }

    fn should_use_progressive_loading(&self) -> bool {
        self.progressive_loading
    }

    fn is_slow_connection(&self) -> bool {
        self.slow
    }

    fn is_fast_connection(&self) -> bool {
        self.fast
    }
}

fn preload_distance(info: &ConnectionInfo) -> usize {
    if info.save_data {
        return 1;
    }
    match info.effective_type {
        EffectiveType::FourG => 5,
        EffectiveType::ThreeG | EffectiveType::Unknown => 3,
        EffectiveType::TwoG | EffectiveType::SlowTwoG => 1,
    }
}

fn image_quality(info: &ConnectionInfo) -> ImageQuality {
    if info.save_data {
        return ImageQuality::Low;
    }
    if let Some(downlink) = info.downlink_mbps {
        return if downlink > FAST_DOWNLINK_MBPS {
            ImageQuality::High
        } else if downlink > SLOW_DOWNLINK_MBPS {
            ImageQuality::Medium
        } else {
            ImageQuality::Low
        };
    }
    match info.effective_type {
        EffectiveType::TwoG | EffectiveType::SlowTwoG => ImageQuality::Low,
        EffectiveType::ThreeG => ImageQuality::Medium,
        EffectiveType::FourG | EffectiveType::Unknown => ImageQuality::High,
    }
}

fn is_slow(info: &ConnectionInfo) -> bool {
    info.effective_type.is_slow()
        || info.save_data
        || info.downlink_mbps.is_some_and(|d| d < SLOW_DOWNLINK_MBPS)
}

fn is_fast(info: &ConnectionInfo) -> bool {
    info.effective_type == EffectiveType::FourG
        && !info.save_data
        && info.downlink_mbps.map_or(true, |d| d > FAST_DOWNLINK_MBPS)
}

/// Holds the latest connection report and broadcasts policy changes.
/// Without reports the policy stays whatever it was built with.
#[derive(Clone)]
pub struct NetworkAdapter {
    info: Arc<RwLock<Option<ConnectionInfo>>>,
    policy: Arc<watch::Sender<NetworkPolicy>>,
}

impl NetworkAdapter {
    pub fn new(initial: Option<ConnectionInfo>) -> Self {
        let policy = NetworkPolicy::classify(initial.as_ref());
        let (tx, _rx) = watch::channel(policy);
        log_info!(
            "Network policy: distance {}, quality {:?}, slow {}, fast {}",
            policy.preload_distance,
            policy.image_quality,
            policy.slow,
            policy.fast
        );
        Self {
            info: Arc::new(RwLock::new(initial)),
            policy: Arc::new(tx),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ConnectionInfo::from_env())
    }

    /// Platform change signal. Every report wakes subscribers, even when the
    /// derived policy is unchanged.
    pub fn report_change(&self, info: ConnectionInfo) {
        let policy = NetworkPolicy::classify(Some(&info));
        {
            let mut current = self.info.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = Some(info);
        }

        let previous = self.policy.send_replace(policy);
        if previous != policy {
            log_info!(
                "Network changed: distance {}, quality {:?}",
                policy.preload_distance,
                policy.image_quality
            );
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkPolicy> {
        self.policy.subscribe()
    }

    pub fn policy(&self) -> NetworkPolicy {
        *self.policy.borrow()
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.info
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NetworkConditions for NetworkAdapter {
    fn preload_distance(&self) -> usize {
        self.policy().preload_distance
    }

    fn image_quality(&self) -> ImageQuality {
        self.policy().image_quality
    }

    fn should_use_progressive_loading(&self) -> bool {
        self.policy().progressive_loading
    }

    fn is_slow_connection(&self) -> bool {
        self.policy().slow
    }

    fn is_fast_connection(&self) -> bool {
        self.policy().fast
    }
}
