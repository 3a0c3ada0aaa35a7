// Uptime - Fenêtre glissante de l'uptime moyen des validateurs
use crate::types::{mul_div, Balance, Timestamp, ValidatorId, UNIT};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Uptime d'une epoch normalisé dans [0, 1.0]
pub fn uptime_ratio(uptime: Timestamp, epoch_duration: Timestamp) -> Balance {
    if epoch_duration == 0 {
        return UNIT;
    }
    mul_div(uptime as u128, UNIT, epoch_duration as u128).min(UNIT)
}

/// Buffer circulaire des derniers ratios d'uptime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeWindow {
    samples: VecDeque<Balance>,
}

impl UptimeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un échantillon, en gardant au plus `window` valeurs
    pub fn push(&mut self, ratio: Balance, window: usize) {
        self.samples.push_back(ratio);
        while self.samples.len() > window.max(1) {
            self.samples.pop_front();
        }
    }

    /// Moyenne sur l'historique disponible (ou la fenêtre si pleine)
    pub fn average(&self) -> Balance {
        if self.samples.is_empty() {
            return 0;
        }
        let sum = self
            .samples
            .iter()
            .fold(0u128, |acc, s| acc.saturating_add(*s));
        sum / self.samples.len() as u128
    }

    pub fn is_full(&self, window: usize) -> bool {
        self.samples.len() >= window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Fenêtres d'uptime de tous les validateurs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UptimeTracker {
    windows: HashMap<ValidatorId, UptimeWindow>,
}

impl UptimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre l'uptime d'une epoch et retourne la nouvelle moyenne
    pub fn record(
        &mut self,
        validator: ValidatorId,
        uptime: Timestamp,
        epoch_duration: Timestamp,
        window: u64,
    ) -> Balance {
        let entry = self.windows.entry(validator).or_default();
        entry.push(uptime_ratio(uptime, epoch_duration), window as usize);
        entry.average()
    }

    pub fn average(&self, validator: ValidatorId) -> Balance {
        self.windows.get(&validator).map(|w| w.average()).unwrap_or(0)
    }

    pub fn window(&self, validator: ValidatorId) -> Option<&UptimeWindow> {
        self.windows.get(&validator)
    }
}
