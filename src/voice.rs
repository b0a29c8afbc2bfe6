/*!
 * Voice profile assignment for cues.
 *
 * Short lines are always voiced as `Child`. Longer lines get a weighted random
 * profile, nudged toward `Child` when the line asks or exclaims something. The
 * random source is owned by the classifier so callers can pin it with a seed.
 */

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app_config::VoiceConfig;

/// Speech style assigned to a cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProfile {
    Child,
    Female,
    Male,
}

impl VoiceProfile {
    pub const ALL: [VoiceProfile; 3] = [VoiceProfile::Child, VoiceProfile::Female, VoiceProfile::Male];

    /// Speech-rate multiplier for this profile under the given settings
    pub fn rate(self, config: &VoiceConfig) -> f32 {
        match self {
            VoiceProfile::Child => config.child_rate,
            VoiceProfile::Female => config.female_rate,
            VoiceProfile::Male => config.male_rate,
        }
    }
}

impl fmt::Display for VoiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceProfile::Child => "child",
            VoiceProfile::Female => "female",
            VoiceProfile::Male => "male",
        };
        f.write_str(name)
    }
}

/// Character range used to measure text length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Any alphabetic character
    #[default]
    Any,
    /// Arabic block, covers Persian and Urdu
    Arabic,
    /// Basic and extended Latin letters
    Latin,
    Cyrillic,
}

impl Script {
    pub fn contains(self, c: char) -> bool {
        match self {
            Script::Any => c.is_alphabetic(),
            Script::Arabic => matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{FB50}'..='\u{FDFF}' | '\u{FE70}'..='\u{FEFF}')
                && c.is_alphabetic(),
            Script::Latin => c.is_ascii_alphabetic() || (matches!(c, '\u{00C0}'..='\u{024F}') && c.is_alphabetic()),
            Script::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}') && c.is_alphabetic(),
        }
    }

    /// Number of characters of `text` in this script
    pub fn count(self, text: &str) -> usize {
        text.chars().filter(|c| self.contains(*c)).count()
    }
}

const QUESTION_MARKERS: [char; 3] = ['?', '!', '\u{061F}'];

/// Assigns a `VoiceProfile` to cue text
pub struct VoiceClassifier {
    config: VoiceConfig,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for VoiceClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceClassifier").field("config", &self.config).finish_non_exhaustive()
    }
}

impl VoiceClassifier {
    /// Classifier seeded from `config.seed`, or from the OS when unset
    pub fn new(config: VoiceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_seed(config: VoiceConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: VoiceConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Whether `text` is short enough to take the deterministic branch
    pub fn is_short(&self, text: &str) -> bool {
        self.config.script.count(text) < self.config.short_text_threshold
    }

    pub fn classify(&self, text: &str) -> VoiceProfile {
        if self.is_short(text) {
            return VoiceProfile::Child;
        }

        let mut rng = self.rng.lock();

        if text.contains(QUESTION_MARKERS) && rng.random::<f64>() < self.config.question_child_bias {
            return VoiceProfile::Child;
        }

        let weights = [
            (VoiceProfile::Female, self.config.female_weight.max(0.0)),
            (VoiceProfile::Male, self.config.male_weight.max(0.0)),
            (VoiceProfile::Child, self.config.child_weight.max(0.0)),
        ];
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return VoiceProfile::Female;
        }

        let mut draw = rng.random::<f64>() * total;
        for (profile, weight) in weights {
            if draw < weight {
                return profile;
            }
            draw -= weight;
        }
        VoiceProfile::Child
    }
}
