//! Power-loss detection
//!
//! A single light at factory defaults could be intentional; several at
//! once means the bulbs lost power and came back in their default state.

use crate::config::{Config, DefaultProfile};
use crate::models::Observation;

/// Decides whether a cycle needs to restore lights
pub struct Detector<'a> {
    profile: &'a DefaultProfile,
    threshold: usize,
}

impl<'a> Detector<'a> {
    /// Create a detector for the given profile and threshold
    pub fn new(profile: &'a DefaultProfile, threshold: usize) -> Self {
        Detector { profile, threshold }
    }

    /// Create a detector from the configured profile and threshold
    pub fn from_config(config: &'a Config) -> Self {
        Self::new(&config.profile, config.threshold)
    }

    /// True if the light shows the factory default signature
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use hue_restore::config::DefaultProfile;
    /// use hue_restore::detector::Detector;
    /// use hue_restore::models::Observation;
    ///
    /// let light = Observation::normalize("1", &json!({
    ///     "uniqueid": "a-0b",
    ///     "type": "Extended color light",
    ///     "state": {"on": true, "reachable": true, "colormode": "ct", "ct": 369, "bri": 254},
    /// }))
    /// .unwrap();
    ///
    /// let profile = DefaultProfile::default();
    /// assert!(Detector::new(&profile, 1).is_default(&light));
    /// ```
    ///
    pub fn is_default(&self, light: &Observation) -> bool {
        let state = &light.state;
        light.identity.light_type == self.profile.light_type
            && state.colormode.as_ref() == Some(&self.profile.colormode)
            && state.ct == Some(self.profile.ct)
            && state.bri == Some(self.profile.bri)
            && state.on
            && state.reachable
    }

    /// Number of lights showing the default signature
    pub fn count(&self, lights: &[Observation]) -> usize {
        lights.iter().filter(|light| self.is_default(light)).count()
    }

    /// True when at least `threshold` lights show the default signature
    pub fn restoration_required(&self, lights: &[Observation]) -> bool {
        self.count(lights) >= self.threshold
    }

    /// Accessor for the configured threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
