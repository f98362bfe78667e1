//! Canonical light records
//!
//! Everything the bridge reports passes through [Observation::normalize]
//! once, after which the rest of the crate only deals in strongly typed
//! [LightIdentity], [LightMetadata] and [LightState] values.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DeserializeFromStr, SerializeDisplay};

use crate::{Error, Result};

/// Which set of color fields is authoritative for a light
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use hue_restore::models::ColorMode;
///
/// assert_eq!(ColorMode::from_str("ct").unwrap(), ColorMode::Ct);
/// assert_eq!(ColorMode::from_str("xy").unwrap(), ColorMode::Xy);
/// assert_eq!(ColorMode::from_str("hs").unwrap(), ColorMode::Hs);
/// assert_eq!(
///     ColorMode::from_str("effect").unwrap(),
///     ColorMode::Other("effect".to_string())
/// );
/// assert_eq!(ColorMode::Ct.to_string(), "ct");
/// ```
///
#[derive(Debug, Clone, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum ColorMode {
    /// Color temperature (mired)
    Ct,

    /// CIE xy chromaticity
    Xy,

    /// Hue and saturation
    Hs,

    /// Anything else the bridge reports, kept verbatim
    Other(String),
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Ct => f.write_str("ct"),
            ColorMode::Xy => f.write_str("xy"),
            ColorMode::Hs => f.write_str("hs"),
            ColorMode::Other(mode) => f.write_str(mode),
        }
    }
}

impl FromStr for ColorMode {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Infallible> {
        Ok(ColorMode::from(s))
    }
}

impl From<&str> for ColorMode {
    fn from(mode: &str) -> Self {
        match mode {
            "ct" => ColorMode::Ct,
            "xy" => ColorMode::Xy,
            "hs" => ColorMode::Hs,
            other => ColorMode::Other(other.to_string()),
        }
    }
}

/// CIE xy chromaticity pair, serialized as `[x, y]` like the bridge does
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xy(pub f64, pub f64);

impl Xy {
    /// Accessor for the x component
    pub fn x(&self) -> f64 {
        self.0
    }

    /// Accessor for the y component
    pub fn y(&self) -> f64 {
        self.1
    }
}

impl fmt::Display for Xy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

/// Immutable identity of a physical light
///
/// Keyed by the unique id; the bridge index is not stable and lives
/// in [LightMetadata] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightIdentity {
    /// Globally unique device id (`uniqueid`)
    pub unique_id: String,

    /// Hardware model (`modelid`)
    pub model_id: String,

    /// Capability profile (`type`), e.g. `Extended color light`
    pub light_type: String,
}

/// Versioned descriptive attributes of a light
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightMetadata {
    /// Index assigned by the bridge, may change across bridge reboots
    pub index: String,

    /// Human readable name
    pub name: String,

    /// Firmware version string (`swversion`)
    pub sw_version: String,
}

impl LightMetadata {
    /// Compare the attributes worth a new history record
    ///
    /// The index is deliberately not part of the comparison.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_restore::models::LightMetadata;
    ///
    /// let a = LightMetadata {
    ///     index: "1".to_string(),
    ///     name: "Desk".to_string(),
    ///     sw_version: "1.50.2".to_string(),
    /// };
    /// let mut b = a.clone();
    /// b.index = "7".to_string();
    /// assert!(a.same_details(&b));
    ///
    /// b.name = "Hall".to_string();
    /// assert!(!a.same_details(&b));
    /// ```
    ///
    pub fn same_details(&self, other: &Self) -> bool {
        self.name == other.name && self.sw_version == other.sw_version
    }
}

/// Versioned operational state of a light
///
/// Color fields other than the ones matching `colormode` are stale.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    pub reachable: bool,
    pub on: bool,
    pub colormode: Option<ColorMode>,
    /// Color temperature in mired
    pub ct: Option<u16>,
    pub xy: Option<Xy>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    /// Brightness (1-254)
    pub bri: Option<u8>,
    pub effect: Option<String>,
    pub alert: Option<String>,
}

/// One light as observed on the bridge during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub identity: LightIdentity,
    pub metadata: LightMetadata,
    pub state: LightState,
}

impl Observation {
    /// Convert a raw bridge light into its canonical record
    ///
    /// Missing or null fields fall back to their defaults (`false` for
    /// flags, unset for values), fields of the wrong type are treated as
    /// missing, and unknown fields are ignored. Only a missing `uniqueid`
    /// is an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use hue_restore::models::{ColorMode, Observation};
    ///
    /// let raw = json!({
    ///     "uniqueid": "00:17:88:01:00:bd:c7:b9-0b",
    ///     "type": "Extended color light",
    ///     "name": "Desk",
    ///     "state": {"on": true, "colormode": "ct", "ct": 369, "bri": 254, "reachable": null},
    /// });
    ///
    /// let light = Observation::normalize("3", &raw).unwrap();
    /// assert_eq!(light.index(), "3");
    /// assert_eq!(light.state.colormode, Some(ColorMode::Ct));
    /// assert!(light.state.on);
    /// assert!(!light.state.reachable);
    /// assert_eq!(light.metadata.sw_version, "");
    ///
    /// assert!(Observation::normalize("4", &json!({"name": "Lost"})).is_err());
    /// ```
    ///
    pub fn normalize(index: &str, raw: &Value) -> Result<Self> {
        let raw = RawLight::deserialize(raw).map_err(Error::JsonLoad)?;

        let unique_id = match raw.uniqueid {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::MissingUniqueId(index.to_string())),
        };

        let state = raw.state.unwrap_or_default();

        Ok(Observation {
            identity: LightIdentity {
                unique_id,
                model_id: raw.modelid.unwrap_or_default(),
                light_type: raw.light_type.unwrap_or_default(),
            },
            metadata: LightMetadata {
                index: index.to_string(),
                name: raw.name.unwrap_or_default(),
                sw_version: raw.swversion.unwrap_or_default(),
            },
            state: LightState {
                reachable: state.reachable.unwrap_or(false),
                on: state.on.unwrap_or(false),
                colormode: state.colormode.as_deref().map(ColorMode::from),
                ct: state.ct,
                xy: state.xy.map(|[x, y]| Xy(x, y)),
                hue: state.hue,
                sat: state.sat,
                bri: state.bri,
                effect: state.effect,
                alert: state.alert,
            },
        })
    }

    /// Accessor for the bridge index this light was enumerated under
    pub fn index(&self) -> &str {
        &self.metadata.index
    }

    /// Accessor for the light's unique id
    pub fn unique_id(&self) -> &str {
        &self.identity.unique_id
    }
}

/// Order bridge indexes numerically, anything non-numeric last
///
/// # Examples
///
/// ```
/// use hue_restore::models::index_order;
///
/// let mut indexes = vec!["10", "x", "2", "1"];
/// indexes.sort_by(|a, b| index_order(a, b));
/// assert_eq!(indexes, vec!["1", "2", "10", "x"]);
/// ```
///
pub fn index_order(a: &str, b: &str) -> Ordering {
    let key = |index: &str| index.parse::<u32>().unwrap_or(u32::MAX);
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Light as reported by the bridge, before normalization
#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawLight {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    uniqueid: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, rename = "type")]
    light_type: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    modelid: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    name: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    swversion: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    state: Option<RawState>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    on: Option<bool>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    reachable: Option<bool>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    colormode: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    ct: Option<u16>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    xy: Option<[f64; 2]>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    hue: Option<u16>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    sat: Option<u8>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    bri: Option<u8>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    effect: Option<String>,

    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    alert: Option<String>,
}

/// Partial state change for a single light, sent as the body of a
/// `PUT /lights/<index>/state`
///
/// Only the fields that were set are serialized.
///
/// # Examples
///
/// ```
/// use hue_restore::models::StateCommand;
///
/// let mut command = StateCommand::new();
/// assert!(command.is_empty());
///
/// command.ct(300);
/// command.brightness(200);
/// assert_eq!(
///     serde_json::to_string(&command).unwrap(),
///     r#"{"bri":200,"ct":300}"#
/// );
/// ```
///
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCommand {
    on: Option<bool>,
    bri: Option<u8>,
    ct: Option<u16>,
    xy: Option<Xy>,
    hue: Option<u16>,
    sat: Option<u8>,
    effect: Option<String>,
    alert: Option<String>,
}

impl StateCommand {
    /// Create a new empty command
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.on.is_none()
            && self.bri.is_none()
            && self.ct.is_none()
            && self.xy.is_none()
            && self.hue.is_none()
            && self.sat.is_none()
            && self.effect.is_none()
            && self.alert.is_none()
    }

    /// Turn the light on or off
    pub fn power(&mut self, on: bool) {
        self.on = Some(on);
    }

    /// Set the brightness
    pub fn brightness(&mut self, bri: u8) {
        self.bri = Some(bri);
    }

    /// Set the color temperature, in mired
    pub fn ct(&mut self, ct: u16) {
        self.ct = Some(ct);
    }

    /// Set both xy components
    pub fn xy(&mut self, xy: Xy) {
        self.xy = Some(xy);
    }

    /// Set the hue
    pub fn hue(&mut self, hue: u16) {
        self.hue = Some(hue);
    }

    /// Set the saturation
    pub fn saturation(&mut self, sat: u8) {
        self.sat = Some(sat);
    }

    /// Set the effect
    pub fn effect(&mut self, effect: &str) {
        self.effect = Some(effect.to_string());
    }

    /// Set the alert
    pub fn alert(&mut self, alert: &str) {
        self.alert = Some(alert.to_string());
    }

    /// Human readable `field before -> after` list for the journal
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_restore::models::{LightState, StateCommand};
    ///
    /// let before = LightState { on: true, ct: Some(369), bri: Some(254), ..Default::default() };
    /// let mut command = StateCommand::new();
    /// command.ct(300);
    /// command.brightness(200);
    /// assert_eq!(command.describe(&before), "bri 254 -> 200, ct 369 -> 300");
    /// ```
    ///
    pub fn describe(&self, before: &LightState) -> String {
        let mut changes = Vec::new();
        if let Some(on) = self.on {
            changes.push(format!("on {} -> {}", before.on, on));
        }
        if let Some(bri) = self.bri {
            changes.push(format!("bri {} -> {}", show(&before.bri), bri));
        }
        if let Some(ct) = self.ct {
            changes.push(format!("ct {} -> {}", show(&before.ct), ct));
        }
        if let Some(xy) = self.xy {
            changes.push(format!("xy {} -> {}", show(&before.xy), xy));
        }
        if let Some(hue) = self.hue {
            changes.push(format!("hue {} -> {}", show(&before.hue), hue));
        }
        if let Some(sat) = self.sat {
            changes.push(format!("sat {} -> {}", show(&before.sat), sat));
        }
        if let Some(effect) = &self.effect {
            changes.push(format!("effect {} -> {}", show(&before.effect), effect));
        }
        if let Some(alert) = &self.alert {
            changes.push(format!("alert {} -> {}", show(&before.alert), alert));
        }
        changes.join(", ")
    }
}

fn show<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "unset".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalize_full_light() {
        let raw = json!({
            "state": {
                "on": true,
                "bri": 144,
                "hue": 7676,
                "sat": 199,
                "effect": "none",
                "xy": [0.5016, 0.4151],
                "ct": 443,
                "alert": "select",
                "colormode": "xy",
                "mode": "homeautomation",
                "reachable": true
            },
            "swupdate": {"state": "noupdates"},
            "type": "Extended color light",
            "name": "Living room",
            "modelid": "LCT015",
            "manufacturername": "Signify Netherlands B.V.",
            "uniqueid": "00:17:88:01:03:a1:b2:c3-0b",
            "swversion": "1.50.2_r30933"
        });

        let light = Observation::normalize("5", &raw).unwrap();
        assert_eq!(light.unique_id(), "00:17:88:01:03:a1:b2:c3-0b");
        assert_eq!(light.identity.model_id, "LCT015");
        assert_eq!(light.identity.light_type, "Extended color light");
        assert_eq!(light.metadata.name, "Living room");
        assert_eq!(light.metadata.sw_version, "1.50.2_r30933");
        assert_eq!(
            light.state,
            LightState {
                reachable: true,
                on: true,
                colormode: Some(ColorMode::Xy),
                ct: Some(443),
                xy: Some(Xy(0.5016, 0.4151)),
                hue: Some(7676),
                sat: Some(199),
                bri: Some(144),
                effect: Some("none".to_string()),
                alert: Some("select".to_string()),
            }
        );
    }

    #[test]
    fn normalize_missing_state() {
        let raw = json!({"uniqueid": "aa-0b", "state": null});
        let light = Observation::normalize("1", &raw).unwrap();
        assert_eq!(light.state, LightState::default());
        assert_eq!(light.metadata.name, "");
    }

    #[test]
    fn normalize_wrong_types_are_missing() {
        let raw = json!({
            "uniqueid": "aa-0b",
            "state": {"on": "yes", "bri": "bright", "ct": 300, "xy": [0.1]}
        });
        let light = Observation::normalize("1", &raw).unwrap();
        assert!(!light.state.on);
        assert_eq!(light.state.bri, None);
        assert_eq!(light.state.ct, Some(300));
        assert_eq!(light.state.xy, None);
    }

    #[test]
    fn normalize_requires_unique_id() {
        let err = Observation::normalize("9", &json!({"uniqueid": ""})).unwrap_err();
        assert_eq!(err, Error::MissingUniqueId("9".to_string()));

        let err = Observation::normalize("9", &json!({"uniqueid": null})).unwrap_err();
        assert_eq!(err, Error::MissingUniqueId("9".to_string()));
    }

    #[test]
    fn normalize_leaves_raw_light_usable() {
        let raw = json!({"uniqueid": "00:17:88:01:00:00:00:05-0b", "name": "Desk"});
        let first = Observation::normalize("5", &raw).unwrap();
        let second = Observation::normalize("15", &raw).unwrap();
        assert_eq!(first.identity, second.identity);
        assert_eq!(second.index(), "15");
        assert_eq!(raw["name"], json!("Desk"));
    }

    #[test]
    fn index_order_is_numeric() {
        let mut indexes = vec!["2", "10", "1", "group", "01"];
        indexes.sort_by(|a, b| index_order(a, b));
        assert_eq!(indexes, vec!["01", "1", "2", "10", "group"]);
    }

    #[test]
    fn normalize_rejects_non_objects() {
        assert!(Observation::normalize("1", &json!([1, 2])).is_err());
    }

    #[test]
    fn unknown_color_mode_round_trips() {
        let state = LightState {
            colormode: Some(ColorMode::Other("effect".to_string())),
            ..Default::default()
        };
        let dumped = serde_json::to_value(&state).unwrap();
        assert_eq!(dumped["colormode"], json!("effect"));
        let loaded: LightState = serde_json::from_value(dumped).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn command_serializes_xy_pair() {
        let mut command = StateCommand::new();
        command.power(true);
        command.xy(Xy(0.3, 0.4));
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"on": true, "xy": [0.3, 0.4]})
        );
    }
}
