//! Minimal restore commands
//!
//! Given what a light looks like now and what it looked like at its last
//! snapshot, work out the smallest [StateCommand] that brings it back.

use crate::models::{ColorMode, LightState, StateCommand};

/// Compute the changes needed to move `current` back to `target`
///
/// Power is only sent when it differs. Color and brightness are only
/// considered when the target is on, and only the color fields matching
/// the target's color mode are compared: xy as a pair, ct on its own,
/// and hue and saturation independently for any other mode. Target
/// fields that were never recorded are left alone.
///
/// # Examples
///
/// ```
/// use hue_restore::models::{ColorMode, LightState, StateCommand};
/// use hue_restore::planner::plan;
///
/// let target = LightState {
///     on: true,
///     colormode: Some(ColorMode::Ct),
///     ct: Some(300),
///     bri: Some(200),
///     ..Default::default()
/// };
/// let current = LightState {
///     ct: Some(369),
///     bri: Some(254),
///     ..target.clone()
/// };
///
/// let mut expected = StateCommand::new();
/// expected.ct(300);
/// expected.brightness(200);
/// assert_eq!(plan(&current, &target), expected);
/// assert!(plan(&target, &target).is_empty());
/// ```
///
pub fn plan(current: &LightState, target: &LightState) -> StateCommand {
    let mut command = StateCommand::new();

    if current.on != target.on {
        command.power(target.on);
    }

    if !target.on {
        return command;
    }

    match target.colormode {
        Some(ColorMode::Xy) => {
            if let Some(xy) = target.xy {
                let same = match current.xy {
                    Some(now) => now.x() == xy.x() && now.y() == xy.y(),
                    None => false,
                };
                if !same {
                    command.xy(xy);
                }
            }
        }
        Some(ColorMode::Ct) => {
            if let Some(ct) = target.ct {
                if current.ct != Some(ct) {
                    command.ct(ct);
                }
            }
        }
        _ => {
            if let Some(hue) = target.hue {
                if current.hue != Some(hue) {
                    command.hue(hue);
                }
            }
            if let Some(sat) = target.sat {
                if current.sat != Some(sat) {
                    command.saturation(sat);
                }
            }
        }
    }

    if let Some(bri) = target.bri {
        if current.bri != Some(bri) {
            command.brightness(bri);
        }
    }
    if let Some(effect) = &target.effect {
        if current.effect.as_ref() != Some(effect) {
            command.effect(effect);
        }
    }
    if let Some(alert) = &target.alert {
        if current.alert.as_ref() != Some(alert) {
            command.alert(alert);
        }
    }

    command
}
