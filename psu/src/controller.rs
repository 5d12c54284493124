use thiserror::Error as ThisError;

use crate::command::FanSetting;

/// Temperature to fan speed mapping, temperatures in °C and speeds in
/// percent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FanCurve {
    min_temp: f64,
    max_temp: f64,
    min_speed: f64,
    max_speed: f64,
    passive_delta: f64,
    sanity_floor: f64,
}

impl Default for FanCurve {
    fn default() -> Self {
        Self {
            min_temp: 37.0,
            max_temp: 59.0,
            min_speed: 20.0,
            max_speed: 50.0,
            passive_delta: 3.0,
            sanity_floor: 20.0,
        }
    }
}

impl FanCurve {
    /// # Errors
    ///
    /// Returns a [`CurveError`] if a value is not finite, the temperature
    /// range is empty, the speeds are out of order or outside `[0, 100]`,
    /// or the hysteresis delta is negative.
    pub fn new(
        min_temp: f64,
        max_temp: f64,
        min_speed: f64,
        max_speed: f64,
        passive_delta: f64,
        sanity_floor: f64,
    ) -> Result<Self, CurveError> {
        let values = [
            min_temp,
            max_temp,
            min_speed,
            max_speed,
            passive_delta,
            sanity_floor,
        ];

        if !values.iter().all(|v| v.is_finite()) {
            return Err(CurveError::NotFinite);
        }

        if min_temp >= max_temp {
            return Err(CurveError::TemperatureRange { min_temp, max_temp });
        }

        if !(0.0..=100.0).contains(&min_speed)
            || !(0.0..=100.0).contains(&max_speed)
            || min_speed > max_speed
        {
            return Err(CurveError::SpeedRange {
                min_speed,
                max_speed,
            });
        }

        if passive_delta < 0.0 {
            return Err(CurveError::NegativeDelta(passive_delta));
        }

        Ok(Self {
            min_temp,
            max_temp,
            min_speed,
            max_speed,
            passive_delta,
            sanity_floor,
        })
    }

    #[inline]
    #[must_use]
    pub fn min_temp(&self) -> f64 {
        self.min_temp
    }

    #[inline]
    #[must_use]
    pub fn max_temp(&self) -> f64 {
        self.max_temp
    }

    #[inline]
    #[must_use]
    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }

    #[inline]
    #[must_use]
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    #[inline]
    #[must_use]
    pub fn passive_delta(&self) -> f64 {
        self.passive_delta
    }

    /// Readings below this are treated as bogus.
    #[inline]
    #[must_use]
    pub fn sanity_floor(&self) -> f64 {
        self.sanity_floor
    }

    /// Temperature at or below which an active fan stops.
    #[inline]
    #[must_use]
    pub fn passive_temp(&self) -> f64 {
        self.min_temp - self.passive_delta
    }

    /// Linear between the two speeds over the temperature range, clamped
    /// outside of it.
    #[must_use]
    pub fn speed_percent(&self, temp: f64) -> f64 {
        if temp <= self.min_temp {
            self.min_speed
        } else if temp >= self.max_temp {
            self.max_speed
        } else {
            (temp - self.min_temp) / (self.max_temp - self.min_temp)
                * (self.max_speed - self.min_speed)
                + self.min_speed
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, ThisError)]
pub enum CurveError {
    #[error("fan curve values must be finite")]
    NotFinite,
    #[error("minimum temperature {min_temp} must be below maximum temperature {max_temp}")]
    TemperatureRange { min_temp: f64, max_temp: f64 },
    #[error("fan speeds {min_speed}..{max_speed} must be ordered and within 0..100")]
    SpeedRange { min_speed: f64, max_speed: f64 },
    #[error("hysteresis delta {0} must not be negative")]
    NegativeDelta(f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FanState {
    /// Fan stopped, the device runs fanless.
    #[default]
    Passive,
    /// Fan driven along the curve.
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkipReason {
    /// No temperature could be read.
    Undefined,
    /// Temperature under the sanity floor.
    BelowFloor(f64),
}

/// Outcome of feeding one temperature reading to the [`FanController`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decision {
    /// Leave the device alone this time.
    Skip(SkipReason),
    Apply {
        setting: FanSetting,
        /// The state entered with this reading, if it changed.
        transition: Option<FanState>,
    },
}

/// Hysteretic controller turning temperatures into fan settings.
///
/// The fan starts once the temperature reaches the curve's minimum and only
/// stops again after it drops `passive_delta` below it.
#[derive(Clone, Copy, Debug, Default)]
pub struct FanController {
    curve: FanCurve,
    state: FanState,
}

impl FanController {
    #[must_use]
    pub fn new(curve: FanCurve) -> Self {
        Self {
            curve,
            state: FanState::Passive,
        }
    }

    #[inline]
    #[must_use]
    pub fn curve(&self) -> &FanCurve {
        &self.curve
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> FanState {
        self.state
    }

    pub fn update(&mut self, temperature: Option<f64>) -> Decision {
        let Some(temp) = temperature.filter(|t| !t.is_nan()) else {
            return Decision::Skip(SkipReason::Undefined);
        };

        if temp < self.curve.sanity_floor {
            return Decision::Skip(SkipReason::BelowFloor(temp));
        }

        let previous = self.state;

        self.state = match self.state {
            FanState::Passive if temp >= self.curve.min_temp => FanState::Active,
            FanState::Active if temp <= self.curve.passive_temp() => FanState::Passive,
            state => state,
        };

        let setting = match self.state {
            FanState::Active => FanSetting::Manual(self.curve.speed_percent(temp)),
            FanState::Passive => FanSetting::Passive,
        };

        Decision::Apply {
            setting,
            transition: (previous != self.state).then_some(self.state),
        }
    }
}
