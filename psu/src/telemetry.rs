use crate::command::Parameter;

/// Output rails of the power supply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(test, derive(strum::EnumIter))]
pub enum Rail {
    #[strum(to_string = "12V")]
    V12,
    #[strum(to_string = "5V")]
    V5,
    #[strum(to_string = "3.3V")]
    V3V3,
}

impl Rail {
    pub const ALL: [Rail; 3] = [Rail::V12, Rail::V5, Rail::V3V3];

    #[must_use]
    pub fn voltage(self) -> Parameter {
        match self {
            Rail::V12 => Parameter::Output12V,
            Rail::V5 => Parameter::Output5V,
            Rail::V3V3 => Parameter::Output3V3,
        }
    }

    #[must_use]
    pub fn current(self) -> Parameter {
        match self {
            Rail::V12 => Parameter::Current12V,
            Rail::V5 => Parameter::Current5V,
            Rail::V3V3 => Parameter::Current3V3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RailReading {
    pub rail: Rail,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

impl RailReading {
    /// Only defined when both voltage and current are.
    #[must_use]
    pub fn power(&self) -> Option<f64> {
        Some(self.voltage? * self.current?)
    }
}

/// One reading of every sensor. A `None` is a channel the device did not
/// answer for, never a zero reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Telemetry {
    pub input_voltage: Option<f64>,
    pub rails: [RailReading; 3],
    pub temperature: Option<f64>,
    pub fan_rpm: Option<f64>,
}

impl Telemetry {
    /// Reads every channel in address order through `read`, stopping at the
    /// first error.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `read`.
    pub fn collect<F, E>(mut read: F) -> Result<Self, E>
    where
        F: FnMut(Parameter) -> Result<Option<f64>, E>,
    {
        let input_voltage = read(Parameter::InputVoltage)?;

        let mut voltages = [None; 3];
        for (voltage, rail) in voltages.iter_mut().zip(Rail::ALL) {
            *voltage = read(rail.voltage())?;
        }

        let mut currents = [None; 3];
        for (current, rail) in currents.iter_mut().zip(Rail::ALL) {
            *current = read(rail.current())?;
        }

        let temperature = read(Parameter::Temperature)?;
        let fan_rpm = read(Parameter::FanRpm)?;

        let rails = core::array::from_fn(|i| RailReading {
            rail: Rail::ALL[i],
            voltage: voltages[i],
            current: currents[i],
        });

        Ok(Self {
            input_voltage,
            rails,
            temperature,
            fan_rpm,
        })
    }

    /// Sum of the rails whose power is known. Unknown rails are left out
    /// rather than making the whole sum unknown.
    #[must_use]
    pub fn total_power(&self) -> f64 {
        self.rails
            .iter()
            .filter_map(RailReading::power)
            .fold(0.0, |total, power| total + power)
    }
}
