/*
Copyright 2026 NWP Consumer Contributors

This file is part of the NWP Consumer.

The NWP Consumer is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

The NWP Consumer is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with the NWP Consumer. If not, see https://www.gnu.org/licenses/.
*/

//! Canonical enumeration of meteorological parameters (C1).
//!
//! Providers name the same physical quantity in wildly different ways
//! (`t2m`, `tas`, `2t`, `temperature_sl`, ...). Centralizing the mapping here
//! keeps decoders trivial: adding a provider becomes a data change to the
//! alternate-name lists below, not a code change in the engine.

use crate::errors::RegistryError;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Reasonable physical bounds for a parameter, used for sanity-checking
/// decoded values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterLimits {
    pub upper: f64,
    pub lower: f64,
    /// Maximum fraction of out-of-bounds values tolerated before the
    /// parameter is deemed invalid, in `[0, 1]`.
    pub outlier_threshold: f64,
}

/// One entry of the parameter registry.
///
/// `Parameter` values are cheap to copy and compare; the canonical name is
/// what gets persisted to disk (as the `variable` dimension's coordinate
/// labels and as the tensor store's variable axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter(pub(crate) &'static str);

impl Parameter {
    /// The canonical short name, as it appears in stored coordinate maps.
    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Look up this parameter's full metadata record.
    ///
    /// Panics if `self` was not obtained from this module, which can only
    /// happen by constructing a `Parameter` by hand outside the crate -
    /// the type is otherwise only ever handed out by `canonical`/`from_alternate`.
    pub fn data(&self) -> &'static ParameterData {
        DATA_BY_NAME
            .get(self.0)
            .unwrap_or_else(|| panic!("Parameter {:?} missing from registry table", self.0))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Parameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Parameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        canonical(&name).ok_or_else(|| D::Error::custom(format!("unknown parameter {name:?}")))
    }
}

/// Full metadata record for a parameter.
#[derive(Debug, Clone)]
pub struct ParameterData {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub limits: ParameterLimits,
    pub alternative_shortnames: &'static [&'static str],
}

macro_rules! param_table {
    ($(($const_name:ident, $name:expr, $desc:expr, $unit:expr, $upper:expr, $lower:expr, $threshold:expr, [$($alt:expr),* $(,)?])),* $(,)?) => {
        $(
            #[allow(non_upper_case_globals)]
            pub const $const_name: Parameter = Parameter($name);
        )*

        static PARAMETER_TABLE: &[ParameterData] = &[
            $(
                ParameterData {
                    name: $name,
                    description: $desc,
                    unit: $unit,
                    limits: ParameterLimits { upper: $upper, lower: $lower, outlier_threshold: $threshold },
                    alternative_shortnames: &[$($alt),*],
                },
            )*
        ];
    };
}

param_table! {
    (TEMPERATURE_SL, "temperature_sl", "Temperature at screen level", "C", 60.0, -90.0, 0.05,
        ["t", "t2m", "tas"]),
    (DOWNWARD_SHORTWAVE_RADIATION_FLUX_GL, "downward_shortwave_radiation_flux_gl",
        "Downward shortwave radiation flux at ground level", "W/m^2", 1500.0, 0.0, 0.05,
        ["swavr", "ssrd", "dswrf", "sdswrf"]),
    (DOWNWARD_LONGWAVE_RADIATION_FLUX_GL, "downward_longwave_radiation_flux_gl",
        "Downward longwave radiation flux at ground level", "W/m^2", 500.0, 0.0, 0.05,
        ["strd", "dlwrf", "sdlwrf"]),
    (RELATIVE_HUMIDITY_SL, "relative_humidity_sl", "Relative humidity at screen level", "%", 100.0, 0.0, 0.05,
        ["r", "r2"]),
    (VISIBILITY_SL, "visibility_sl", "Visibility at screen level", "m", 4500.0, 0.0, 0.05,
        ["vis"]),
    (WIND_U_COMPONENT_10M, "wind_u_component_10m", "U component of wind at 10m above ground level", "m/s", 100.0, -100.0, 0.05,
        ["u10", "u", "uas"]),
    (WIND_V_COMPONENT_10M, "wind_v_component_10m", "V component of wind at 10m above ground level", "m/s", 100.0, -100.0, 0.05,
        ["v10", "v", "vas"]),
    (WIND_U_COMPONENT_100M, "wind_u_component_100m", "U component of wind at 100m above ground level", "m/s", 100.0, -100.0, 0.05,
        ["u100"]),
    (WIND_V_COMPONENT_100M, "wind_v_component_100m", "V component of wind at 100m above ground level", "m/s", 100.0, -100.0, 0.05,
        ["v100"]),
    (WIND_U_COMPONENT_200M, "wind_u_component_200m", "U component of wind at 200m above ground level", "m/s", 150.0, -150.0, 0.05,
        ["u200"]),
    (WIND_V_COMPONENT_200M, "wind_v_component_200m", "V component of wind at 200m above ground level", "m/s", 150.0, -150.0, 0.05,
        ["v200"]),
    (WIND_SPEED_10M, "wind_speed_10m", "Wind speed at 10m above ground level", "m/s", 150.0, 0.0, 0.05,
        ["10si", "si10"]),
    (WIND_SPEED_100M, "wind_speed_100m", "Wind speed at 100m above ground level", "m/s", 200.0, 0.0, 0.05,
        ["100si", "si100"]),
    (WIND_DIRECTION_10M, "wind_direction_10m", "Wind direction at 10m above ground level, 0-360", "degrees", 360.0, 0.0, 0.05,
        ["wdir", "wdir10", "10wdir"]),
    (SNOW_DEPTH_GL, "snow_depth_gl", "Depth of snow on the ground", "m", 12.0, 0.0, 0.05,
        ["sd", "sdwe", "sde"]),
    (CLOUD_COVER_HIGH, "cloud_cover_high", "Fraction of grid square covered by high-level cloud", "UI", 1.0, 0.0, 0.05,
        ["hcc"]),
    (CLOUD_COVER_MEDIUM, "cloud_cover_medium", "Fraction of grid square covered by medium-level cloud", "UI", 1.0, 0.0, 0.05,
        ["mcc"]),
    (CLOUD_COVER_LOW, "cloud_cover_low", "Fraction of grid square covered by low-level cloud", "UI", 1.0, 0.0, 0.05,
        ["lcc"]),
    (CLOUD_COVER_TOTAL, "cloud_cover_total", "Fraction of grid square covered by any cloud", "UI", 1.0, 0.0, 0.05,
        ["tcc", "clt"]),
    (TOTAL_PRECIPITATION_RATE_GL, "total_precipitation_rate_gl", "Total precipitation rate at ground level", "kg/m^2/s", 0.2, 0.0, 0.05,
        ["prate", "tprate", "rprate"]),
    (DOWNWARD_ULTRAVIOLET_RADIATION_FLUX_GL, "downward_ultraviolet_radiation_flux_gl",
        "Downward ultraviolet radiation flux at ground level", "W/m^2", 1000.0, 0.0, 0.05,
        ["uvb"]),
    (DIRECT_SHORTWAVE_RADIATION_FLUX_GL, "direct_shortwave_radiation_flux_gl",
        "Direct shortwave radiation flux at ground level", "W/m^2", 1000.0, 0.0, 0.05,
        ["dsrp"]),
    (PRESSURE_MSL, "pressure_msl", "Mean sea level pressure", "Pa", 105000.0, 95000.0, 0.05,
        ["mslp", "msl"]),
}

lazy_static! {
    static ref DATA_BY_NAME: HashMap<&'static str, &'static ParameterData> = {
        let mut m = HashMap::with_capacity(PARAMETER_TABLE.len());
        for data in PARAMETER_TABLE {
            m.insert(data.name, data);
        }
        m
    };

    /// Alternate short name -> canonical parameter. Built once at process
    /// start; total over the union of all `alternative_shortnames` and
    /// injective by construction (see `registry::tests::alternates_are_injective`).
    static ref ALTERNATE_TO_CANONICAL: FxHashMap<&'static str, Parameter> = {
        let mut m = FxHashMap::default();
        for data in PARAMETER_TABLE {
            for alt in data.alternative_shortnames {
                if let Some(prev) = m.insert(*alt, Parameter(data.name)) {
                    panic!(
                        "alternate short name {:?} claimed by both {:?} and {:?}",
                        alt, prev.0, data.name
                    );
                }
            }
        }
        m
    };
}

/// Exact match on canonical name.
pub fn canonical(name: &str) -> Option<Parameter> {
    DATA_BY_NAME.get(name).map(|d| Parameter(d.name))
}

/// Resolve a provider's name for a variable to its canonical [`Parameter`],
/// searching first canonical names then every parameter's alternate list.
pub fn from_alternate(name: &str) -> Result<Parameter, RegistryError> {
    if let Some(p) = canonical(name) {
        return Ok(p);
    }
    ALTERNATE_TO_CANONICAL
        .get(name)
        .copied()
        .ok_or_else(|| RegistryError::UnknownParameter(name.to_string()))
}

/// All parameters known to the registry, in table order.
pub fn all() -> impl Iterator<Item = Parameter> {
    PARAMETER_TABLE.iter().map(|d| Parameter(d.name))
}

/// For each variable name present in `dataset`: if it resolves (directly or
/// via alternate) to a parameter in `allowed`, rename it to its canonical
/// name; otherwise drop it. Unknown names are never renamed, only dropped.
pub fn rename_else_drop(
    dataset: HashMap<String, ndarray::ArrayD<f64>>,
    allowed: &[Parameter],
) -> HashMap<String, ndarray::ArrayD<f64>> {
    let mut out = HashMap::with_capacity(dataset.len());
    for (raw_name, values) in dataset {
        if let Ok(param) = from_alternate(&raw_name) {
            if allowed.contains(&param) {
                out.insert(param.name().to_string(), values);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_exact_match() {
        assert_eq!(canonical("temperature_sl"), Some(TEMPERATURE_SL));
        assert_eq!(canonical("not_a_parameter"), None);
    }

    #[test]
    fn from_alternate_resolves_known_aliases() {
        assert_eq!(from_alternate("t2m").unwrap(), TEMPERATURE_SL);
        assert_eq!(from_alternate("dswrf").unwrap(), DOWNWARD_SHORTWAVE_RADIATION_FLUX_GL);
        assert_eq!(from_alternate("temperature_sl").unwrap(), TEMPERATURE_SL);
    }

    #[test]
    fn from_alternate_fails_on_unknown_name() {
        let err = from_alternate("mystery").unwrap_err();
        assert_eq!(err, RegistryError::UnknownParameter("mystery".to_string()));
    }

    #[test]
    fn alternates_are_injective() {
        // Forces construction of the lazy static; a panic here indicates a
        // genuine authoring bug in the parameter table.
        assert!(!ALTERNATE_TO_CANONICAL.is_empty());
    }

    /// S5: alternate-name resolution with rename_else_drop.
    #[test]
    fn rename_else_drop_keeps_only_allowed_renamed_variables() {
        let mut dataset = HashMap::new();
        dataset.insert("t2m".to_string(), ndarray::ArrayD::zeros(ndarray::IxDyn(&[2, 2])));
        dataset.insert("mystery".to_string(), ndarray::ArrayD::zeros(ndarray::IxDyn(&[2, 2])));

        let out = rename_else_drop(dataset, &[TEMPERATURE_SL]);

        assert_eq!(out.len(), 1);
        assert!(out.contains_key("temperature_sl"));
    }

    #[test]
    fn rename_else_drop_drops_names_not_in_allowed_even_if_known() {
        let mut dataset = HashMap::new();
        dataset.insert("u10".to_string(), ndarray::ArrayD::zeros(ndarray::IxDyn(&[2])));

        let out = rename_else_drop(dataset, &[TEMPERATURE_SL]);

        assert!(out.is_empty());
    }
}
