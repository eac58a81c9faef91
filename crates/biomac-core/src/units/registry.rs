//! Unit registry with the physical and commodity conversion factors used by
//! techno-economic and life-cycle pathway data.
//!
//! The registry holds:
//!
//! - Physical units grouped by [`Quantity`], each with a factor to the
//!   standard unit of that quantity (mass `lb`, energy `MJ`, volume `gal`,
//!   time `hr`, currency `USD`)
//! - Commodity factors, where the conversion depends on the material: bushel
//!   weights of grains, energy content of crude oil and fuel heating values
//! - Fuel heating values (LHV), used to build explicit conversion chains from
//!   volumetric or mass fuel quantities to energy
//!
//! # Conversion Factor Convention
//!
//! Factors are multipliers: `value_in_to_unit = value_in_from_unit * factor`.
//! For physical units the registered factor converts FROM the unit TO the
//! standard unit of its quantity, e.g. `kWh` has factor 3.6 (1 kWh = 3.6 MJ).
//!
//! A lookup miss is a first-class outcome (`None`), never an implicit `1.0`.

use super::parser::RatioUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

/// Megajoules per kilowatt hour.
pub const MJ_PER_KWH: f64 = 3.6;
/// Megajoules per British thermal unit.
pub const MJ_PER_BTU: f64 = 1.055_056e-3;
/// Pounds per metric ton.
pub const LB_PER_METRIC_TON: f64 = 2_204.622_6;
/// Pounds per short ton.
pub const LB_PER_SHORT_TON: f64 = 2_000.0;
/// Grams per pound.
pub const G_PER_LB: f64 = 453.592_37;
/// Megajoules per gasoline gallon equivalent.
pub const MJ_PER_GGE: f64 = 121.2;
/// Gallons per cubic metre.
pub const GAL_PER_M3: f64 = 264.172_052;

/// The global unit registry with default commodity data.
pub static UNIT_REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::new);

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        // Mass
        ("lbs", "lb"),
        ("pound", "lb"),
        ("pounds", "lb"),
        ("gram", "g"),
        ("grams", "g"),
        ("kilogram", "kg"),
        ("kilograms", "kg"),
        ("Short Tons", "ton"),
        ("Short Ton", "ton"),
        ("short ton", "ton"),
        ("short tons", "ton"),
        ("tons", "ton"),
        ("U.S. ton", "ton"),
        ("dt", "ton"),
        ("dry ton", "ton"),
        ("dry tons", "ton"),
        ("MT", "tonne"),
        ("metric ton", "tonne"),
        ("metric tons", "tonne"),
        ("tonnes", "tonne"),
        ("t", "tonne"),
        // Energy
        ("btu", "Btu"),
        ("BTU", "Btu"),
        ("MMBtu", "mmBtu"),
        ("mmbtu", "mmBtu"),
        ("MMBTU", "mmBtu"),
        ("million Btu", "mmBtu"),
        ("kwh", "kWh"),
        ("KWh", "kWh"),
        ("mwh", "MWh"),
        ("gge", "GGE"),
        // Volume
        ("gallon", "gal"),
        ("gallons", "gal"),
        ("gals", "gal"),
        ("liter", "L"),
        ("liters", "L"),
        ("litre", "L"),
        ("litres", "L"),
        ("l", "L"),
        ("m^3", "m3"),
        ("cubic meter", "m3"),
        ("barrel", "bbl"),
        ("barrels", "bbl"),
        ("cu ft", "ft3"),
        ("cf", "ft3"),
        ("scf", "ft3"),
        // Time
        ("h", "hr"),
        ("hour", "hr"),
        ("hours", "hr"),
        ("hrs", "hr"),
        ("days", "day"),
        ("year", "yr"),
        ("years", "yr"),
        ("y", "yr"),
        // Currency
        ("$", "USD"),
        ("US$", "USD"),
        ("dollar", "USD"),
        ("dollars", "USD"),
        // Commodity-only units
        ("bushel", "bu"),
        ("bushels", "bu"),
    ])
});

/// Returns the canonical symbol for a unit spelling, or the input itself
/// when the spelling has no alias.
#[must_use]
pub fn canonical_symbol(symbol: &str) -> &str {
    ALIASES.get(symbol).copied().unwrap_or(symbol)
}

/// Physical quantity of a unit.
///
/// Units of the same quantity convert by linear scaling through the standard
/// unit of that quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    Mass,
    Energy,
    Volume,
    Time,
    Currency,
}

impl Quantity {
    /// The unit every value of this quantity is harmonized to by default.
    #[must_use]
    pub fn standard_unit(self) -> &'static str {
        match self {
            Self::Mass => "lb",
            Self::Energy => "MJ",
            Self::Volume => "gal",
            Self::Time => "hr",
            Self::Currency => "USD",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mass => "mass",
            Self::Energy => "energy",
            Self::Volume => "volume",
            Self::Time => "time",
            Self::Currency => "currency",
        };
        write!(f, "{name}")
    }
}

/// Information about a known physical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    /// The canonical symbol of this unit.
    pub name: String,
    pub quantity: Quantity,
    /// Multiplier to the standard unit of `quantity`.
    pub to_standard: f64,
}

impl UnitInfo {
    fn new(name: &str, quantity: Quantity, to_standard: f64) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            to_standard,
        }
    }
}

/// Lower heating value of a fuel, e.g. `128488 Btu/gal` for diesel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingValue {
    pub fuel: String,
    pub value: f64,
    /// Energy unit over the fuel's volume or mass unit.
    pub unit: RatioUnit,
}

impl HeatingValue {
    pub fn new(fuel: &str, value: f64, unit: RatioUnit) -> Self {
        Self {
            fuel: fuel.to_string(),
            value,
            unit,
        }
    }
}

/// Key of a commodity factor: (commodity, from unit, to unit).
type CommodityKey = (String, String, String);

/// Registry of known units, commodity factors and heating values.
///
/// Built once at process start and treated as immutable afterwards. Extra
/// commodity data can be added with the `with_*` builders before the
/// registry is shared.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: HashMap<&'static str, UnitInfo>,
    commodity_factors: HashMap<CommodityKey, f64>,
    heating_values: BTreeMap<String, HeatingValue>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Creates a registry populated with physical units and default
    /// commodity data.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_mass_units();
        registry.register_energy_units();
        registry.register_volume_units();
        registry.register_time_units();
        registry.register_currency_units();
        registry.register_feedstock_factors();
        registry.register_heating_values();
        registry
    }

    /// Creates a registry with physical units only.
    pub fn physical_only() -> Self {
        let mut registry = Self::empty();
        registry.register_mass_units();
        registry.register_energy_units();
        registry.register_volume_units();
        registry.register_time_units();
        registry.register_currency_units();
        registry
    }

    fn empty() -> Self {
        Self {
            units: HashMap::new(),
            commodity_factors: HashMap::new(),
            heating_values: BTreeMap::new(),
        }
    }

    /// Looks up a physical unit by symbol, resolving aliases.
    #[must_use]
    pub fn lookup(&self, symbol: &str) -> Option<&UnitInfo> {
        self.units.get(canonical_symbol(symbol.trim()))
    }

    /// Infers the physical quantity of a unit symbol.
    #[must_use]
    pub fn quantity_of(&self, symbol: &str) -> Option<Quantity> {
        self.lookup(symbol).map(|info| info.quantity)
    }

    /// Factor between two physical units of the same quantity.
    ///
    /// Returns `None` if either unit is unknown or the quantities differ.
    #[must_use]
    pub fn quantity_factor(&self, quantity: Quantity, from: &str, to: &str) -> Option<f64> {
        let from = self.lookup(from)?;
        let to = self.lookup(to)?;
        if from.quantity != quantity || to.quantity != quantity {
            return None;
        }
        Some(from.to_standard / to.to_standard)
    }

    /// Factor registered for a commodity, or the inverse of the reverse
    /// entry.
    #[must_use]
    pub fn commodity_factor(&self, commodity: &str, from: &str, to: &str) -> Option<f64> {
        let from = canonical_symbol(from.trim());
        let to = canonical_symbol(to.trim());
        if from == to {
            return Some(1.0);
        }
        let key = (commodity.to_string(), from.to_string(), to.to_string());
        if let Some(factor) = self.commodity_factors.get(&key) {
            return Some(*factor);
        }
        let inverse = (commodity.to_string(), to.to_string(), from.to_string());
        self.commodity_factors
            .get(&inverse)
            .filter(|factor| **factor != 0.0)
            .map(|factor| 1.0 / factor)
    }

    /// Heating value of a fuel, if registered.
    #[must_use]
    pub fn heating_value(&self, fuel: &str) -> Option<&HeatingValue> {
        self.heating_values.get(fuel)
    }

    /// Iterates over all registered heating values in fuel-name order.
    pub fn heating_values(&self) -> impl Iterator<Item = &HeatingValue> {
        self.heating_values.values()
    }

    /// Registers a commodity factor.
    pub fn register_commodity_factor(&mut self, commodity: &str, from: &str, to: &str, factor: f64) {
        self.commodity_factors.insert(
            (
                commodity.to_string(),
                canonical_symbol(from.trim()).to_string(),
                canonical_symbol(to.trim()).to_string(),
            ),
            factor,
        );
    }

    /// Adds a commodity factor, returning the registry.
    #[must_use]
    pub fn with_commodity_factor(mut self, commodity: &str, from: &str, to: &str, factor: f64) -> Self {
        self.register_commodity_factor(commodity, from, to, factor);
        self
    }

    /// Registers a heating value and the commodity factor it implies.
    ///
    /// A heating value without a denominator carries no per-unit
    /// information and is ignored.
    pub fn register_heating_value(&mut self, heating_value: HeatingValue) {
        let Some(denominator) = heating_value.unit.denominator() else {
            return;
        };
        self.register_commodity_factor(
            &heating_value.fuel,
            denominator,
            heating_value.unit.numerator(),
            heating_value.value,
        );
        self.heating_values
            .insert(heating_value.fuel.clone(), heating_value);
    }

    /// Adds a heating value, returning the registry.
    #[must_use]
    pub fn with_heating_value(mut self, heating_value: HeatingValue) -> Self {
        self.register_heating_value(heating_value);
        self
    }

    fn insert_unit(&mut self, name: &'static str, quantity: Quantity, to_standard: f64) {
        self.units
            .insert(name, UnitInfo::new(name, quantity, to_standard));
    }

    /// Registers mass units (standard: lb).
    fn register_mass_units(&mut self) {
        self.insert_unit("lb", Quantity::Mass, 1.0);
        self.insert_unit("oz", Quantity::Mass, 1.0 / 16.0);
        self.insert_unit("g", Quantity::Mass, 1.0 / G_PER_LB);
        self.insert_unit("kg", Quantity::Mass, 1000.0 / G_PER_LB);
        self.insert_unit("ton", Quantity::Mass, LB_PER_SHORT_TON);
        self.insert_unit("tonne", Quantity::Mass, LB_PER_METRIC_TON);
    }

    /// Registers energy units (standard: MJ).
    fn register_energy_units(&mut self) {
        self.insert_unit("MJ", Quantity::Energy, 1.0);
        self.insert_unit("J", Quantity::Energy, 1e-6);
        self.insert_unit("kJ", Quantity::Energy, 1e-3);
        self.insert_unit("GJ", Quantity::Energy, 1e3);
        self.insert_unit("TJ", Quantity::Energy, 1e6);
        self.insert_unit("Btu", Quantity::Energy, MJ_PER_BTU);
        self.insert_unit("mmBtu", Quantity::Energy, MJ_PER_BTU * 1e6);
        self.insert_unit("therm", Quantity::Energy, MJ_PER_BTU * 1e5);
        self.insert_unit("kWh", Quantity::Energy, MJ_PER_KWH);
        self.insert_unit("MWh", Quantity::Energy, MJ_PER_KWH * 1e3);
        self.insert_unit("GWh", Quantity::Energy, MJ_PER_KWH * 1e6);
        self.insert_unit("GGE", Quantity::Energy, MJ_PER_GGE);
    }

    /// Registers volume units (standard: gal).
    fn register_volume_units(&mut self) {
        self.insert_unit("gal", Quantity::Volume, 1.0);
        self.insert_unit("L", Quantity::Volume, GAL_PER_M3 / 1000.0);
        self.insert_unit("mL", Quantity::Volume, GAL_PER_M3 / 1e6);
        self.insert_unit("m3", Quantity::Volume, GAL_PER_M3);
        self.insert_unit("ft3", Quantity::Volume, 7.480_519_48);
        self.insert_unit("bbl", Quantity::Volume, 42.0);
    }

    /// Registers time units (standard: hr).
    fn register_time_units(&mut self) {
        self.insert_unit("hr", Quantity::Time, 1.0);
        self.insert_unit("s", Quantity::Time, 1.0 / 3600.0);
        self.insert_unit("min", Quantity::Time, 1.0 / 60.0);
        self.insert_unit("day", Quantity::Time, 24.0);
        self.insert_unit("yr", Quantity::Time, 8760.0);
    }

    fn register_currency_units(&mut self) {
        self.insert_unit("USD", Quantity::Currency, 1.0);
        self.insert_unit("kUSD", Quantity::Currency, 1e3);
        self.insert_unit("MMUSD", Quantity::Currency, 1e6);
    }

    /// Registers grain bushel weights and crude oil energy content.
    fn register_feedstock_factors(&mut self) {
        for (crop, lb_per_bushel) in [
            ("Barley", 48.0),
            ("Corn", 56.0),
            ("Oats", 32.0),
            ("Sorghum", 56.0),
            ("Soybeans", 60.0),
            ("Wheat", 60.0),
        ] {
            self.register_commodity_factor(crop, "bu", "lb", lb_per_bushel);
        }
        self.register_commodity_factor("Crude oil", "bbl", "mmBtu", 5.691);
    }

    /// Registers default lower heating values of common fuels.
    fn register_heating_values(&mut self) {
        let btu_per_gal = RatioUnit::per("Btu", "gal");
        for (fuel, lhv) in [
            ("Gasoline", 112_194.0),
            ("Diesel", 128_488.0),
            ("Jet fuel", 128_100.0),
            ("Ethanol", 76_330.0),
            ("Methanol", 57_250.0),
            ("Renewable diesel", 122_887.0),
            ("Residual oil", 140_353.0),
            ("LPG", 84_950.0),
        ] {
            self.register_heating_value(HeatingValue::new(fuel, lhv, btu_per_gal.clone()));
        }
        self.register_heating_value(HeatingValue::new(
            "Natural gas",
            983.0,
            RatioUnit::per("Btu", "ft3"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_alias_lookup() {
        let registry = UnitRegistry::new();

        let ton = registry.lookup("Short Tons").expect("Short Tons should resolve");
        assert_eq!(ton.name, "ton");
        assert_eq!(ton.quantity, Quantity::Mass);
        assert_relative_eq!(ton.to_standard, 2000.0);

        let mmbtu = registry.lookup("MMBtu").expect("MMBtu should resolve");
        assert_eq!(mmbtu.name, "mmBtu");
    }

    #[test]
    fn test_unknown_unit_is_a_miss() {
        let registry = UnitRegistry::new();
        assert!(registry.lookup("furlong").is_none());
        assert!(registry.quantity_factor(Quantity::Mass, "lb", "furlong").is_none());
    }

    #[test]
    fn test_quantity_factor_requires_matching_quantity() {
        let registry = UnitRegistry::new();
        assert!(registry.quantity_factor(Quantity::Mass, "lb", "MJ").is_none());
        assert!(registry.quantity_factor(Quantity::Energy, "lb", "kg").is_none());
    }

    #[test]
    fn test_energy_factors() {
        let registry = UnitRegistry::new();
        assert_relative_eq!(
            registry.quantity_factor(Quantity::Energy, "kWh", "MJ").unwrap(),
            3.6
        );
        assert_relative_eq!(
            registry.quantity_factor(Quantity::Energy, "MMBtu", "MJ").unwrap(),
            1055.056,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            registry.quantity_factor(Quantity::Energy, "GGE", "MJ").unwrap(),
            121.2
        );
    }

    #[test]
    fn test_metric_ton_in_pounds() {
        let registry = UnitRegistry::new();
        assert_relative_eq!(
            registry.quantity_factor(Quantity::Mass, "MT", "lb").unwrap(),
            2204.6226,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            registry.quantity_factor(Quantity::Mass, "lb", "ton").unwrap(),
            0.0005
        );
    }

    #[test]
    fn test_commodity_factor_and_inverse() {
        let registry = UnitRegistry::new();
        assert_relative_eq!(registry.commodity_factor("Corn", "bushel", "lb").unwrap(), 56.0);
        assert_relative_eq!(
            registry.commodity_factor("Corn", "lb", "bu").unwrap(),
            1.0 / 56.0
        );
        assert!(registry.commodity_factor("Rice", "bu", "lb").is_none());
    }

    #[test]
    fn test_heating_value_registers_commodity_factor() {
        let registry = UnitRegistry::physical_only().with_heating_value(HeatingValue::new(
            "Biocrude",
            120_000.0,
            RatioUnit::per("Btu", "gal"),
        ));
        assert_relative_eq!(
            registry.commodity_factor("Biocrude", "gal", "Btu").unwrap(),
            120_000.0
        );
        assert!(registry.heating_value("Biocrude").is_some());
        assert!(registry.heating_value("Diesel").is_none());
    }

    #[test]
    fn test_canonical_symbol() {
        assert_eq!(canonical_symbol("$"), "USD");
        assert_eq!(canonical_symbol("gallons"), "gal");
        assert_eq!(canonical_symbol("MJ"), "MJ");
        assert_eq!(canonical_symbol("widget"), "widget");
    }
}
