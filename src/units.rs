//! Measurement units and the fixed conversion table.
//!
//! Volume factors are expressed in milliliters, weight factors in grams.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad class of a unit; only units of the same kind convert into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Volume,
    Weight,
    Count,
}

/// Measurement system a convertible unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Metric,
    UsCustomary,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    Teaspoon,
    Tablespoon,
    FluidOunce,
    Cup,
    Pint,
    Quart,
    Gallon,
    Milliliter,
    Liter,
    Gram,
    Kilogram,
    Ounce,
    Pound,
    Pinch,
    Dash,
    Clove,
    Can,
    Piece,
    Slice,
    Stick,
    Bunch,
    Package,
    /// A recognized measure with no entry in the conversion table ("handful", "sprig").
    Custom(String),
}

/// Spellings accepted for each listed unit, lowercase.
const UNIT_ALIASES: &[(&str, Unit)] = &[
    ("teaspoons", Unit::Teaspoon),
    ("teaspoon", Unit::Teaspoon),
    ("tsp", Unit::Teaspoon),
    ("ts", Unit::Teaspoon),
    ("tablespoons", Unit::Tablespoon),
    ("tablespoon", Unit::Tablespoon),
    ("tbsp", Unit::Tablespoon),
    ("tbs", Unit::Tablespoon),
    ("tb", Unit::Tablespoon),
    ("fluid ounces", Unit::FluidOunce),
    ("fluid ounce", Unit::FluidOunce),
    ("fl oz", Unit::FluidOunce),
    ("fl. oz", Unit::FluidOunce),
    ("cups", Unit::Cup),
    ("cup", Unit::Cup),
    ("c", Unit::Cup),
    ("pints", Unit::Pint),
    ("pint", Unit::Pint),
    ("pt", Unit::Pint),
    ("quarts", Unit::Quart),
    ("quart", Unit::Quart),
    ("qt", Unit::Quart),
    ("gallons", Unit::Gallon),
    ("gallon", Unit::Gallon),
    ("gal", Unit::Gallon),
    ("milliliters", Unit::Milliliter),
    ("milliliter", Unit::Milliliter),
    ("millilitres", Unit::Milliliter),
    ("millilitre", Unit::Milliliter),
    ("ml", Unit::Milliliter),
    ("liters", Unit::Liter),
    ("liter", Unit::Liter),
    ("litres", Unit::Liter),
    ("litre", Unit::Liter),
    ("l", Unit::Liter),
    ("grams", Unit::Gram),
    ("gram", Unit::Gram),
    ("g", Unit::Gram),
    ("kilograms", Unit::Kilogram),
    ("kilogram", Unit::Kilogram),
    ("kg", Unit::Kilogram),
    ("ounces", Unit::Ounce),
    ("ounce", Unit::Ounce),
    ("oz", Unit::Ounce),
    ("pounds", Unit::Pound),
    ("pound", Unit::Pound),
    ("lbs", Unit::Pound),
    ("lb", Unit::Pound),
    ("pinches", Unit::Pinch),
    ("pinch", Unit::Pinch),
    ("dashes", Unit::Dash),
    ("dash", Unit::Dash),
    ("cloves", Unit::Clove),
    ("clove", Unit::Clove),
    ("cans", Unit::Can),
    ("can", Unit::Can),
    ("pieces", Unit::Piece),
    ("piece", Unit::Piece),
    ("pcs", Unit::Piece),
    ("pc", Unit::Piece),
    ("slices", Unit::Slice),
    ("slice", Unit::Slice),
    ("sticks", Unit::Stick),
    ("stick", Unit::Stick),
    ("bunches", Unit::Bunch),
    ("bunch", Unit::Bunch),
    ("packages", Unit::Package),
    ("package", Unit::Package),
    ("pkgs", Unit::Package),
    ("pkg", Unit::Package),
];

/// Measures the parser recognizes but the conversion table does not cover.
/// Stored singular in `Unit::Custom`.
const CUSTOM_UNITS: &[(&str, &str)] = &[
    ("handfuls", "handful"),
    ("handful", "handful"),
    ("sprigs", "sprig"),
    ("sprig", "sprig"),
    ("stalks", "stalk"),
    ("stalk", "stalk"),
    ("heads", "head"),
    ("head", "head"),
    ("jars", "jar"),
    ("jar", "jar"),
    ("bottles", "bottle"),
    ("bottle", "bottle"),
    ("bags", "bag"),
    ("bag", "bag"),
    ("boxes", "box"),
    ("box", "box"),
    ("cubes", "cube"),
    ("cube", "cube"),
    ("drops", "drop"),
    ("drop", "drop"),
];

impl Unit {
    /// Look a unit up by any accepted spelling. Case-insensitive, ignores a trailing period.
    pub fn parse(text: &str) -> Option<Unit> {
        let key = text.trim().trim_end_matches('.').to_lowercase();
        if key.is_empty() {
            return None;
        }
        if let Some((_, unit)) = UNIT_ALIASES.iter().find(|(alias, _)| *alias == key) {
            return Some(unit.clone());
        }
        CUSTOM_UNITS
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, singular)| Unit::Custom((*singular).to_string()))
    }

    /// Every accepted spelling, longest first, for prefix matching against free text.
    pub fn spellings() -> Vec<&'static str> {
        let mut all: Vec<&'static str> = UNIT_ALIASES
            .iter()
            .map(|(alias, _)| *alias)
            .chain(CUSTOM_UNITS.iter().map(|(alias, _)| *alias))
            .collect();
        all.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        all
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            Unit::Teaspoon
            | Unit::Tablespoon
            | Unit::FluidOunce
            | Unit::Cup
            | Unit::Pint
            | Unit::Quart
            | Unit::Gallon
            | Unit::Milliliter
            | Unit::Liter => UnitKind::Volume,
            Unit::Gram | Unit::Kilogram | Unit::Ounce | Unit::Pound => UnitKind::Weight,
            _ => UnitKind::Count,
        }
    }

    /// Factor to the base unit of this unit's kind (ml or g). `None` for count units.
    pub fn base_factor(&self) -> Option<f64> {
        let factor = match self {
            Unit::Milliliter => 1.0,
            Unit::Liter => 1000.0,
            Unit::Teaspoon => 4.92892,
            Unit::Tablespoon => 14.7868,
            Unit::FluidOunce => 29.5735,
            Unit::Cup => 236.588,
            Unit::Pint => 473.176,
            Unit::Quart => 946.353,
            Unit::Gallon => 3785.41,
            Unit::Gram => 1.0,
            Unit::Kilogram => 1000.0,
            Unit::Ounce => 28.3495,
            Unit::Pound => 453.592,
            _ => return None,
        };
        Some(factor)
    }

    /// `None` for count units.
    pub fn system(&self) -> Option<UnitSystem> {
        match self {
            Unit::Milliliter | Unit::Liter | Unit::Gram | Unit::Kilogram => {
                Some(UnitSystem::Metric)
            }
            Unit::Teaspoon
            | Unit::Tablespoon
            | Unit::FluidOunce
            | Unit::Cup
            | Unit::Pint
            | Unit::Quart
            | Unit::Gallon
            | Unit::Ounce
            | Unit::Pound => Some(UnitSystem::UsCustomary),
            _ => None,
        }
    }

    /// The unit a cook would write for `base` ml (volume) or g (weight) in
    /// `system`. `None` for count kinds.
    pub fn for_magnitude(base: f64, kind: UnitKind, system: UnitSystem) -> Option<Unit> {
        let unit = match (kind, system) {
            (UnitKind::Volume, UnitSystem::Metric) if base >= 1000.0 => Unit::Liter,
            (UnitKind::Volume, UnitSystem::Metric) => Unit::Milliliter,
            (UnitKind::Volume, UnitSystem::UsCustomary) if base <= 15.0 => Unit::Teaspoon,
            (UnitKind::Volume, UnitSystem::UsCustomary) if base <= 60.0 => Unit::Tablespoon,
            (UnitKind::Volume, UnitSystem::UsCustomary) => Unit::Cup,
            (UnitKind::Weight, UnitSystem::Metric) if base >= 1000.0 => Unit::Kilogram,
            (UnitKind::Weight, UnitSystem::Metric) => Unit::Gram,
            (UnitKind::Weight, UnitSystem::UsCustomary) if base < 453.592 => Unit::Ounce,
            (UnitKind::Weight, UnitSystem::UsCustomary) => Unit::Pound,
            (UnitKind::Count, _) => return None,
        };
        Some(unit)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Unit::Custom(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Unit::Teaspoon => "tsp",
            Unit::Tablespoon => "tbsp",
            Unit::FluidOunce => "fl oz",
            Unit::Cup => "cup",
            Unit::Pint => "pint",
            Unit::Quart => "quart",
            Unit::Gallon => "gallon",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Ounce => "oz",
            Unit::Pound => "lb",
            Unit::Pinch => "pinch",
            Unit::Dash => "dash",
            Unit::Clove => "clove",
            Unit::Can => "can",
            Unit::Piece => "piece",
            Unit::Slice => "slice",
            Unit::Stick => "stick",
            Unit::Bunch => "bunch",
            Unit::Package => "package",
            Unit::Custom(name) => name,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        Unit::parse(&value).unwrap_or_else(|| Unit::Custom(value.trim().to_lowercase()))
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_str().to_string()
    }
}

/// Convert `quantity` between two units of the same kind using the fixed table.
pub fn convert_quantity(quantity: f64, from: &Unit, to: &Unit) -> Option<f64> {
    if from == to {
        return Some(quantity);
    }
    if from.kind() != to.kind() {
        return None;
    }
    let from_factor = from.base_factor()?;
    let to_factor = to.base_factor()?;
    Some(quantity * from_factor / to_factor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "F", alias = "f", alias = "fahrenheit")]
    Fahrenheit,
    #[serde(rename = "C", alias = "c", alias = "celsius")]
    Celsius,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "F",
            TemperatureUnit::Celsius => "C",
        }
    }

    pub fn convert(&self, value: f64, to: TemperatureUnit) -> f64 {
        match (self, to) {
            (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => (value - 32.0) * 5.0 / 9.0,
            (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
            _ => value,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A temperature written in free text, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureMention {
    pub start: usize,
    pub end: usize,
    pub value: f64,
    pub unit: TemperatureUnit,
}

/// Find "350°F", "180 °C", "350 degrees F" and "200 degrees Celsius" style
/// mentions. A bare degree sign without a scale is ignored.
pub fn find_temperature_mentions(text: &str) -> Vec<TemperatureMention> {
    let bytes = text.as_bytes();
    let mut mentions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let starts_number = bytes[i].is_ascii_digit()
            && (i == 0 || !(bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.'));
        if !starts_number {
            i += 1;
            continue;
        }

        let start = i;
        let mut j = i;
        while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
            j += 1;
        }
        let number = text[start..j].trim_end_matches('.');
        let Ok(value) = number.parse::<f64>() else {
            i = j;
            continue;
        };

        match scale_after(text, j) {
            Some((unit, end)) => {
                mentions.push(TemperatureMention {
                    start,
                    end,
                    value,
                    unit,
                });
                i = end;
            }
            None => i = j,
        }
    }

    mentions
}

/// Parse the "°F" / " degrees Celsius" part following a number at `pos`.
fn scale_after(text: &str, pos: usize) -> Option<(TemperatureUnit, usize)> {
    let skip_spaces = |p: usize| p + (text[p..].len() - text[p..].trim_start_matches(' ').len());

    let mut p = skip_spaces(pos);
    let rest = &text[p..];
    if let Some(after) = rest.strip_prefix('°') {
        p += rest.len() - after.len();
    } else if starts_with_ignore_case(rest, "degrees") {
        p += 7;
    } else if starts_with_ignore_case(rest, "degree") {
        p += 6;
    } else {
        return None;
    }
    p = skip_spaces(p);

    let rest = &text[p..];
    for (word, unit) in [
        ("fahrenheit", TemperatureUnit::Fahrenheit),
        ("celsius", TemperatureUnit::Celsius),
        ("centigrade", TemperatureUnit::Celsius),
    ] {
        if starts_with_ignore_case(rest, word) {
            return Some((unit, p + word.len()));
        }
    }

    let mut chars = rest.chars();
    let unit = match chars.next()? {
        'F' | 'f' => TemperatureUnit::Fahrenheit,
        'C' | 'c' => TemperatureUnit::Celsius,
        _ => return None,
    };
    if chars.next().is_some_and(char::is_alphanumeric) {
        return None;
    }
    Some((unit, p + 1))
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

/// Round a converted amount for display. Milliliters and grams of 1 or more
/// become whole numbers, everything else keeps `precision` decimals. A nonzero
/// amount never rounds to zero; it keeps two significant digits instead.
pub fn smart_round(value: f64, unit: &Unit, precision: u32) -> f64 {
    let rounded = match unit {
        Unit::Milliliter | Unit::Gram if value.abs() >= 1.0 => value.round(),
        _ => round_to(value, precision),
    };
    if rounded == 0.0 && value != 0.0 && value.is_finite() {
        let digits = 1 - value.abs().log10().floor() as i32;
        let scale = 10f64.powi(digits);
        return (value * scale).round() / scale;
    }
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Unit::parse("Cups"), Some(Unit::Cup));
        assert_eq!(Unit::parse("tbsp."), Some(Unit::Tablespoon));
        assert_eq!(Unit::parse("fl oz"), Some(Unit::FluidOunce));
        assert_eq!(Unit::parse("handfuls"), Some(Unit::Custom("handful".to_string())));
        assert_eq!(Unit::parse("flour"), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Unit::Cup.kind(), UnitKind::Volume);
        assert_eq!(Unit::Pound.kind(), UnitKind::Weight);
        assert_eq!(Unit::Pinch.kind(), UnitKind::Count);
        assert_eq!(Unit::Custom("sprig".to_string()).kind(), UnitKind::Count);
    }

    #[test]
    fn test_convert_quantity() {
        let cups = convert_quantity(16.0, &Unit::Tablespoon, &Unit::Cup).unwrap();
        assert!((cups - 1.0).abs() < 0.001);

        let grams = convert_quantity(1.0, &Unit::Pound, &Unit::Gram).unwrap();
        assert!((grams - 453.592).abs() < 1e-9);

        assert!(convert_quantity(1.0, &Unit::Cup, &Unit::Gram).is_none());
        assert!(convert_quantity(1.0, &Unit::Pinch, &Unit::Dash).is_none());
    }

    #[test]
    fn test_systems_and_magnitudes() {
        assert_eq!(Unit::Tablespoon.system(), Some(UnitSystem::UsCustomary));
        assert_eq!(Unit::Kilogram.system(), Some(UnitSystem::Metric));
        assert_eq!(Unit::Clove.system(), None);

        let volume = |ml| Unit::for_magnitude(ml, UnitKind::Volume, UnitSystem::UsCustomary);
        assert_eq!(volume(5.0), Some(Unit::Teaspoon));
        assert_eq!(volume(30.0), Some(Unit::Tablespoon));
        assert_eq!(volume(250.0), Some(Unit::Cup));
        assert_eq!(
            Unit::for_magnitude(2000.0, UnitKind::Volume, UnitSystem::Metric),
            Some(Unit::Liter)
        );
        assert_eq!(
            Unit::for_magnitude(200.0, UnitKind::Weight, UnitSystem::UsCustomary),
            Some(Unit::Ounce)
        );
        assert_eq!(
            Unit::for_magnitude(1200.0, UnitKind::Weight, UnitSystem::Metric),
            Some(Unit::Kilogram)
        );
        assert_eq!(Unit::for_magnitude(3.0, UnitKind::Count, UnitSystem::Metric), None);
    }

    #[test]
    fn test_smart_round_keeps_small_amounts() {
        assert_eq!(smart_round(473.176, &Unit::Milliliter, 2), 473.0);
        assert_eq!(smart_round(0.616, &Unit::Milliliter, 2), 0.62);
        assert_eq!(smart_round(0.333333, &Unit::Cup, 2), 0.33);
        assert_eq!(smart_round(0.0026, &Unit::Cup, 2), 0.0026);
        assert_eq!(smart_round(0.0004, &Unit::Kilogram, 2), 0.0004);
        assert_eq!(smart_round(0.0, &Unit::Cup, 2), 0.0);
    }

    #[test]
    fn test_temperature_conversion() {
        let c = TemperatureUnit::Fahrenheit.convert(350.0, TemperatureUnit::Celsius);
        assert_eq!(round_to(c, 0), 177.0);
        let f = TemperatureUnit::Celsius.convert(100.0, TemperatureUnit::Fahrenheit);
        assert_eq!(f, 212.0);
    }

    #[test]
    fn test_serde_round_trips_through_strings() {
        let json = serde_json::to_string(&Unit::FluidOunce).unwrap();
        assert_eq!(json, "\"fl oz\"");
        let unit: Unit = serde_json::from_str("\"tablespoons\"").unwrap();
        assert_eq!(unit, Unit::Tablespoon);
        let temp: TemperatureUnit = serde_json::from_str("\"celsius\"").unwrap();
        assert_eq!(temp, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_find_temperature_mentions() {
        let text = "Heat oven to 350°F. Roast at 200 °C, then 425 degrees F or 220 degrees Celsius.";
        let mentions = find_temperature_mentions(text);
        assert_eq!(mentions.len(), 4);
        assert_eq!(mentions[0].value, 350.0);
        assert_eq!(mentions[0].unit, TemperatureUnit::Fahrenheit);
        assert_eq!(&text[mentions[0].start..mentions[0].end], "350°F");
        assert_eq!(&text[mentions[1].start..mentions[1].end], "200 °C");
        assert_eq!(&text[mentions[2].start..mentions[2].end], "425 degrees F");
        assert_eq!(mentions[3].unit, TemperatureUnit::Celsius);
        assert_eq!(&text[mentions[3].start..mentions[3].end], "220 degrees Celsius");
    }

    #[test]
    fn test_temperature_needs_a_scale() {
        assert!(find_temperature_mentions("Bake for 20 minutes at 180°").is_empty());
        assert!(find_temperature_mentions("Add 2 cups flour").is_empty());
        assert!(find_temperature_mentions("Use 2 degrees of freedom").is_empty());
    }

    #[test]
    fn test_spellings_longest_first() {
        let spellings = Unit::spellings();
        let tablespoons = spellings.iter().position(|s| *s == "tablespoons").unwrap();
        let tb = spellings.iter().position(|s| *s == "tb").unwrap();
        assert!(tablespoons < tb);
    }
}
