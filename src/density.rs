//! Ingredient densities for volume-to-weight conversion.
//!
//! Densities are stored as grams per US cup (236.588 ml).

use std::collections::BTreeMap;

use crate::units::{convert_quantity, Unit};

/// Built-in densities, grams per cup.
const DENSITIES: &[(&str, f64)] = &[
    // Flours and starches
    ("flour", 120.0),
    ("all-purpose flour", 125.0),
    ("bread flour", 127.0),
    ("cake flour", 114.0),
    ("whole wheat flour", 120.0),
    ("almond flour", 96.0),
    ("cornstarch", 128.0),
    ("cocoa powder", 85.0),
    ("oats", 90.0),
    ("rolled oats", 90.0),
    ("rice", 185.0),
    // Sugars and syrups
    ("sugar", 200.0),
    ("granulated sugar", 200.0),
    ("brown sugar", 220.0),
    ("powdered sugar", 120.0),
    ("honey", 340.0),
    ("maple syrup", 315.0),
    // Fats and dairy
    ("butter", 227.0),
    ("oil", 218.0),
    ("olive oil", 216.0),
    ("vegetable oil", 218.0),
    ("milk", 245.0),
    ("cream", 238.0),
    ("heavy cream", 238.0),
    ("sour cream", 242.0),
    ("yogurt", 245.0),
    // Liquids
    ("water", 236.6),
    // Leaveners and seasoning
    ("salt", 288.0),
    ("baking powder", 220.0),
    ("baking soda", 220.0),
    ("vanilla extract", 208.0),
];

/// Grams-per-cup lookup: the built-in table plus configured entries, which win.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityTable {
    grams_per_cup: BTreeMap<String, f64>,
}

impl DensityTable {
    pub fn new(overrides: &BTreeMap<String, f64>) -> Self {
        let mut grams_per_cup: BTreeMap<String, f64> = DENSITIES
            .iter()
            .map(|(name, density)| ((*name).to_string(), *density))
            .collect();
        for (name, density) in overrides {
            grams_per_cup.insert(name.trim().to_lowercase(), *density);
        }
        Self { grams_per_cup }
    }

    /// Density for an ingredient name. Tries the whole name, then drops
    /// leading words one at a time, so "unsalted butter" finds "butter".
    pub fn find(&self, ingredient: &str) -> Option<f64> {
        let normalized = ingredient.trim().to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        (0..words.len()).find_map(|skip| {
            self.grams_per_cup
                .get(words[skip..].join(" ").as_str())
                .copied()
        })
    }

    /// Grams in `quantity` of `unit` of an ingredient weighing `grams_per_cup`.
    /// `None` unless `unit` is a volume unit.
    pub fn grams(quantity: f64, unit: &Unit, grams_per_cup: f64) -> Option<f64> {
        let cups = convert_quantity(quantity, unit, &Unit::Cup)?;
        Some(cups * grams_per_cup)
    }
}

impl Default for DensityTable {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_strips_leading_modifiers() {
        let table = DensityTable::default();
        assert_eq!(table.find("Flour"), Some(120.0));
        assert_eq!(table.find("unsalted butter"), Some(227.0));
        assert_eq!(table.find("light brown sugar"), Some(220.0));
        assert_eq!(table.find("saffron"), None);
        assert_eq!(table.find(""), None);
    }

    #[test]
    fn test_configured_entries_win() {
        let overrides = BTreeMap::from([
            ("Flour".to_string(), 130.0),
            ("tahini".to_string(), 240.0),
        ]);
        let table = DensityTable::new(&overrides);
        assert_eq!(table.find("flour"), Some(130.0));
        assert_eq!(table.find("tahini"), Some(240.0));
        assert_eq!(table.find("butter"), Some(227.0));
    }

    #[test]
    fn test_grams() {
        let grams = DensityTable::grams(2.0, &Unit::Tablespoon, 227.0).unwrap();
        assert!((grams - 28.375).abs() < 0.01);
        assert!(DensityTable::grams(1.0, &Unit::Gram, 227.0).is_none());
    }
}
