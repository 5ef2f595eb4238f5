use log::debug;
use std::fmt;

use crate::config::ProcessingSettings;
use crate::density::DensityTable;
use crate::error::ConversionError;
use crate::model::{Ingredient, Instruction, Recipe, Temperature};
use crate::units::{find_temperature_mentions, round_to, smart_round, TemperatureUnit, Unit, UnitKind};

/// Reported in place of a unit for lines that have none ("salt to taste").
pub const UNITLESS: &str = "no unit";

/// Target units and rounding for a conversion run.
///
/// The preferred volume and weight units pick the measurement system; the unit
/// written within that system follows the amount (tsp/tbsp/cup, ml/l, g/kg,
/// oz/lb).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPreferences {
    pub volume: Unit,
    pub weight: Unit,
    pub temperature: TemperatureUnit,
    pub quantity_precision: u32,
    pub temperature_precision: u32,
    /// Rewrite volumes of ingredients found in `densities` as weights.
    pub volume_to_weight: bool,
    pub densities: DensityTable,
}

impl UnitPreferences {
    pub fn from_settings(settings: &ProcessingSettings) -> Self {
        Self {
            volume: settings.preferred_volume_unit.clone(),
            weight: settings.preferred_weight_unit.clone(),
            temperature: settings.preferred_temperature_unit,
            quantity_precision: settings.quantity_precision,
            temperature_precision: settings.temperature_precision,
            volume_to_weight: settings.convert_volume_to_weight,
            densities: DensityTable::new(&settings.ingredient_densities),
        }
    }
}

impl Default for UnitPreferences {
    fn default() -> Self {
        Self::from_settings(&ProcessingSettings::default())
    }
}

/// A volume rewritten as a weight through a typical density.
#[derive(Debug, Clone, PartialEq)]
pub struct Approximation {
    pub ingredient: String,
    pub from: Unit,
    pub to: Unit,
    pub grams_per_cup: f64,
}

impl fmt::Display for Approximation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted from {} to {} using an approximate density of {} g per cup",
            self.ingredient, self.from, self.to, self.grams_per_cup
        )
    }
}

/// The converted recipe, the ingredients that were left as they were and the
/// conversions that relied on a density estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub recipe: Recipe,
    pub non_convertible: Vec<ConversionError>,
    pub approximations: Vec<Approximation>,
}

#[derive(Debug, Clone)]
pub struct ConverterAgent {
    preferences: UnitPreferences,
}

impl ConverterAgent {
    pub fn new(preferences: UnitPreferences) -> Self {
        Self { preferences }
    }

    pub fn preferences(&self) -> &UnitPreferences {
        &self.preferences
    }

    pub fn convert(&self, recipe: Recipe) -> Conversion {
        let mut non_convertible = Vec::new();
        let mut approximations = Vec::new();

        let ingredients = recipe
            .ingredients
            .into_iter()
            .map(
                |ingredient| match self.convert_ingredient(ingredient, &mut approximations) {
                    Ok(converted) => converted,
                    Err((kept, error)) => {
                        non_convertible.push(error);
                        kept
                    }
                },
            )
            .collect();

        let instructions = recipe
            .instructions
            .into_iter()
            .map(|instruction| self.convert_instruction(instruction))
            .collect();

        Conversion {
            recipe: Recipe {
                ingredients,
                instructions,
                ..recipe
            },
            non_convertible,
            approximations,
        }
    }

    fn convert_ingredient(
        &self,
        ingredient: Ingredient,
        approximations: &mut Vec<Approximation>,
    ) -> Result<Ingredient, (Ingredient, ConversionError)> {
        let Some(unit) = ingredient.unit.as_ref() else {
            let error = ConversionError::NonConvertibleUnit {
                ingredient: ingredient.name.clone(),
                unit: UNITLESS.to_string(),
            };
            return Err((ingredient, error));
        };
        let (Some(system), Some(base_factor)) = (unit.system(), unit.base_factor()) else {
            let error = non_convertible(&ingredient, unit);
            return Err((ingredient, error));
        };
        // A measured unit without an amount has nothing to scale.
        let Some(quantity) = ingredient.quantity else {
            return Ok(ingredient);
        };

        if self.preferences.volume_to_weight && unit.kind() == UnitKind::Volume {
            if let Some(grams_per_cup) = self.preferences.densities.find(&ingredient.name) {
                if let Some(grams) = DensityTable::grams(quantity, unit, grams_per_cup) {
                    if let Some((amount, target)) = self.rescale(grams, UnitKind::Weight) {
                        debug!(
                            "Approximated {} {} {} as {} {}",
                            quantity, unit, ingredient.name, amount, target
                        );
                        approximations.push(Approximation {
                            ingredient: ingredient.name.clone(),
                            from: unit.clone(),
                            to: target.clone(),
                            grams_per_cup,
                        });
                        return Ok(Ingredient {
                            quantity: Some(amount),
                            unit: Some(target),
                            ..ingredient
                        });
                    }
                }
            }
        }

        let preferred = match unit.kind() {
            UnitKind::Volume => &self.preferences.volume,
            UnitKind::Weight => &self.preferences.weight,
            UnitKind::Count => return Ok(ingredient),
        };
        if preferred.system() == Some(system) {
            return Ok(ingredient);
        }

        match self.rescale(quantity * base_factor, unit.kind()) {
            Some((converted, target)) => {
                debug!(
                    "Converted {} {} {} to {} {}",
                    quantity, unit, ingredient.name, converted, target
                );
                Ok(Ingredient {
                    quantity: Some(converted),
                    unit: Some(target),
                    ..ingredient
                })
            }
            None => {
                let error = non_convertible(&ingredient, unit);
                Err((ingredient, error))
            }
        }
    }

    /// Express `base` ml or g in the preferred system, in the unit that fits
    /// the amount, rounded for display.
    fn rescale(&self, base: f64, kind: UnitKind) -> Option<(f64, Unit)> {
        let preferred = match kind {
            UnitKind::Volume => &self.preferences.volume,
            UnitKind::Weight => &self.preferences.weight,
            UnitKind::Count => return None,
        };
        let target = Unit::for_magnitude(base, kind, preferred.system()?)?;
        let converted = base / target.base_factor()?;
        let rounded = smart_round(converted, &target, self.preferences.quantity_precision);
        Some((rounded, target))
    }

    fn convert_instruction(&self, instruction: Instruction) -> Instruction {
        let target = self.preferences.temperature;
        let precision = self.preferences.temperature_precision;
        let mentions = find_temperature_mentions(&instruction.text);
        if mentions.iter().all(|m| m.unit == target) {
            return Instruction {
                temperature: instruction.temperature.map(|t| convert_hint(t, target, precision)),
                ..instruction
            };
        }

        let mut text = String::with_capacity(instruction.text.len());
        let mut last = 0;
        for mention in &mentions {
            text.push_str(&instruction.text[last..mention.start]);
            if mention.unit == target {
                text.push_str(&instruction.text[mention.start..mention.end]);
            } else {
                let value = round_to(mention.unit.convert(mention.value, target), precision);
                text.push_str(&format!("{}°{}", value, target.symbol()));
            }
            last = mention.end;
        }
        text.push_str(&instruction.text[last..]);

        Instruction {
            text,
            temperature: instruction.temperature.map(|t| convert_hint(t, target, precision)),
            ..instruction
        }
    }
}

fn convert_hint(temperature: Temperature, target: TemperatureUnit, precision: u32) -> Temperature {
    if temperature.unit == target {
        return temperature;
    }
    Temperature {
        value: round_to(temperature.unit.convert(temperature.value, target), precision),
        unit: target,
    }
}

fn non_convertible(ingredient: &Ingredient, unit: &Unit) -> ConversionError {
    ConversionError::NonConvertibleUnit {
        ingredient: ingredient.name.clone(),
        unit: unit.to_string(),
    }
}
