pub mod converter;
pub mod fetcher;
pub mod ingredient_parser;
pub mod json_ld;
pub mod normalizer;
pub mod parser;
pub mod quality;
pub mod scraper;

pub use converter::{Approximation, Conversion, ConverterAgent, UnitPreferences};
pub use fetcher::{Fetcher, HttpFetcher};
pub use ingredient_parser::{score_structure, IngredientParser, RuleBasedParser, StructuredIngredient};
pub use normalizer::NormalizerAgent;
pub use parser::ParserAgent;
pub use quality::{Decision, QualityGate, QualitySettings, QualityVerdict};
pub use self::scraper::ScraperAgent;
