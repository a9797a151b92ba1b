use std::collections::BTreeMap;
use std::io::Read;

use aangifte_core::{
    BracketDefinition, ConfigurationFault, CreditRule, CreditType, DeclarationCategory,
    DeductionRule, DeductionType, FetchedTables, PartnerRequirement, PhaseOut,
    RateTableDefinition, RateTableKey,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that make the rate table data unreadable as a whole.
///
/// A bad row that still names its table is not an error here; it becomes a
/// [`ConfigurationFault`] against that table in [`FetchedTables::faults`].
#[derive(Debug, Error)]
pub enum RateTableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("unknown declaration category '{0}'")]
    UnknownCategory(String),
}

impl From<csv::Error> for RateTableLoaderError {
    fn from(err: csv::Error) -> Self {
        RateTableLoaderError::CsvParse(err.to_string())
    }
}

/// `tables.csv`: one row per published table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TableRecord {
    pub tax_year: i32,
    pub category: String,
    pub version: String,
}

/// `brackets.csv`: brackets in ascending order; an empty `upper_bound` is open.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub tax_year: i32,
    pub category: String,
    pub lower_bound: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

/// `thresholds.csv`: named amounts such as `minimum_assessment`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThresholdRecord {
    pub tax_year: i32,
    pub category: String,
    pub name: String,
    pub amount: Decimal,
}

/// `credits.csv`: one row per permitted credit type.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CreditRecord {
    pub tax_year: i32,
    pub category: String,
    pub credit_type: String,
    pub maximum: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub phase_out_threshold: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub phase_out_rate: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub automatic: bool,
    pub minimum_age: Option<u32>,
    pub dependent_under_age: Option<u32>,
    #[serde(default)]
    pub partner: String,
}

/// `deductions.csv`: one row per permitted deduction type.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeductionRecord {
    pub tax_year: i32,
    pub category: String,
    pub deduction_type: String,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub ceiling: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub shareable: bool,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// `true`/`false`, `yes`/`no`, or empty for false.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") | Some("false") | Some("no") => Ok(false),
        Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(serde::de::Error::custom(format!("invalid flag '{other}'"))),
    }
}

/// The parsed contents of the five rate table files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTableRecords {
    pub tables: Vec<TableRecord>,
    pub brackets: Vec<BracketRecord>,
    pub thresholds: Vec<ThresholdRecord>,
    pub credits: Vec<CreditRecord>,
    pub deductions: Vec<DeductionRecord>,
}

fn category(name: &str) -> Result<DeclarationCategory, RateTableLoaderError> {
    DeclarationCategory::parse(name.trim())
        .ok_or_else(|| RateTableLoaderError::UnknownCategory(name.to_string()))
}

/// Definitions being assembled, and the keys already given up on.
#[derive(Default)]
struct Assembly {
    definitions: BTreeMap<RateTableKey, RateTableDefinition>,
    faults: BTreeMap<RateTableKey, ConfigurationFault>,
}

impl Assembly {
    /// The key a row of `file` belongs to, or `None` when that table has
    /// already failed or is not listed in `tables.csv`.
    fn key(
        &mut self,
        file: &'static str,
        tax_year: i32,
        category_name: &str,
    ) -> Result<Option<RateTableKey>, RateTableLoaderError> {
        let key = RateTableKey::new(tax_year, category(category_name)?);
        if self.faults.contains_key(&key) {
            return Ok(None);
        }
        if !self.definitions.contains_key(&key) {
            self.fail(ConfigurationFault::MalformedEntry {
                key,
                detail: format!("{file} has rows for a table not listed in tables.csv"),
            });
            return Ok(None);
        }
        Ok(Some(key))
    }

    /// Drops the table and keeps the first fault found for it.
    fn fail(&mut self, fault: ConfigurationFault) {
        let key = fault.key();
        self.definitions.remove(&key);
        self.faults.entry(key).or_insert(fault);
    }

    fn unknown(
        &mut self,
        key: RateTableKey,
        what: &str,
        name: &str,
    ) {
        self.fail(ConfigurationFault::MalformedEntry {
            key,
            detail: format!("unknown {what} '{name}'"),
        });
    }

    fn finish(self) -> FetchedTables {
        FetchedTables {
            definitions: self.definitions.into_values().collect(),
            faults: self.faults.into_values().collect(),
        }
    }
}

/// Loader for rate table data from CSV files.
///
/// Parsing and assembling are separate so the same records can come from
/// files, embedded strings or tests. Assembling does not check bracket
/// contiguity; that happens when the registry builds the tables.
pub struct RateTableLoader;

impl RateTableLoader {
    /// Parse records of any of the rate table files from a CSV reader.
    pub fn parse<T, R>(reader: R) -> Result<Vec<T>, RateTableLoaderError>
    where
        T: DeserializeOwned,
        R: Read,
    {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: T = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Groups the records into one definition per row of `tables.csv`, in
    /// `(tax_year, category)` order.
    ///
    /// A table with a bad or repeated row is left out of the definitions and
    /// reported as a fault instead. Only a category name that cannot be
    /// parsed fails the whole assembly, since its rows belong to no table.
    pub fn assemble(records: RateTableRecords) -> Result<FetchedTables, RateTableLoaderError> {
        let mut assembly = Assembly::default();

        for table in records.tables {
            let key = RateTableKey::new(table.tax_year, category(&table.category)?);
            if assembly.definitions.contains_key(&key) || assembly.faults.contains_key(&key) {
                assembly.fail(ConfigurationFault::DuplicateTable { key });
                continue;
            }
            assembly.definitions.insert(
                key,
                RateTableDefinition {
                    tax_year: key.tax_year,
                    category: key.category,
                    version: table.version,
                    brackets: Vec::new(),
                    thresholds: BTreeMap::new(),
                    credits: BTreeMap::new(),
                    deductions: BTreeMap::new(),
                },
            );
        }

        for record in records.brackets {
            let Some(key) = assembly.key("brackets.csv", record.tax_year, &record.category)? else {
                continue;
            };
            if let Some(definition) = assembly.definitions.get_mut(&key) {
                definition.brackets.push(BracketDefinition {
                    lower_bound: record.lower_bound,
                    upper_bound: record.upper_bound,
                    rate: record.rate,
                });
            }
        }

        for record in records.thresholds {
            let Some(key) = assembly.key("thresholds.csv", record.tax_year, &record.category)?
            else {
                continue;
            };
            let Some(definition) = assembly.definitions.get_mut(&key) else {
                continue;
            };
            if definition.thresholds.contains_key(&record.name) {
                assembly.fail(ConfigurationFault::DuplicateEntry {
                    key,
                    item: format!("threshold {}", record.name),
                });
                continue;
            }
            definition.thresholds.insert(record.name, record.amount);
        }

        for record in records.credits {
            let Some(key) = assembly.key("credits.csv", record.tax_year, &record.category)? else {
                continue;
            };
            let Some(credit_type) = CreditType::parse(record.credit_type.trim()) else {
                assembly.unknown(key, "credit type", &record.credit_type);
                continue;
            };
            let Some(partner) = PartnerRequirement::parse(record.partner.trim()) else {
                assembly.unknown(key, "partner requirement", &record.partner);
                continue;
            };
            let phase_out = match (record.phase_out_threshold, record.phase_out_rate) {
                (Some(threshold), Some(rate)) => Some(PhaseOut { threshold, rate }),
                (None, None) => None,
                _ => {
                    assembly.fail(ConfigurationFault::InvalidPhaseOut {
                        key,
                        credit: credit_type,
                    });
                    continue;
                }
            };

            let Some(definition) = assembly.definitions.get_mut(&key) else {
                continue;
            };
            if definition.credits.contains_key(&credit_type) {
                assembly.fail(ConfigurationFault::DuplicateEntry {
                    key,
                    item: format!("credit {credit_type}"),
                });
                continue;
            }
            definition.credits.insert(
                credit_type,
                CreditRule {
                    maximum: record.maximum,
                    phase_out,
                    automatic: record.automatic,
                    minimum_age: record.minimum_age,
                    dependent_under_age: record.dependent_under_age,
                    partner,
                },
            );
        }

        for record in records.deductions {
            let Some(key) = assembly.key("deductions.csv", record.tax_year, &record.category)?
            else {
                continue;
            };
            let Some(deduction_type) = DeductionType::parse(record.deduction_type.trim()) else {
                assembly.unknown(key, "deduction type", &record.deduction_type);
                continue;
            };

            let Some(definition) = assembly.definitions.get_mut(&key) else {
                continue;
            };
            if definition.deductions.contains_key(&deduction_type) {
                assembly.fail(ConfigurationFault::DuplicateEntry {
                    key,
                    item: format!("deduction {deduction_type}"),
                });
                continue;
            }
            definition.deductions.insert(
                deduction_type,
                DeductionRule {
                    ceiling: record.ceiling,
                    shareable: record.shareable,
                },
            );
        }

        Ok(assembly.finish())
    }
}
