//! Market Identifiers
//!
//! Strongly typed identifiers used as subscription keys and wire topics.
//! Every identifier has exactly one canonical string form, produced by
//! `Display` and accepted by `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

// =============================================================================
// Venue
// =============================================================================

/// Trading venue (exchange, ECN, broker feed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Venue(String);

impl Venue {
    /// Create a venue, normalizing to upper case.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains a `.` or `-`.
    pub fn new(name: impl AsRef<str>) -> Result<Self, ModelError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ModelError::EmptyIdentifier("venue"));
        }
        if name.contains(['.', '-']) {
            return Err(ModelError::InvalidIdentifier {
                kind: "venue",
                value: name.to_string(),
            });
        }
        Ok(Self(name.to_uppercase()))
    }

    /// The venue name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Venue {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Venue {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Venue> for String {
    fn from(venue: Venue) -> Self {
        venue.0
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Instrument symbol qualified by its venue.
///
/// Canonical form is `{code}.{venue}`, e.g. `EUR/USD.FXCM`. The code may
/// itself contain dots, so parsing splits at the last one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    code: String,
    venue: Venue,
}

impl Symbol {
    /// Create a symbol from its code and venue name.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty or the venue is invalid.
    pub fn new(code: impl AsRef<str>, venue: impl AsRef<str>) -> Result<Self, ModelError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(ModelError::EmptyIdentifier("symbol code"));
        }
        Ok(Self {
            code: code.to_string(),
            venue: Venue::new(venue)?,
        })
    }

    /// The venue-local code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The venue the symbol trades on.
    #[must_use]
    pub const fn venue(&self) -> &Venue {
        &self.venue
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.venue)
    }
}

impl FromStr for Symbol {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, venue) = s.rsplit_once('.').ok_or_else(|| ModelError::InvalidIdentifier {
            kind: "symbol",
            value: s.to_string(),
        })?;
        Self::new(code, venue)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

// =============================================================================
// Bar Specification
// =============================================================================

/// How a bar's extent is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarStructure {
    /// Fixed number of ticks.
    Tick,
    /// Wall-clock seconds.
    Second,
    /// Wall-clock minutes.
    Minute,
    /// Wall-clock hours.
    Hour,
    /// Wall-clock days.
    Day,
}

impl BarStructure {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "TICK",
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
        }
    }

    /// Whether the structure counts ticks rather than elapsed time.
    #[must_use]
    pub const fn is_tick_based(self) -> bool {
        matches!(self, Self::Tick)
    }

    /// Length of one unit for time-based structures.
    #[must_use]
    pub fn unit_duration(self) -> Option<chrono::Duration> {
        match self {
            Self::Tick => None,
            Self::Second => Some(chrono::Duration::seconds(1)),
            Self::Minute => Some(chrono::Duration::minutes(1)),
            Self::Hour => Some(chrono::Duration::hours(1)),
            Self::Day => Some(chrono::Duration::days(1)),
        }
    }
}

impl FromStr for BarStructure {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TICK" => Ok(Self::Tick),
            "SECOND" => Ok(Self::Second),
            "MINUTE" => Ok(Self::Minute),
            "HOUR" => Ok(Self::Hour),
            "DAY" => Ok(Self::Day),
            _ => Err(ModelError::InvalidIdentifier {
                kind: "bar structure",
                value: s.to_string(),
            }),
        }
    }
}

/// Longest wall-clock span a time bar may cover.
pub const MAX_BAR_INTERVAL_DAYS: i64 = 36_500;

/// Which side of the book a bar is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    /// Bid prices.
    Bid,
    /// Ask prices.
    Ask,
    /// Mid-point of bid and ask.
    Mid,
    /// Last traded price (mid-point for quote ticks).
    Last,
}

impl PriceType {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bid => "BID",
            Self::Ask => "ASK",
            Self::Mid => "MID",
            Self::Last => "LAST",
        }
    }
}

impl FromStr for PriceType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BID" => Ok(Self::Bid),
            "ASK" => Ok(Self::Ask),
            "MID" => Ok(Self::Mid),
            "LAST" => Ok(Self::Last),
            _ => Err(ModelError::InvalidIdentifier {
                kind: "price type",
                value: s.to_string(),
            }),
        }
    }
}

/// Bar step, structure and price side, e.g. `1-MINUTE-BID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BarSpecification {
    step: u32,
    structure: BarStructure,
    price_type: PriceType,
}

impl BarSpecification {
    /// Create a bar specification.
    ///
    /// # Errors
    ///
    /// Returns `ZeroBarStep` if `step` is zero and `BarIntervalTooLong` if a
    /// time-based bar would span more than [`MAX_BAR_INTERVAL_DAYS`].
    pub fn new(
        step: u32,
        structure: BarStructure,
        price_type: PriceType,
    ) -> Result<Self, ModelError> {
        if step == 0 {
            return Err(ModelError::ZeroBarStep);
        }
        let spec = Self {
            step,
            structure,
            price_type,
        };
        if let Some(unit) = structure.unit_duration()
            && spec
                .interval()
                .is_none_or(|interval| interval > chrono::Duration::days(MAX_BAR_INTERVAL_DAYS))
        {
            return Err(ModelError::BarIntervalTooLong {
                step,
                unit: unit.num_seconds(),
            });
        }
        Ok(spec)
    }

    /// Number of structure units per bar.
    #[must_use]
    pub const fn step(&self) -> u32 {
        self.step
    }

    /// How the bar extent is measured.
    #[must_use]
    pub const fn structure(&self) -> BarStructure {
        self.structure
    }

    /// Which price the bar is built from.
    #[must_use]
    pub const fn price_type(&self) -> PriceType {
        self.price_type
    }

    /// Total wall-clock length for time-based specifications.
    #[must_use]
    pub fn interval(&self) -> Option<chrono::Duration> {
        let step = i32::try_from(self.step).ok()?;
        self.structure.unit_duration()?.checked_mul(step)
    }
}

impl fmt::Display for BarSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.step,
            self.structure.as_str(),
            self.price_type.as_str()
        )
    }
}

impl FromStr for BarSpecification {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidIdentifier {
            kind: "bar specification",
            value: s.to_string(),
        };

        let mut parts = s.split('-');
        let (Some(step), Some(structure), Some(price_type), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let step = step.parse::<u32>().map_err(|_| invalid())?;
        Self::new(step, structure.parse()?, price_type.parse()?)
    }
}

impl TryFrom<String> for BarSpecification {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BarSpecification> for String {
    fn from(spec: BarSpecification) -> Self {
        spec.to_string()
    }
}

// =============================================================================
// Bar Type
// =============================================================================

/// A symbol together with a bar specification.
///
/// Canonical form is `{symbol}-{specification}`, e.g.
/// `EUR/USD.FXCM-1-MINUTE-BID`. Parsing works from the right so that
/// symbol codes containing `-` survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BarType {
    symbol: Symbol,
    specification: BarSpecification,
}

impl BarType {
    /// Create a bar type.
    #[must_use]
    pub const fn new(symbol: Symbol, specification: BarSpecification) -> Self {
        Self {
            symbol,
            specification,
        }
    }

    /// The instrument the bars describe.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The bar specification.
    #[must_use]
    pub const fn specification(&self) -> &BarSpecification {
        &self.specification
    }

    /// Whether bars of this type are built by counting ticks.
    #[must_use]
    pub const fn is_tick_based(&self) -> bool {
        self.specification.structure().is_tick_based()
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.symbol, self.specification)
    }
}

impl FromStr for BarType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(4, '-');
        let (Some(price_type), Some(structure), Some(step), Some(symbol)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ModelError::InvalidIdentifier {
                kind: "bar type",
                value: s.to_string(),
            });
        };

        let specification: BarSpecification = format!("{step}-{structure}-{price_type}").parse()?;
        Ok(Self::new(symbol.parse()?, specification))
    }
}

impl TryFrom<String> for BarType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BarType> for String {
    fn from(bar_type: BarType) -> Self {
        bar_type.to_string()
    }
}

// =============================================================================
// Strategy Identity
// =============================================================================

/// Identity of a strategy bound to a data client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(String);

impl StrategyId {
    /// Create a strategy identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is empty.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ModelError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ModelError::EmptyIdentifier("strategy id"));
        }
        Ok(Self(value.to_string()))
    }

    /// The identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
