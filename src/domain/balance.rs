use std::fmt;

/// Currency every reading is assumed to be in.
pub const CURRENCY: &str = "EUR";

/// Snapshot of a rendered page, alive for a single cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct RawPageContent(String);

impl RawPageContent {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Page sources carry account details, only their size goes to the logs.
impl fmt::Debug for RawPageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPageContent({} bytes)", self.0.len())
    }
}

/// Account balance captured in one cycle. Always finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceReading(f64);

impl BalanceReading {
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for BalanceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoReadingCause {
    /// The browser session failed before a page could be captured.
    Session,
    /// A page was captured but no balance could be found in it.
    Extraction,
}

impl fmt::Display for NoReadingCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoReadingCause::Session => write!(f, "banking session failed"),
            NoReadingCause::Extraction => write!(f, "balance extraction failed"),
        }
    }
}

/// Result of the reading half of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReading {
    Reading(BalanceReading),
    NoReading { cause: NoReadingCause, reason: String },
}

impl CycleReading {
    pub fn balance(&self) -> Option<BalanceReading> {
        match self {
            CycleReading::Reading(reading) => Some(*reading),
            CycleReading::NoReading { .. } => None,
        }
    }
}
