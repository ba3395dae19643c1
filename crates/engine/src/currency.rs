use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Currency of the ledger.
///
/// The ledger is mono-currency (Brazilian Real). The type still exists so the
/// symbol and the number of minor units live in one place.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units** (see
/// `Money`). BRL has 2 minor units, so `R$ 10,50` ⇄ `1050`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Brl,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
        }
    }

    /// Symbol used when rendering amounts.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Currency::Brl => "R$",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Brl => 2,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// Rendering conventions for formatted amounts.
///
/// - `PtBr`: `R$ 1.234,56`, negatives as `-R$ 1.234,56`
/// - `EnUs`: `R$1,234.56`, negatives as `-R$1,234.56`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    #[must_use]
    pub const fn decimal_separator(self) -> char {
        match self {
            Locale::PtBr => ',',
            Locale::EnUs => '.',
        }
    }

    #[must_use]
    pub const fn group_separator(self) -> char {
        match self {
            Locale::PtBr => '.',
            Locale::EnUs => ',',
        }
    }

    /// Text placed between the currency symbol and the digits.
    #[must_use]
    pub const fn symbol_gap(self) -> &'static str {
        match self {
            Locale::PtBr => " ",
            Locale::EnUs => "",
        }
    }
}

impl TryFrom<&str> for Locale {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(Locale::PtBr),
            "en-us" | "en" => Ok(Locale::EnUs),
            other => Err(EngineError::Validation(format!(
                "unsupported locale: {other}"
            ))),
        }
    }
}
