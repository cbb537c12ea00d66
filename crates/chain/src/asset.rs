//! # Ledger Primitives: Asset, Symbol, Price
//!
//! Fixed-point amount yang ditandai simbol. Semua aritmatika antar-asset
//! memeriksa simbol terlebih dahulu dan gagal dengan `InvalidSymbol`
//! jika simbol berbeda. Overflow tidak pernah di-wrap: gagal dengan `Overflow`.
//!
//! ```text
//! Asset { amount: 1500, symbol: SCI (precision 3) }  →  "1.500 SCI"
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::types::ShareType;

pub const MAX_SYMBOL_NAME_LENGTH: usize = 7;

/// Simbol asset: precision (jumlah desimal) + nama ASCII uppercase (maks 7).
///
/// Dikemas ke satu `u64`: byte 0 = precision, byte 1..8 = nama.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u64);

impl Symbol {
    pub const fn from_parts(precision: u8, name: &[u8]) -> Symbol {
        let mut packed = precision as u64;
        let mut i = 0;
        while i < name.len() && i < MAX_SYMBOL_NAME_LENGTH {
            packed |= (name[i] as u64) << (8 * (i + 1));
            i += 1;
        }
        Symbol(packed)
    }

    pub fn new(precision: u8, name: &str) -> Result<Symbol> {
        if name.is_empty()
            || name.len() > MAX_SYMBOL_NAME_LENGTH
            || !name.bytes().all(|b| b.is_ascii_uppercase())
            || precision > 14
        {
            return Err(LedgerError::InvalidSymbolName(name.to_string()));
        }
        Ok(Symbol::from_parts(precision, name.as_bytes()))
    }

    pub fn precision(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn name(&self) -> String {
        let mut out = String::new();
        let mut v = self.0 >> 8;
        while v != 0 {
            out.push((v & 0xff) as u8 as char);
            v >>= 8;
        }
        out
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn scale(&self) -> i64 {
        10i64.pow(self.precision() as u32)
    }
}

/// Simbol primary stake: balance, fee, dan common token.
pub const PRIMARY_SYMBOL: Symbol = Symbol::from_parts(3, b"SCI");

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}, {})", self.name(), self.precision())
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_u64(self.0)
    }
}
impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Symbol, D::Error>
    where D: Deserializer<'de> {
        Ok(Symbol(u64::deserialize(deserializer)?))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ASSET
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub amount: ShareType,
    pub symbol: Symbol,
}

impl Asset {
    pub const fn new(amount: ShareType, symbol: Symbol) -> Asset {
        Asset { amount, symbol }
    }

    /// Shortcut untuk asset primary (SCI).
    pub const fn primary(amount: ShareType) -> Asset {
        Asset { amount, symbol: PRIMARY_SYMBOL }
    }

    pub fn zero(symbol: Symbol) -> Asset {
        Asset { amount: 0, symbol }
    }

    pub fn is_primary(&self) -> bool {
        self.symbol == PRIMARY_SYMBOL
    }

    /// Gagal dengan `InvalidSymbol` jika simbol tidak sama dengan `expected`.
    pub fn ensure_symbol(&self, expected: Symbol) -> Result<()> {
        if self.symbol != expected {
            return Err(LedgerError::InvalidSymbol {
                expected: expected.name(),
                actual: self.symbol.name(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Asset) -> Result<Asset> {
        self.ensure_symbol(other.symbol)?;
        let amount = self.amount
            .checked_add(other.amount)
            .ok_or(LedgerError::Overflow("asset add"))?;
        Ok(Asset { amount, symbol: self.symbol })
    }

    pub fn checked_sub(&self, other: &Asset) -> Result<Asset> {
        self.ensure_symbol(other.symbol)?;
        let amount = self.amount
            .checked_sub(other.amount)
            .ok_or(LedgerError::Overflow("asset sub"))?;
        Ok(Asset { amount, symbol: self.symbol })
    }

    pub fn checked_neg(&self) -> Result<Asset> {
        let amount = self.amount.checked_neg().ok_or(LedgerError::Overflow("asset neg"))?;
        Ok(Asset { amount, symbol: self.symbol })
    }

    /// Perbandingan yang memeriksa simbol. `a.try_ge(b)?` ≡ `a >= b`.
    pub fn try_ge(&self, other: &Asset) -> Result<bool> {
        self.ensure_symbol(other.symbol)?;
        Ok(self.amount >= other.amount)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.symbol.precision() as usize;
        let scale = self.symbol.scale();
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        let whole = abs / scale as u64;
        if precision == 0 {
            return write!(f, "{}{} {}", sign, whole, self.symbol);
        }
        let frac = abs % scale as u64;
        write!(f, "{}{}.{:0width$} {}", sign, whole, frac, self.symbol, width = precision)
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({})", self)
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    /// Parse "1.500 SCI". Jumlah digit desimal menentukan precision.
    fn from_str(s: &str) -> Result<Asset> {
        let bad = || LedgerError::InvalidAssetString(s.to_string());
        let mut parts = s.trim().split_whitespace();
        let number = parts.next().ok_or_else(bad)?;
        let name = parts.next().ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }

        let (negative, number) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(bad());
        }

        let symbol = Symbol::new(frac.len() as u8, name)?;
        let whole: i64 = whole.parse().map_err(|_| bad())?;
        let frac: i64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| bad())? };
        let amount = whole
            .checked_mul(symbol.scale())
            .and_then(|v| v.checked_add(frac))
            .ok_or(LedgerError::Overflow("asset parse"))?;
        Ok(Asset { amount: if negative { -amount } else { amount }, symbol })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PRICE
// ════════════════════════════════════════════════════════════════════════════

/// Rasio tukar `base / quote`. Konversi memakai u128 intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub base: Asset,
    pub quote: Asset,
}

impl Price {
    pub fn new(base: Asset, quote: Asset) -> Result<Price> {
        let price = Price { base, quote };
        price.validate()?;
        Ok(price)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base.symbol == self.quote.symbol {
            return Err(LedgerError::InvalidPrice("base and quote share a symbol"));
        }
        if self.base.amount <= 0 || self.quote.amount <= 0 {
            return Err(LedgerError::InvalidPrice("price legs must be positive"));
        }
        Ok(())
    }

    pub fn is_null(&self) -> bool {
        self.base.amount == 0 && self.quote.amount == 0
    }

    /// Konversi `asset` ke sisi lain dari harga.
    ///
    /// - asset ber-simbol base → hasil ber-simbol quote
    /// - asset ber-simbol quote → hasil ber-simbol base
    pub fn convert(&self, asset: &Asset) -> Result<Asset> {
        let (from, to) = if asset.symbol == self.base.symbol {
            (self.base, self.quote)
        } else if asset.symbol == self.quote.symbol {
            (self.quote, self.base)
        } else {
            return Err(LedgerError::InvalidSymbol {
                expected: self.base.symbol.name(),
                actual: asset.symbol.name(),
            });
        };
        if from.amount <= 0 {
            return Err(LedgerError::InvalidPrice("price legs must be positive"));
        }

        let product = (asset.amount as i128) * (to.amount as i128);
        let result = product / (from.amount as i128);
        let amount = i64::try_from(result).map_err(|_| LedgerError::Overflow("price convert"))?;
        Ok(Asset { amount, symbol: to.symbol })
    }
}
