use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use hex::{encode as hex_encode, decode as hex_decode};

use crate::error::{LedgerError, Result};

// ════════════════════════════════════════════════════════════════════════════
// PROTOCOL CONSTANTS
// ════════════════════════════════════════════════════════════════════════════

/// Skala persentase basis-point: 10000 = 100.00%
pub const PERCENT_100: u16 = 10_000;
pub const PERCENT_1: u16 = 100;

/// Kedalaman maksimum rantai proxy witness-vote.
/// Consensus-critical: ukuran array `proxied_vsf_votes` bergantung pada nilai ini.
pub const MAX_PROXY_RECURSION_DEPTH: usize = 4;

/// Discipline root ("common"). Semua common token tercermin di sini.
pub const COMMON_DISCIPLINE_ID: DisciplineId = 0;

/// Timestamp "tidak pernah" untuk jadwal power-down yang berhenti.
pub const TIME_NEVER: TimePointSec = u64::MAX;

// ════════════════════════════════════════════════════════════════════════════
// PRIMITIVE ALIASES
// ════════════════════════════════════════════════════════════════════════════

/// Fixed-point integer amount (smallest unit). Signed agar delta bisa negatif.
pub type ShareType = i64;

/// Detik sejak epoch.
pub type TimePointSec = u64;

pub type DisciplineId = u64;
pub type ResearchId = u64;
pub type ContentId = u64;
pub type ReviewId = u64;
pub type ResearchGroupId = u64;
pub type GrantId = u64;
pub type ProposalId = u64;

// ════════════════════════════════════════════════════════════════════════════
// ACCOUNT NAME
// ════════════════════════════════════════════════════════════════════════════

pub const MIN_ACCOUNT_NAME_LENGTH: usize = 3;
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 16;

/// Nama account unik. Lowercase ASCII, digit, `-` dan `.`; harus diawali huruf.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(name: &str) -> Result<Self> {
        if !Self::is_valid(name) {
            return Err(LedgerError::InvalidAccountName(name.to_string()));
        }
        Ok(AccountName(name.to_string()))
    }

    /// Untuk nama konstanta yang sudah pasti valid (default config, test).
    pub(crate) fn new_unchecked(name: &str) -> Self {
        debug_assert!(Self::is_valid(name));
        AccountName(name.to_string())
    }

    pub fn is_valid(name: &str) -> bool {
        let len = name.len();
        if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&len) {
            return false;
        }
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        name.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountName").field(&self.0).finish()
    }
}

impl FromStr for AccountName {
    type Err = LedgerError;
    fn from_str(s: &str) -> Result<Self> {
        AccountName::new(s)
    }
}

/* serde: AccountName sebagai string biasa, divalidasi saat decode */
impl Serialize for AccountName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.0)
    }
}
impl<'de> Deserialize<'de> for AccountName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<AccountName, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        AccountName::new(&s).map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PUBLIC KEY & AUTHORITY
// ════════════════════════════════════════════════════════════════════════════

/// Compressed public key (33 bytes). Verifikasi signature dilakukan di luar core,
/// di sini key hanya dibandingkan dan disimpan.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex_decode(s).map_err(|_| LedgerError::InvalidPublicKey(s.to_string()))?;
        if bytes.len() != 33 {
            return Err(LedgerError::InvalidPublicKey(s.to_string()));
        }
        Ok(PublicKey(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<PublicKey, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(PublicKey::default());
        }
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Weighted multi-sig authority.
///
/// `weight_threshold == 0` berarti authority "open" (siapa pun bisa tanda tangan).
/// Authority "impossible" jika total bobot semua key + account < threshold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: BTreeMap<AccountName, u16>,
    pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
    pub fn single_key(key: PublicKey) -> Self {
        let mut key_auths = BTreeMap::new();
        key_auths.insert(key, 1);
        Authority { weight_threshold: 1, account_auths: BTreeMap::new(), key_auths }
    }

    pub fn single_account(account: AccountName) -> Self {
        let mut account_auths = BTreeMap::new();
        account_auths.insert(account, 1);
        Authority { weight_threshold: 1, account_auths, key_auths: BTreeMap::new() }
    }

    pub fn is_impossible(&self) -> bool {
        let total: u64 = self.account_auths.values().map(|w| *w as u64).sum::<u64>()
            + self.key_auths.values().map(|w| *w as u64).sum::<u64>();
        total < self.weight_threshold as u64
    }

    pub fn is_open(&self) -> bool {
        self.weight_threshold == 0
    }

    pub fn referenced_accounts(&self) -> impl Iterator<Item = &AccountName> {
        self.account_auths.keys()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HASH
// ════════════════════════════════════════════════════════════════════════════

/// Hash type: sha3-512 digest wrapper (64 bytes)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 64]);

impl Hash {
    pub fn from_bytes(b: [u8; 64]) -> Self { Hash(b) }
    pub fn as_bytes(&self) -> &[u8; 64] { &self.0 }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Hash, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        let v = hex_decode(&s).map_err(serde::de::Error::custom)?;
        if v.len() != 64 {
            return Err(serde::de::Error::custom("invalid sha3-512 length"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&v);
        Ok(Hash(arr))
    }
}
