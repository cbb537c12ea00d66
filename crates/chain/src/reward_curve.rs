//! Reward curve & integer math utilities
//!
//! Semua perhitungan kurva dan persentase memakai intermediate `u128`
//! lalu di-narrow secara eksplisit (gagal dengan `Overflow`, tidak pernah truncate).
//!
//! ```text
//! power1.5(x)          = floor(sqrt(x^3))
//! curator_weight       = curve(new_total) - curve(old_total)
//! decayed              = weight * min(elapsed, WINDOW) / WINDOW
//! calculate_share(a,n,d) = floor(a * n / d)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::types::{ShareType, TimePointSec, PERCENT_100};

/// Integer square root menggunakan Newton-Raphson method
/// Mengembalikan floor(sqrt(x))
pub fn sqrt_u128(x: u128) -> u128 {
    if x == 0 {
        return 0;
    }
    if x == 1 {
        return 1;
    }

    let mut guess = x / 2;
    let mut result = guess;

    loop {
        // Newton-Raphson: next = (guess + x/guess) / 2
        let next = (guess + x / guess) / 2;

        if next >= guess {
            break;
        }

        result = next;
        guess = next;
    }

    result
}

/// Kurva reward yang dikenal protokol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveId {
    Linear,
    /// output ∝ input^1.5, kontribusi besar dihargai super-linear.
    Power1Dot5,
}

/// Evaluasi kurva reward. Gagal dengan `Overflow` jika hasil tidak muat di u64.
pub fn evaluate_reward_curve(value: u64, curve: CurveId) -> Result<u64> {
    match curve {
        CurveId::Linear => Ok(value),
        CurveId::Power1Dot5 => {
            let v = value as u128;
            let cubed = v
                .checked_mul(v)
                .and_then(|sq| sq.checked_mul(v))
                .ok_or(LedgerError::Overflow("reward curve"))?;
            u64::try_from(sqrt_u128(cubed)).map_err(|_| LedgerError::Overflow("reward curve"))
        }
    }
}

/// Kontribusi marginal satu vote terhadap running total:
/// `curve(new_total) - curve(old_total)`.
///
/// Karena setiap vote menyumbang selisih, jumlah seluruh curator weight pada
/// satu target selalu telescoping ke `curve(final_total) - curve(0)`.
pub fn curve_delta(old_total: u64, new_total: u64, curve: CurveId) -> Result<u64> {
    let old_weight = evaluate_reward_curve(old_total, curve)?;
    let new_weight = evaluate_reward_curve(new_total, curve)?;
    new_weight
        .checked_sub(old_weight)
        .ok_or(LedgerError::Overflow("curve delta"))
}

/// Reverse auction: vote di dalam window setelah target dibuat mendapat
/// weight proporsional terhadap waktu yang sudah berlalu.
pub fn reverse_auction_decay(weight: u64, elapsed_seconds: u64, window_seconds: u64) -> u64 {
    if window_seconds == 0 {
        return weight;
    }
    let delta_t = elapsed_seconds.min(window_seconds) as u128;
    let w = (weight as u128 * delta_t) / window_seconds as u128;
    // w <= weight, selalu muat
    w as u64
}

/// `floor(amount * numerator / denominator)`.
///
/// Satu-satunya helper pembagian proporsional di seluruh reward pass.
/// Sisa pembulatan TIDAK didistribusikan ulang.
pub fn calculate_share(amount: ShareType, numerator: u128, denominator: u128) -> Result<ShareType> {
    if denominator == 0 || amount <= 0 {
        return Ok(0);
    }
    let product = (amount as u128)
        .checked_mul(numerator)
        .ok_or(LedgerError::Overflow("calculate_share"))?;
    ShareType::try_from(product / denominator).map_err(|_| LedgerError::Overflow("calculate_share"))
}

/// Share berbasis persen (basis point).
pub fn percent_share(amount: ShareType, percent: u16) -> Result<ShareType> {
    calculate_share(amount, percent as u128, PERCENT_100 as u128)
}

/// Modifier bobot review per discipline (basis point, 100% = netral).
///
/// `100% + min(100%, review_weight * 100% / discipline_review_total)`:
/// review yang menguasai porsi besar dari total review weight discipline
/// mendapat bobot hingga 2x saat reward pass.
pub fn review_weight_modifier(review_weight: u64, discipline_review_total: u64) -> u32 {
    let base = PERCENT_100 as u32;
    if discipline_review_total == 0 {
        return base;
    }
    let share = (review_weight as u128 * PERCENT_100 as u128) / discipline_review_total as u128;
    base + share.min(PERCENT_100 as u128) as u32
}

/// Voting power setelah regenerasi linear, dihitung lazily saat dipakai.
///
/// `min(100%, power + 100% * elapsed / regen_seconds)`
pub fn regenerated_voting_power(
    voting_power: u16,
    last_vote_time: TimePointSec,
    now: TimePointSec,
    regen_seconds: u64,
) -> u16 {
    let elapsed = now.saturating_sub(last_vote_time) as u128;
    let regenerated = if regen_seconds == 0 {
        PERCENT_100 as u128
    } else {
        (PERCENT_100 as u128 * elapsed) / regen_seconds as u128
    };
    let current = (voting_power as u128 + regenerated).min(PERCENT_100 as u128);
    current as u16
}
