//! Rounding prices onto a fixed step grid

use meridian_core::Price;

/// Largest multiple of `step` that is `<= price`
#[inline]
pub fn floor_to_step(price: Price, step: Price) -> Price {
    (price / step).floor() * step
}

/// Smallest multiple of `step` that is `>= price`
#[inline]
pub fn ceil_to_step(price: Price, step: Price) -> Price {
    (price / step).ceil() * step
}
