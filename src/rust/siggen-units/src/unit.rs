// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

pub(crate) fn round_to_significant_digits(x: f64, n: u32) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        let order = x.abs().log10().floor();
        let scale = 10f64.powf((n as f64) - 1.0 - order);
        (x * scale).round() / scale
    }
}

/// Declare a quantity type carrying its unit as a type parameter.
///
/// The generated type stores a single value and serializes as that bare
/// value, so configuration files read `"period": 0.001` rather than a nested
/// object.
#[macro_export]
macro_rules! quantity {
    ($ident:ident) => {
        /// A quantity represented with unit type.
        ///
        /// # Type Parameter
        /// - `U`: The unit of the value. Typically, it is a zero-sized type.
        /// - `T`: The underlying value (typically a floating point number)
        #[derive(std::clone::Clone, std::marker::Copy, std::default::Default, core::fmt::Debug)]
        pub struct $ident<U, T = f64> {
            pub(crate) value: T,
            pub(crate) unit: U,
        }

        impl<U, T> $ident<U, T> {
            pub fn value(self) -> T {
                self.value
            }
        }

        impl<T: num_traits::Zero + std::cmp::PartialEq, U> PartialEq for $ident<U, T> {
            fn eq(&self, other: &Self) -> bool {
                let a = &self.value;
                let b = &other.value;
                if a.is_zero() && b.is_zero() {
                    true
                } else {
                    a == b
                }
            }
        }

        impl<T: num_traits::Zero + std::cmp::PartialOrd, U> PartialOrd for $ident<U, T> {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                if self == other {
                    Some(std::cmp::Ordering::Equal)
                } else {
                    self.value.partial_cmp(&other.value)
                }
            }
        }

        impl<T, U> std::ops::Add for $ident<U, T>
        where
            T: std::ops::Add<Output = T> + std::marker::Copy,
            U: std::marker::Copy,
        {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                $ident {
                    value: self.value + rhs.value,
                    unit: self.unit,
                }
            }
        }

        impl<U, T> std::ops::Mul<T> for $ident<U, T>
        where
            T: std::ops::Mul<T, Output = T> + std::marker::Copy,
            U: std::marker::Copy,
        {
            type Output = Self;

            fn mul(self, rhs: T) -> Self::Output {
                $ident {
                    value: self.value * rhs,
                    unit: self.unit,
                }
            }
        }

        impl<U, T> std::ops::Div<T> for $ident<U, T>
        where
            T: std::ops::Div<T, Output = T> + std::marker::Copy,
            U: std::marker::Copy,
        {
            type Output = Self;

            fn div(self, rhs: T) -> Self::Output {
                $ident {
                    value: self.value / rhs,
                    unit: self.unit,
                }
            }
        }

        impl<U, T> std::fmt::Display for $ident<U, T>
        where
            T: std::fmt::Display
                + std::fmt::Debug
                + num_traits::AsPrimitive<f64>
                + num_traits::Float,
            U: std::fmt::Display,
        {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if f.alternate() {
                    std::fmt::Display::fmt(&self.value, f)?;
                } else {
                    // Round to a few digits below epsilon so that accumulated
                    // rounding errors do not show up in diagnostics.
                    let significand_digits = (-T::epsilon().log10() - T::one()).as_() as u32;
                    let value = $crate::unit::round_to_significant_digits(
                        self.value.as_(),
                        significand_digits,
                    );

                    std::fmt::Debug::fmt(&value, f)?;
                }
                write!(f, " ")?;
                self.unit.fmt(f)
            }
        }

        impl<U, T: serde::Serialize> serde::Serialize for $ident<U, T> {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                self.value.serialize(serializer)
            }
        }

        impl<'de, U: std::default::Default, T: serde::Deserialize<'de>> serde::Deserialize<'de>
            for $ident<U, T>
        {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                T::deserialize(deserializer).map(|value| $ident {
                    value,
                    unit: U::default(),
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_significant_digits() {
        assert_eq!(round_to_significant_digits(0.0, 3), 0.0);
        assert_eq!(round_to_significant_digits(1.23456, 3), 1.23);
        assert_eq!(round_to_significant_digits(-98765.0, 2), -99000.0);
    }
}
