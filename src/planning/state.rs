use num_traits::Float;
use serde::de::{Deserializer, Error as DeError, SeqAccess, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Add, Div, Index, IndexMut, Mul, Sub};

/// A point in N-dimensional real vector space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RealVectorState<F: Float, const N: usize> {
    values: [F; N],
}

impl<F: Float + Serialize, const N: usize> Serialize for RealVectorState<F, N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("RealVectorState", 1)?;
        state.serialize_field("values", &self.values.as_slice())?;
        state.end()
    }
}

impl<'de, F: Float + Deserialize<'de>, const N: usize> Deserialize<'de> for RealVectorState<F, N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValuesVisitor<F, const N: usize>(PhantomData<F>);

        impl<'de, F: Float + Deserialize<'de>, const N: usize> Visitor<'de> for ValuesVisitor<F, N> {
            type Value = [F; N];

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "an array of {} elements", N)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values: Vec<F> = Vec::with_capacity(N);
                while let Some(value) = seq.next_element()? {
                    values.push(value);
                }
                values.try_into().map_err(|v: Vec<F>| {
                    A::Error::invalid_length(v.len(), &self)
                })
            }
        }

        struct StateVisitor<F, const N: usize>(PhantomData<F>);

        impl<'de, F: Float + Deserialize<'de>, const N: usize> Visitor<'de> for StateVisitor<F, N> {
            type Value = RealVectorState<F, N>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "struct RealVectorState")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let values = seq
                    .next_element_seed(ValuesSeed::<F, N>(PhantomData))?
                    .ok_or_else(|| A::Error::invalid_length(0, &self))?;
                Ok(RealVectorState { values })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                #[derive(Deserialize)]
                #[serde(field_identifier, rename_all = "lowercase")]
                enum Field {
                    Values,
                }

                let mut values: Option<[F; N]> = None;
                while let Some(key) = map.next_key()? {
                    match key {
                        Field::Values => {
                            if values.is_some() {
                                return Err(DeError::duplicate_field("values"));
                            }
                            values = Some(map.next_value_seed(ValuesSeed::<F, N>(PhantomData))?);
                        }
                    }
                }
                let values = values.ok_or_else(|| DeError::missing_field("values"))?;
                Ok(RealVectorState { values })
            }
        }

        struct ValuesSeed<F, const N: usize>(PhantomData<F>);

        impl<'de, F: Float + Deserialize<'de>, const N: usize> serde::de::DeserializeSeed<'de>
            for ValuesSeed<F, N>
        {
            type Value = [F; N];

            fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_seq(ValuesVisitor::<F, N>(PhantomData))
            }
        }

        const FIELDS: &[&str] = &["values"];
        deserializer.deserialize_struct(
            "RealVectorState",
            FIELDS,
            StateVisitor::<F, N>(PhantomData),
        )
    }
}

impl<F: Float, const N: usize> RealVectorState<F, N> {
    /// Constructs a new state from an array of coordinates.
    pub fn new(values: [F; N]) -> Self {
        Self { values }
    }

    /// Returns the coordinates as an array reference.
    pub fn values(&self) -> &[F; N] {
        &self.values
    }

    /// The squared Euclidean norm of the state interpreted as a vector.
    pub fn norm_squared(&self) -> F {
        self.values
            .iter()
            .fold(F::zero(), |acc, &v| acc + v * v)
    }

    /// The dot product with another state interpreted as a vector.
    pub fn dot(&self, other: &Self) -> F {
        let mut sum = F::zero();
        for i in 0..N {
            sum = sum + self.values[i] * other.values[i];
        }
        sum
    }

    /// The Euclidean norm of the state interpreted as a vector.
    pub fn norm(&self) -> F {
        self.norm_squared().sqrt()
    }

    /// The squared Euclidean distance to another state.
    pub fn euclidean_distance_squared(&self, other: &Self) -> F {
        let mut sum = F::zero();
        for i in 0..N {
            let d = self.values[i] - other.values[i];
            sum = sum + d * d;
        }
        sum
    }

    /// The Euclidean distance to another state.
    pub fn euclidean_distance(&self, other: &Self) -> F {
        self.euclidean_distance_squared(other).sqrt()
    }
}

impl<F: Float, const N: usize> Index<usize> for RealVectorState<F, N> {
    type Output = F;

    fn index(&self, index: usize) -> &F {
        &self.values[index]
    }
}

impl<F: Float, const N: usize> IndexMut<usize> for RealVectorState<F, N> {
    fn index_mut(&mut self, index: usize) -> &mut F {
        &mut self.values[index]
    }
}

impl<F: Float, const N: usize> Sub for &RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn sub(self, other: Self) -> RealVectorState<F, N> {
        let mut values = [F::zero(); N];
        for i in 0..N {
            values[i] = self.values[i] - other.values[i];
        }
        RealVectorState { values }
    }
}

impl<F: Float, const N: usize> Sub for RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn sub(self, other: Self) -> RealVectorState<F, N> {
        &self - &other
    }
}

impl<F: Float, const N: usize> Add<&RealVectorState<F, N>> for &RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn add(self, other: &RealVectorState<F, N>) -> RealVectorState<F, N> {
        let mut values = [F::zero(); N];
        for i in 0..N {
            values[i] = self.values[i] + other.values[i];
        }
        RealVectorState { values }
    }
}

impl<F: Float, const N: usize> Add for RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn add(self, other: RealVectorState<F, N>) -> RealVectorState<F, N> {
        &self + &other
    }
}

impl<F: Float, const N: usize> Mul<F> for &RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn mul(self, scalar: F) -> RealVectorState<F, N> {
        let mut values = [F::zero(); N];
        for i in 0..N {
            values[i] = self.values[i] * scalar;
        }
        RealVectorState { values }
    }
}

impl<F: Float, const N: usize> Mul<F> for RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn mul(self, scalar: F) -> RealVectorState<F, N> {
        &self * scalar
    }
}

impl<F: Float, const N: usize> Div<F> for &RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn div(self, scalar: F) -> RealVectorState<F, N> {
        let mut values = [F::zero(); N];
        for i in 0..N {
            values[i] = self.values[i] / scalar;
        }
        RealVectorState { values }
    }
}

impl<F: Float, const N: usize> Div<F> for RealVectorState<F, N> {
    type Output = RealVectorState<F, N>;

    fn div(self, scalar: F) -> RealVectorState<F, N> {
        &self / scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_and_norm_agree() {
        let a = RealVectorState::new([1.0f64, 2.0]);
        let b = RealVectorState::new([4.0f64, 6.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-12);
        assert!(((&b - &a).norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn vector_arithmetic() {
        let a = RealVectorState::new([1.0f64, -1.0]);
        let b = RealVectorState::new([0.5f64, 0.5]);
        let c = &a + &(&b * 2.0);
        assert_eq!(*c.values(), [2.0, 0.0]);
        let d = &c / 2.0;
        assert_eq!(d[0], 1.0);
        assert_eq!(d[1], 0.0);
    }
}
