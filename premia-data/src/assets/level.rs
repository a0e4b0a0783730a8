use serde::Deserialize;
use std::{cmp::Ordering, fmt::Display};

use crate::shared::{de::de_flexible_f64, utils::is_positive};

/*----- */
// Level
/*----- */
// Accepts both `{"price": "1.2", "size": "3"}` and `["1.2", "3"]`, which between
// them cover every venue book format we read.
#[derive(Default, Debug, Clone, Copy, Deserialize)]
#[serde(from = "LevelRepr")]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Object {
        #[serde(alias = "px", alias = "p", deserialize_with = "de_flexible_f64")]
        price: f64,
        #[serde(
            alias = "sz",
            alias = "s",
            alias = "quantity",
            alias = "remaining_base_amount",
            deserialize_with = "de_flexible_f64"
        )]
        size: f64,
    },
    Tuple(
        #[serde(deserialize_with = "de_flexible_f64")] f64,
        #[serde(deserialize_with = "de_flexible_f64")] f64,
    ),
    // okx style ["px", "sz", "liquidated", "orders"]
    Wide(Vec<serde_json::Value>),
}

impl From<LevelRepr> for Level {
    fn from(repr: LevelRepr) -> Self {
        match repr {
            LevelRepr::Object { price, size } => Level::new(price, size),
            LevelRepr::Tuple(price, size) => Level::new(price, size),
            LevelRepr::Wide(values) => {
                let num = |idx: usize| {
                    values
                        .get(idx)
                        .and_then(|value| match value {
                            serde_json::Value::String(s) => s.parse::<f64>().ok(),
                            serde_json::Value::Number(n) => n.as_f64(),
                            _ => None,
                        })
                        .unwrap_or(0.0)
                };
                Level::new(num(0), num(1))
            }
        }
    }
}

impl Level {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }

    pub fn is_valid(&self) -> bool {
        is_positive(self.price) && is_positive(self.size)
    }

    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

#[allow(clippy::non_canonical_partial_ord_impl)]
impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.price.partial_cmp(&other.price) {
            Some(Ordering::Equal) => self.size.partial_cmp(&other.size),
            other_order => other_order,
        }
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price
            .total_cmp(&other.price)
            .then(self.size.total_cmp(&other.size))
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.price == other.price && self.size == other.size
    }
}

impl Eq for Level {}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} : {})", self.price, self.size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_de() {
        struct TestCase {
            name: &'static str,
            input: &'static str,
            expected: Level,
        }

        let cases = vec![
            TestCase {
                name: "object with strings",
                input: r#"{"price": "100.5", "size": "2"}"#,
                expected: Level::new(100.5, 2.0),
            },
            TestCase {
                name: "hyperliquid px/sz",
                input: r#"{"px": "31.2", "sz": "10.5", "n": 3}"#,
                expected: Level::new(31.2, 10.5),
            },
            TestCase {
                name: "gate futures p/s with integer size",
                input: r#"{"p": "97000.1", "s": 120}"#,
                expected: Level::new(97000.1, 120.0),
            },
            TestCase {
                name: "pair of strings",
                input: r#"["0.25", "1000"]"#,
                expected: Level::new(0.25, 1000.0),
            },
            TestCase {
                name: "pair of numbers",
                input: r#"[7, 3]"#,
                expected: Level::new(7.0, 3.0),
            },
            TestCase {
                name: "okx four wide",
                input: r#"["41006.8", "0.6", "0", "4"]"#,
                expected: Level::new(41006.8, 0.6),
            },
        ];

        for case in cases {
            let level: Level = serde_json::from_str(case.input).unwrap();
            assert_eq!(level, case.expected, "{}", case.name);
        }
    }

    #[test]
    fn test_level_is_valid() {
        assert!(Level::new(1.0, 1.0).is_valid());
        assert!(!Level::new(0.0, 1.0).is_valid());
        assert!(!Level::new(1.0, -1.0).is_valid());
    }
}
